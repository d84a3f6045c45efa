//! Wire vocabulary shared by the engine and any transport backend.
//!
//! The protocol is carried entirely in headers plus a multi-fragment HTML
//! body: `seam-merge` holds an ordered JSON array of merge instructions, each
//! non-removal instruction is fed by a `<template id="{target}-fragment">`
//! block, and two optional headers tune morphing and dialog closing.

pub mod content_type;

use serde::{Deserialize, Serialize};

/// Marker header present (empty) on every engine-issued request.
pub const REQUEST_MARKER_HEADER: &str = "seam-request";
/// Ordered JSON array of `MergeInstruction`, required on 2xx-with-body.
pub const MERGE_HEADER: &str = "seam-merge";
/// Presence flag: morph must not overwrite the active element's value.
pub const MORPH_IGNORE_ACTIVE_HEADER: &str = "seam-morph-ignore-active";
/// Optional JSON `CloseDialogTrigger`.
pub const CLOSE_DIALOG_HEADER: &str = "seam-close-dialog";
pub const LOCATION_HEADER: &str = "location";
pub const CONTENT_TYPE_HEADER: &str = "content-type";

/// Fragment naming convention: the template feeding `target`.
pub fn fragment_id(target: &str) -> String {
    format!("{target}-fragment")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// An absent or empty declaration defaults to GET; anything outside the
    /// supported set is a configuration error carrying the offending text.
    pub fn parse(raw: &str) -> Result<Method, ProtocolError> {
        let m = raw.trim().to_ascii_uppercase();
        match m.as_str() {
            "" | "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(ProtocolError::UnknownMethod(m)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// GET and DELETE carry their payload as a query string, never a body.
    pub fn carries_query(self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectPolicy {
    Follow,
}

impl RedirectPolicy {
    pub fn as_str(self) -> &'static str {
        "follow"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    Swap,
    Afterbegin,
    Afterend,
    Beforebegin,
    Beforeend,
    Morph,
    Remove,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeClass {
    Removal,
    Insertion,
    Morph,
}

impl MergeStrategy {
    pub fn class(self) -> MergeClass {
        match self {
            MergeStrategy::Remove => MergeClass::Removal,
            MergeStrategy::Morph => MergeClass::Morph,
            _ => MergeClass::Insertion,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::Swap => "swap",
            MergeStrategy::Afterbegin => "afterbegin",
            MergeStrategy::Afterend => "afterend",
            MergeStrategy::Beforebegin => "beforebegin",
            MergeStrategy::Beforeend => "beforeend",
            MergeStrategy::Morph => "morph",
            MergeStrategy::Remove => "remove",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeInstruction {
    pub target: String,
    pub strategy: MergeStrategy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseDialogTrigger {
    pub dialog_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_close_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_form_id: Option<String>,
}

/// Request as handed to a transport backend.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDetail {
    pub action: String,
    pub method: Method,
    pub redirect: RedirectPolicy,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl RequestDetail {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response as seen by the engine, transport-agnostic.
#[derive(Clone, Debug, PartialEq)]
pub struct WireResponse {
    pub status: u16,
    headers: Vec<(String, String)>,
    pub body: String,
}

impl WireResponse {
    pub fn new(status: u16) -> WireResponse {
        WireResponse {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> WireResponse {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: &str) -> WireResponse {
        self.body = body.to_string();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE_HEADER)
    }
}

/// Status-code contract, branched before any body inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseClass {
    /// 202: a follow-up navigation is expected.
    FollowUp,
    /// 204: a valid completion, removal instructions only.
    NoContent,
    /// >= 400: terminal diagnostic render.
    Diagnostic,
    /// Any other 2xx/3xx: merge instructions plus fragment body.
    Merge,
}

pub fn classify(response: &WireResponse) -> ResponseClass {
    match response.status {
        202 => ResponseClass::FollowUp,
        204 => ResponseClass::NoContent,
        s if s >= 400 => ResponseClass::Diagnostic,
        _ => ResponseClass::Merge,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    UnknownMethod(String),
    MalformedHeader { header: &'static str, detail: String },
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::UnknownMethod(m) => write!(f, "{m} is not a valid HTTP method"),
            ProtocolError::MalformedHeader { header, detail } => {
                write!(f, "malformed {header} header: {detail}")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

pub fn parse_merge_header(value: &str) -> Result<Vec<MergeInstruction>, ProtocolError> {
    serde_json::from_str(value).map_err(|e| ProtocolError::MalformedHeader {
        header: MERGE_HEADER,
        detail: e.to_string(),
    })
}

pub fn parse_close_dialog_header(value: &str) -> Result<CloseDialogTrigger, ProtocolError> {
    serde_json::from_str(value).map_err(|e| ProtocolError::MalformedHeader {
        header: CLOSE_DIALOG_HEADER,
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_defaults_and_rejects() {
        assert_eq!(Method::parse(""), Ok(Method::Get));
        assert_eq!(Method::parse(" post "), Ok(Method::Post));
        assert!(matches!(
            Method::parse("TRACE"),
            Err(ProtocolError::UnknownMethod(m)) if m == "TRACE"
        ));
    }

    #[test]
    fn merge_header_round_trips_wire_names() {
        let parsed = parse_merge_header(r#"[{"target":"a","strategy":"swap"},{"target":"b","strategy":"beforeend"}]"#)
            .expect("valid header");
        assert_eq!(parsed[0].strategy, MergeStrategy::Swap);
        assert_eq!(parsed[1].strategy, MergeStrategy::Beforeend);
        let json = serde_json::to_string(&parsed).expect("serializable");
        assert!(json.contains(r#""strategy":"beforeend""#));
    }

    #[test]
    fn merge_header_rejects_unknown_strategy() {
        assert!(parse_merge_header(r#"[{"target":"a","strategy":"teleport"}]"#).is_err());
    }

    #[test]
    fn close_dialog_header_is_camel_case() {
        let parsed = parse_close_dialog_header(r#"{"dialogId":"m","resetFormId":"f"}"#).expect("valid header");
        assert_eq!(parsed.dialog_id, "m");
        assert_eq!(parsed.on_close_data, None);
        assert_eq!(parsed.reset_form_id.as_deref(), Some("f"));
    }

    #[test]
    fn classification_follows_the_status_contract() {
        assert_eq!(classify(&WireResponse::new(202)), ResponseClass::FollowUp);
        assert_eq!(classify(&WireResponse::new(204)), ResponseClass::NoContent);
        assert_eq!(classify(&WireResponse::new(404)), ResponseClass::Diagnostic);
        assert_eq!(classify(&WireResponse::new(200)), ResponseClass::Merge);
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let r = WireResponse::new(200).with_header("Seam-Merge", "[]");
        assert_eq!(r.header(MERGE_HEADER), Some("[]"));
    }
}
