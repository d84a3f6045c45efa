//! The declarative per-element vocabulary, parsed exactly once at
//! registration into an immutable `TriggerConfig`.
//!
//! Validation policy: an invalid method is a fatal configuration error; an
//! invalid boolean-ish flag or debounce value is a warning that falls back to
//! the attribute's presence test (flags) or an immediate fire (debounce).

use dom::Node;
use protocol::Method;

use crate::error::EngineError;

pub const ACTION_ATTR: &str = "data-seam-action";
pub const METHOD_ATTR: &str = "data-seam-method";
pub const TRIGGER_ATTR: &str = "data-seam-trigger";
pub const DEBOUNCE_ATTR: &str = "data-seam-debounce";
pub const DISABLE_IN_FLIGHT_ATTR: &str = "data-seam-disable-in-flight";
pub const IGNORE_ATTR: &str = "data-seam-ignore";
pub const HOIST_TO_ATTR: &str = "data-seam-hoist-to";
pub const ALLOW_DEFAULT_ATTR: &str = "data-seam-allow-default";

/// Frozen per-element configuration. Constructed once when the element is
/// registered; never exposed for mutation afterwards.
#[derive(Clone, Debug)]
pub struct TriggerConfig {
    id: String,
    action: String,
    method: Method,
    trigger: String,
    debounce: Option<u64>,
    disable_in_flight: bool,
    allow_default: bool,
    hoist_to: Option<String>,
}

impl TriggerConfig {
    pub fn from_element(node: &Node) -> Result<TriggerConfig, EngineError> {
        let Some(id) = node.html_id() else {
            return Err(EngineError::MissingIdentifier {
                tag: node.tag().unwrap_or("").to_string(),
            });
        };
        let id = id.to_string();
        let method = Method::parse(node.attr(METHOD_ATTR).unwrap_or("")).map_err(|_| {
            EngineError::InvalidMethod {
                element: id.clone(),
                method: node.attr(METHOD_ATTR).unwrap_or("").trim().to_ascii_uppercase(),
            }
        })?;
        let trigger = match node.attr(TRIGGER_ATTR).map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.to_string(),
            None => default_trigger_event(node).to_string(),
        };
        Ok(TriggerConfig {
            action: node.attr(ACTION_ATTR).unwrap_or("").to_string(),
            method,
            trigger,
            debounce: debounce_attr(node, &id),
            disable_in_flight: flag_attr(node, DISABLE_IN_FLIGHT_ATTR, &id),
            allow_default: flag_attr(node, ALLOW_DEFAULT_ATTR, &id),
            hoist_to: node
                .attr(HOIST_TO_ATTR)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            id,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn debounce(&self) -> Option<u64> {
        self.debounce
    }

    pub fn disable_in_flight(&self) -> bool {
        self.disable_in_flight
    }

    pub fn allow_default(&self) -> bool {
        self.allow_default
    }

    pub fn hoist_to(&self) -> Option<&str> {
        self.hoist_to.as_deref()
    }
}

/// Default trigger by tag semantics: `submit` for forms, `change` for
/// value-bearing controls, `click` for everything else.
pub(crate) fn default_trigger_event(node: &Node) -> &'static str {
    match node.tag() {
        Some("form") => "submit",
        Some("input") => {
            if node.attr("type").is_some_and(|t| t.trim().eq_ignore_ascii_case("button")) {
                "click"
            } else {
                "change"
            }
        }
        Some("select") | Some("textarea") => "change",
        _ => "click",
    }
}

/// Boolean-ish attribute: absent is false, `="false"` is false, anything else
/// (including bare presence) is true. Junk values warn and count as present.
pub(crate) fn flag_attr(node: &Node, name: &str, element_id: &str) -> bool {
    let Some(raw) = node.attr(name) else {
        return false;
    };
    let value = raw.trim().to_ascii_lowercase();
    if !value.is_empty() && value != "true" && value != "false" {
        log::warn!(
            target: "seam.attrs",
            "the {name} attribute on element {element_id} is invalid; it should be boolean (no value), \"true\" or \"false\""
        );
    }
    value != "false"
}

/// Subtree opt-out: `None` when undeclared, otherwise the effective flag.
pub(crate) fn ignore_flag(node: &Node) -> Option<bool> {
    if !node.has_attr(IGNORE_ATTR) {
        return None;
    }
    Some(flag_attr(node, IGNORE_ATTR, node.html_id().unwrap_or("")))
}

fn debounce_attr(node: &Node, element_id: &str) -> Option<u64> {
    let raw = node.attr(DEBOUNCE_ATTR)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(ms),
        _ => {
            log::warn!(
                target: "seam.attrs",
                "the {DEBOUNCE_ATTR} attribute on element {element_id} is invalid; it must be an integer greater than zero"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::Document;

    fn element_in(html: &str, id: &str) -> Node {
        Document::parse(html).find(id).expect("element present").clone()
    }

    #[test]
    fn parses_a_full_configuration() {
        let node = element_in(
            r#"<button id=b data-seam-action="/save" data-seam-method=post data-seam-debounce=250 data-seam-disable-in-flight></button>"#,
            "b",
        );
        let config = TriggerConfig::from_element(&node).expect("valid config");
        assert_eq!(config.id(), "b");
        assert_eq!(config.action(), "/save");
        assert_eq!(config.method(), Method::Post);
        assert_eq!(config.trigger(), "click");
        assert_eq!(config.debounce(), Some(250));
        assert!(config.disable_in_flight());
        assert!(!config.allow_default());
    }

    #[test]
    fn missing_identifier_is_fatal() {
        let doc = Document::parse(r#"<button data-seam-action="/x" id=""></button>"#);
        let node = doc.root().children()[0].clone();
        assert!(matches!(
            TriggerConfig::from_element(&node),
            Err(EngineError::MissingIdentifier { .. })
        ));
    }

    #[test]
    fn invalid_method_is_fatal() {
        let node = element_in(r#"<a id=l data-seam-action="/x" data-seam-method=TRACE></a>"#, "l");
        assert!(matches!(
            TriggerConfig::from_element(&node),
            Err(EngineError::InvalidMethod { element, method }) if element == "l" && method == "TRACE"
        ));
    }

    #[test]
    fn invalid_debounce_warns_and_fires_immediately() {
        let node = element_in(r#"<button id=b data-seam-action="/x" data-seam-debounce=soon></button>"#, "b");
        let config = TriggerConfig::from_element(&node).expect("still valid");
        assert_eq!(config.debounce(), None);
    }

    #[test]
    fn trigger_defaults_follow_tag_semantics() {
        let form = element_in(r#"<form id=f data-seam-action="/x"></form>"#, "f");
        assert_eq!(TriggerConfig::from_element(&form).unwrap().trigger(), "submit");

        let input = element_in(r#"<input id=i data-seam-action="/x">"#, "i");
        assert_eq!(TriggerConfig::from_element(&input).unwrap().trigger(), "change");

        let button_input = element_in(r#"<input id=i type=button data-seam-action="/x">"#, "i");
        assert_eq!(TriggerConfig::from_element(&button_input).unwrap().trigger(), "click");

        let div = element_in(r#"<div id=d data-seam-action="/x"></div>"#, "d");
        assert_eq!(TriggerConfig::from_element(&div).unwrap().trigger(), "click");
    }

    #[test]
    fn flags_fall_back_to_presence_on_junk() {
        let node = element_in(r#"<button id=b data-seam-action="/x" data-seam-disable-in-flight=maybe></button>"#, "b");
        assert!(TriggerConfig::from_element(&node).unwrap().disable_in_flight());

        let node = element_in(r#"<button id=b data-seam-action="/x" data-seam-disable-in-flight=false></button>"#, "b");
        assert!(!TriggerConfig::from_element(&node).unwrap().disable_in_flight());
    }
}
