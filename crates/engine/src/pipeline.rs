//! Request pipeline state machine.
//!
//! Idle → Building → AwaitingPreflight → Fetching → Settling → Idle, with an
//! absorbing error path reachable from any state. Each transition is a `Step`
//! arm in the driver loop, so the same logic runs under tests by direct state
//! injection, independent of any host event mechanism.
//!
//! The fetch call is the pipeline's one true suspension point: a backend may
//! settle synchronously or report `Pending`, in which case the element stays
//! in flight until the host completes the call (`Engine::complete_fetch`).
//! Abort is checked immediately before and after the call; a fetch that never
//! settles leaves the element permanently in flight.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use dom::{Document, FormValue, Id, Node};
use protocol::{
    CONTENT_TYPE_HEADER, Method, REQUEST_MARKER_HEADER, RedirectPolicy, RequestDetail,
    WireResponse,
};
use serde_json::Value;

use crate::attrs::TriggerConfig;
use crate::callbacks::{DocumentCallbacks, route_error};
use crate::capabilities::{FetchBackend, FetchOutcome, Reconcile, ViewTransition};
use crate::engine::{DispatchOutcome, Options, PendingRequest};
use crate::error::EngineError;
use crate::event::TriggerEvent;
use crate::merge;
use crate::registry::Registry;

/// Cooperative cancellation token. Clones share one flag; single-threaded by
/// design, like the rest of the engine.
#[derive(Clone, Debug)]
pub struct AbortHandle(Rc<Cell<bool>>);

impl AbortHandle {
    pub(crate) fn new() -> AbortHandle {
        AbortHandle(Rc::new(Cell::new(false)))
    }

    pub fn abort(&self) {
        self.0.set(true);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.get()
    }
}

/// The request view handed to `before_fetch` hooks. Header edits flow back
/// into the outgoing request; action, method and body are read-only copies.
pub struct RequestConfiguration {
    pub trigger: TriggerEvent,
    pub action: String,
    pub method: Method,
    pub body: String,
    pub headers: Vec<(String, String)>,
    abort: AbortHandle,
}

impl RequestConfiguration {
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

pub(crate) struct PipelineCtx<'a> {
    pub document: &'a mut Document,
    pub registry: &'a mut Registry,
    pub callbacks: &'a mut DocumentCallbacks,
    pub options: &'a Options,
    pub cookies: &'a [(String, String)],
    pub in_flight: &'a mut HashSet<String>,
    pub pending: &'a mut HashMap<String, PendingRequest>,
    pub fetch: &'a mut dyn FetchBackend,
    pub reconcile: &'a mut dyn Reconcile,
    pub transition: Option<&'a mut dyn ViewTransition>,
    pub subscription_active: &'a mut bool,
}

enum Step {
    Building,
    AwaitingPreflight {
        request: RequestDetail,
        form_data: Vec<(String, FormValue)>,
    },
    Fetching {
        request: RequestDetail,
        abort: AbortHandle,
    },
    Settling {
        request: RequestDetail,
        response: WireResponse,
    },
    Done(DispatchOutcome),
}

pub(crate) fn execute(
    ctx: &mut PipelineCtx<'_>,
    config: &TriggerConfig,
    event: &TriggerEvent,
) -> Result<DispatchOutcome, EngineError> {
    let element_id = config.id();
    let mut step = Step::Building;
    loop {
        step = match step {
            Step::Building => {
                if ctx.in_flight.contains(element_id) {
                    return Err(EngineError::AlreadyExecuting {
                        element: element_id.to_string(),
                    });
                }
                if !config.allow_default() {
                    event.prevent_default();
                }
                let (request, form_data) = build_request(ctx.document, config, event);
                Step::AwaitingPreflight { request, form_data }
            }
            Step::AwaitingPreflight {
                mut request,
                form_data,
            } => {
                let abort = preflight(ctx, config, event, &mut request, &form_data);
                if abort.is_aborted() {
                    // synchronous abort: no in-flight mark, no further hooks
                    Step::Done(DispatchOutcome::Aborted)
                } else {
                    Step::Fetching { request, abort }
                }
            }
            Step::Fetching { request, abort } => {
                ctx.in_flight.insert(element_id.to_string());
                let disabled = if config.disable_in_flight() {
                    disable_target(ctx.document, element_id)
                } else {
                    None
                };
                if let Some(id) = disabled {
                    ctx.document.set_attr_node(id, "disabled", Some(""));
                }
                match ctx.fetch.send(&request) {
                    FetchOutcome::Pending => {
                        ctx.pending.insert(
                            element_id.to_string(),
                            PendingRequest {
                                config: config.clone(),
                                request,
                                abort,
                                disabled,
                            },
                        );
                        Step::Done(DispatchOutcome::InFlight)
                    }
                    FetchOutcome::Settled(sent) => {
                        // restoration runs on every settled path out of Fetching
                        ctx.in_flight.remove(element_id);
                        if let Some(id) = disabled {
                            ctx.document.remove_attr_node(id, "disabled");
                        }
                        match sent {
                            Err(e) => {
                                let err = EngineError::Network {
                                    element: element_id.to_string(),
                                    detail: e.to_string(),
                                };
                                route_error(ctx.registry, ctx.callbacks, element_id, &err);
                                Step::Done(DispatchOutcome::FetchFailed)
                            }
                            Ok(_) if abort.is_aborted() => Step::Done(DispatchOutcome::Aborted),
                            Ok(response) => Step::Settling { request, response },
                        }
                    }
                }
            }
            Step::Settling { request, response } => {
                Step::Done(settle_step(ctx, config.id(), &request, &response)?)
            }
            Step::Done(outcome) => return Ok(outcome),
        };
    }
}

/// Fetching → Settling → Idle, shared by the synchronous path and
/// `Engine::complete_fetch` resuming a pending request.
pub(crate) fn settle_step(
    ctx: &mut PipelineCtx<'_>,
    element_id: &str,
    request: &RequestDetail,
    response: &WireResponse,
) -> Result<DispatchOutcome, EngineError> {
    if let Some(entry) = ctx.registry.get_mut(element_id)
        && let Some(cb) = entry.callbacks.after_fetch.as_mut()
    {
        cb(request, response);
    }
    if let Some(cb) = ctx.callbacks.after_fetch.as_mut() {
        cb(element_id, request, response);
    }
    merge::settle(ctx, element_id, response)
}

fn build_request(
    document: &Document,
    config: &TriggerConfig,
    event: &TriggerEvent,
) -> (RequestDetail, Vec<(String, FormValue)>) {
    let element_id = config.id();
    let form = document.enclosing_form(element_id);
    let mut form_data = document.collect_form_data(form, event.submitter());
    if form.is_none()
        && let Some(node) = document.find(element_id)
        && let Some(name) = node.attr("name").map(str::trim).filter(|n| !n.is_empty())
    {
        // a formless trigger contributes its own name/value pair
        let value = document
            .current_value(node)
            .unwrap_or_else(|| node.attr("value").unwrap_or("").to_string());
        form_data.push((name.to_string(), FormValue::Text(value)));
    }
    let request = RequestDetail {
        action: config.action().to_string(),
        method: config.method(),
        redirect: RedirectPolicy::Follow,
        body: String::new(),
        headers: vec![(REQUEST_MARKER_HEADER.to_string(), String::new())],
    };
    (request, form_data)
}

fn preflight(
    ctx: &mut PipelineCtx<'_>,
    config: &TriggerConfig,
    event: &TriggerEvent,
    request: &mut RequestDetail,
    form_data: &[(String, FormValue)],
) -> AbortHandle {
    for name in &ctx.options.add_cookie_to_request_header {
        if let Some((_, value)) = ctx.cookies.iter().find(|(k, _)| k == name) {
            request.headers.push((name.clone(), value.clone()));
        }
    }
    if ctx.options.encode_form_data_as_json {
        request
            .headers
            .push((CONTENT_TYPE_HEADER.to_string(), "application/json".to_string()));
        let object = collapse_form_data(form_data);
        if !object.is_empty() {
            request.body = Value::Object(object).to_string();
        }
    } else if !form_data.is_empty() {
        request.body = urlencode_pairs(form_data);
        request.headers.push((
            CONTENT_TYPE_HEADER.to_string(),
            "application/x-www-form-urlencoded".to_string(),
        ));
    }
    if request.method.carries_query() {
        let query = query_string(form_data);
        if !query.is_empty() {
            request
                .action
                .push(if request.action.contains('?') { '&' } else { '?' });
            request.action.push_str(&query);
        }
        request.body.clear();
    }
    let abort = AbortHandle::new();
    let mut view = RequestConfiguration {
        trigger: event.clone(),
        action: request.action.clone(),
        method: request.method,
        body: request.body.clone(),
        headers: std::mem::take(&mut request.headers),
        abort: abort.clone(),
    };
    if let Some(entry) = ctx.registry.get_mut(config.id())
        && let Some(cb) = entry.callbacks.before_fetch.as_mut()
    {
        cb(&mut view);
    }
    if let Some(cb) = ctx.callbacks.before_fetch.as_mut() {
        cb(config.id(), &mut view);
    }
    request.headers = view.headers;
    abort
}

/// Collapse form pairs the way the JSON encoding does: repeated names become
/// arrays, file-valued fields are dropped.
fn collapse_form_data(pairs: &[(String, FormValue)]) -> serde_json::Map<String, Value> {
    let mut object = serde_json::Map::new();
    for (key, value) in pairs {
        let FormValue::Text(text) = value else {
            continue;
        };
        let merged = match object.remove(key) {
            None => Value::String(text.clone()),
            Some(Value::String(prev)) => {
                Value::Array(vec![Value::String(prev), Value::String(text.clone())])
            }
            Some(Value::Array(mut items)) => {
                items.push(Value::String(text.clone()));
                Value::Array(items)
            }
            Some(other) => other,
        };
        object.insert(key.clone(), merged);
    }
    object
}

/// Query string for GET/DELETE: the JSON-object-collapsed form data, arrays
/// expanded to repeated pairs.
fn query_string(pairs: &[(String, FormValue)]) -> String {
    let object = collapse_form_data(pairs);
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &object {
        match value {
            Value::String(s) => {
                serializer.append_pair(key, s);
            }
            Value::Array(items) => {
                for item in items {
                    if let Value::String(s) = item {
                        serializer.append_pair(key, s);
                    }
                }
            }
            _ => {}
        }
    }
    serializer.finish()
}

fn urlencode_pairs(pairs: &[(String, FormValue)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        let text = match value {
            FormValue::Text(s) => s,
            FormValue::File(name) => name,
        };
        serializer.append_pair(key, text);
    }
    serializer.finish()
}

/// The control to disable while in flight: the nearest enclosing `fieldset`,
/// else the `optgroup` for an option, else the interactive control itself.
fn disable_target(document: &Document, element_id: &str) -> Option<Id> {
    if let Some(fieldset) = document.closest(element_id, |n| n.is_element_named("fieldset")) {
        return Some(fieldset.id());
    }
    let node = document.find(element_id)?;
    match node.tag()? {
        "option" => document
            .closest(element_id, |n| n.is_element_named("optgroup"))
            .map(Node::id)
            .or(Some(node.id())),
        "input" | "textarea" | "select" | "button" => Some(node.id()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(v: &str) -> FormValue {
        FormValue::Text(v.to_string())
    }

    #[test]
    fn collapse_merges_repeated_names_and_drops_files() {
        let pairs = vec![
            ("a".to_string(), text("1")),
            ("b".to_string(), text("2")),
            ("a".to_string(), text("3")),
            ("a".to_string(), text("4")),
            ("f".to_string(), FormValue::File("x.bin".to_string())),
        ];
        let object = collapse_form_data(&pairs);
        assert_eq!(object.len(), 2);
        assert_eq!(object["b"], Value::String("2".to_string()));
        assert_eq!(
            object["a"],
            Value::Array(vec![
                Value::String("1".to_string()),
                Value::String("3".to_string()),
                Value::String("4".to_string()),
            ])
        );
    }

    #[test]
    fn query_string_expands_arrays_to_repeated_pairs() {
        let pairs = vec![
            ("a".to_string(), text("1")),
            ("a".to_string(), text("2")),
            ("q".to_string(), text("x y")),
        ];
        assert_eq!(query_string(&pairs), "a=1&a=2&q=x+y");
    }

    #[test]
    fn disable_target_prefers_the_enclosing_fieldset() {
        let doc = Document::parse(concat!(
            "<form><fieldset id=fs><button id=b name=x></button></fieldset></form>",
            "<input id=lone name=y>",
            "<div id=plain></div>",
        ));
        assert_eq!(disable_target(&doc, "b"), Some(doc.find("fs").unwrap().id()));
        assert_eq!(disable_target(&doc, "lone"), Some(doc.find("lone").unwrap().id()));
        assert_eq!(disable_target(&doc, "plain"), None);
    }

    #[test]
    fn option_falls_back_to_optgroup_then_itself() {
        let doc = Document::parse(
            "<select><optgroup id=g><option id=o1 value=a></option></optgroup><option id=o2 value=b></option></select>",
        );
        assert_eq!(disable_target(&doc, "o1"), Some(doc.find("g").unwrap().id()));
        assert_eq!(disable_target(&doc, "o2"), Some(doc.find("o2").unwrap().id()));
    }
}
