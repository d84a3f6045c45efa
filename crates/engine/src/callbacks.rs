//! Two-level interceptor bus: a per-element bag consulted first, then the
//! document-wide bag, at every extension point. `before_*` hooks returning
//! `false` cancel the step they guard; everything else is notification only.

use dom::Node;
use protocol::{MergeStrategy, RequestDetail, WireResponse};

use crate::error::EngineError;
use crate::pipeline::RequestConfiguration;
use crate::registry::Registry;

/// Per-element interceptor bag, owned by the registration and destroyed with
/// it. Installed via `Engine::set_element_callbacks`.
#[derive(Default)]
pub struct ElementCallbacks {
    pub before_fetch: Option<Box<dyn FnMut(&mut RequestConfiguration)>>,
    pub after_fetch: Option<Box<dyn FnMut(&RequestDetail, &WireResponse)>>,
    pub before_document_update: Option<Box<dyn FnMut(&Node, MergeStrategy) -> bool>>,
    pub after_document_update: Option<Box<dyn FnMut()>>,
    pub on_trigger_error: Option<Box<dyn FnMut(&EngineError)>>,
}

/// Document-wide interceptor bag: the element-level slots plus lifecycle
/// hooks. One per engine, process-wide lifetime.
#[derive(Default)]
pub struct DocumentCallbacks {
    pub before_document_processed: Option<Box<dyn FnMut()>>,
    pub after_document_processed: Option<Box<dyn FnMut()>>,
    pub before_initialize_element: Option<Box<dyn FnMut(&Node) -> bool>>,
    pub after_initialize_element: Option<Box<dyn FnMut(&Node)>>,
    pub before_fetch: Option<Box<dyn FnMut(&str, &mut RequestConfiguration)>>,
    pub after_fetch: Option<Box<dyn FnMut(&str, &RequestDetail, &WireResponse)>>,
    pub before_document_update: Option<Box<dyn FnMut(&str, &Node, MergeStrategy) -> bool>>,
    pub after_document_update: Option<Box<dyn FnMut(&str)>>,
    pub on_element_added: Option<Box<dyn FnMut(&Node)>>,
    pub on_element_removed: Option<Box<dyn FnMut(&Node)>>,
    pub on_element_morphed: Option<Box<dyn FnMut(&Node)>>,
    pub on_trigger_error: Option<Box<dyn FnMut(&str, &EngineError)>>,
}

/// Element bag, then document bag, then the log. Nothing is swallowed and
/// nothing is retried.
pub(crate) fn route_error(
    registry: &mut Registry,
    callbacks: &mut DocumentCallbacks,
    element_id: &str,
    err: &EngineError,
) {
    if let Some(entry) = registry.get_mut(element_id)
        && let Some(cb) = entry.callbacks.on_trigger_error.as_mut()
    {
        cb(err);
    }
    if let Some(cb) = callbacks.on_trigger_error.as_mut() {
        cb(element_id, err);
    }
    log::error!(target: "seam.engine", "trigger error on element {element_id}: {err}");
}
