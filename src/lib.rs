//! seam: keep a page in sync with a server without a full reload.
//!
//! Elements declare an action through `data-seam-*` attributes; trigger
//! events run a request pipeline; the response's `seam-merge` header and
//! multi-fragment HTML body drive ordered DOM merges (replace, adjacent
//! insert, morph, remove). This crate is the facade over the workspace:
//! the engine plus its default capabilities.

pub use dom::{
    Document, FormValue, Id, InsertPosition, MorphError, MorphOptions, Node, inner_html,
    outer_html,
};
pub use engine::{
    AbortHandle, DebounceSettlement, DispatchOutcome, DocumentCallbacks, DomReconciler,
    ElementCallbacks, Engine, EngineError, FetchBackend, FetchError, FetchOutcome, Options,
    Reconcile, RequestConfiguration, SCRIPT_PROCESSED_ATTR, TriggerEvent, ViewTransition, attrs,
};
pub use net::HttpFetch;
pub use protocol::{
    CLOSE_DIALOG_HEADER, CloseDialogTrigger, MERGE_HEADER, MORPH_IGNORE_ACTIVE_HEADER,
    MergeInstruction, MergeStrategy, Method, REQUEST_MARKER_HEADER, RequestDetail, WireResponse,
};

/// An engine wired to the live HTTP transport and the default reconciler.
pub fn with_http_transport(options: Options) -> Engine {
    Engine::new(options, Box::new(HttpFetch::new()), Box::new(DomReconciler))
}
