//! The client-side trigger/fetch/merge engine.
//!
//! Elements declare an action through `data-seam-*` attributes; the registry
//! discovers them, trigger events run the request pipeline, and the server's
//! response headers plus multi-fragment body drive ordered DOM merges. The
//! transport, the structural differ, and the visual transition are injected
//! capabilities, so the whole engine runs under tests with doubles.

pub mod attrs;

mod callbacks;
mod capabilities;
mod debounce;
mod engine;
mod error;
mod event;
mod merge;
mod pipeline;
mod registry;
mod scripts;
#[cfg(test)]
mod test_utils;

pub use crate::callbacks::{DocumentCallbacks, ElementCallbacks};
pub use crate::capabilities::{
    DomReconciler, FetchBackend, FetchError, FetchOutcome, Reconcile, ViewTransition,
};
pub use crate::engine::{DebounceSettlement, DispatchOutcome, Engine, Options};
pub use crate::error::EngineError;
pub use crate::event::TriggerEvent;
pub use crate::pipeline::{AbortHandle, RequestConfiguration};
pub use crate::scripts::SCRIPT_PROCESSED_ATTR;
