//! Injected capabilities: the transport, the structural differ, and the
//! optional visual transition. The engine only ever sees these traits, so
//! every one of them is substitutable with a test double.

use dom::{Document, Id, MorphError, MorphOptions, Node};
use protocol::{RequestDetail, WireResponse};

#[derive(Clone, Debug)]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> FetchError {
        FetchError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FetchError {}

/// How one network call ended, from the engine's point of view.
pub enum FetchOutcome {
    /// The backend resolved synchronously, successfully or not.
    Settled(Result<WireResponse, FetchError>),
    /// The call is still running; the element stays in flight until the host
    /// resolves it through `Engine::complete_fetch`. A call that never
    /// settles leaves the element permanently in flight.
    Pending,
}

/// Transport capability. The engine checks its abort handle around this call;
/// the backend itself is free to enforce timeouts or not.
pub trait FetchBackend {
    fn send(&mut self, request: &RequestDetail) -> FetchOutcome;
}

/// Structural reconciliation of a live subtree against new markup. Returns
/// the resulting top-level nodes of the morph target.
pub trait Reconcile {
    fn reconcile(
        &mut self,
        document: &mut Document,
        target: &str,
        new_children: Vec<Node>,
        options: &MorphOptions,
    ) -> Result<Vec<Id>, MorphError>;
}

/// Default reconciler backed by the dom crate's morph.
pub struct DomReconciler;

impl Reconcile for DomReconciler {
    fn reconcile(
        &mut self,
        document: &mut Document,
        target: &str,
        new_children: Vec<Node>,
        options: &MorphOptions,
    ) -> Result<Vec<Id>, MorphError> {
        dom::morph::morph(document, target, new_children, options)
    }
}

/// Synchronous visual-transition bracket around a merge batch. The engine
/// behaves identically when no transition capability is installed.
pub trait ViewTransition {
    fn around(&mut self, apply: &mut dyn FnMut());
}
