use std::cell::Cell;
use std::rc::Rc;

/// A named event aimed at a registered element, the engine's stand-in for
/// host event dispatch. Clones share the default-prevented flag, so a
/// coalesced copy marking the event as handled is visible to the original.
#[derive(Clone, Debug)]
pub struct TriggerEvent {
    name: String,
    target: String,
    submitter: Option<String>,
    default_prevented: Rc<Cell<bool>>,
}

impl TriggerEvent {
    pub fn new(name: &str, target: &str) -> TriggerEvent {
        TriggerEvent {
            name: name.to_string(),
            target: target.to_string(),
            submitter: None,
            default_prevented: Rc::new(Cell::new(false)),
        }
    }

    pub fn submit(target: &str) -> TriggerEvent {
        TriggerEvent::new("submit", target)
    }

    pub fn with_submitter(mut self, submitter: &str) -> TriggerEvent {
        self.submitter = Some(submitter.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn submitter(&self) -> Option<&str> {
        self.submitter.as_deref()
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub(crate) fn prevent_default(&self) {
        self.default_prevented.set(true);
    }
}
