//! The engine context object: one per page session, owning the document, the
//! registry, the document-wide interceptor bag, the in-flight registry, the
//! debounce table, and the injected capabilities. `init` is idempotent and
//! `teardown` is explicit; nothing lives in ambient globals.
//!
//! Single-threaded and cooperative: the only suspension points are the
//! debounce deadline (driven by `advance`), a backend-reported pending fetch
//! (resolved by `complete_fetch`), and the optional view-transition bracket.

use std::collections::{HashMap, HashSet};

use dom::{Document, Node};
use protocol::WireResponse;

use crate::attrs::{self, TriggerConfig};
use crate::callbacks::{self, DocumentCallbacks, ElementCallbacks};
use crate::capabilities::{FetchBackend, FetchError, Reconcile, ViewTransition};
use crate::debounce::DebounceTable;
use crate::error::EngineError;
use crate::event::TriggerEvent;
use crate::pipeline::{self, AbortHandle, PipelineCtx};
use crate::registry::{self, Registry};

/// Global configuration, fixed for the engine's lifetime.
#[derive(Clone, Debug)]
pub struct Options {
    /// Cookie names whose values are copied into like-named request headers
    /// (the request-forgery-token pattern).
    pub add_cookie_to_request_header: Vec<String>,
    /// Re-encode form data as a JSON object body (repeated names become
    /// arrays, file fields are dropped). On by default.
    pub encode_form_data_as_json: bool,
    /// Rebuild `<script>` elements arriving in merged content before the
    /// host will execute them. Off unless the host has the quirk.
    pub rebuild_inserted_scripts: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            add_cookie_to_request_header: Vec::new(),
            encode_form_data_as_json: true,
            rebuild_inserted_scripts: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The response was merged; `updated` says whether any instruction was
    /// actually applied.
    Completed { updated: bool },
    /// 202: the host should navigate to `location` when present.
    FollowUp { location: Option<String> },
    /// The trigger entered its coalescing window; `advance` will fire it.
    Debounced,
    /// The backend is still running; settle through `complete_fetch`.
    InFlight,
    /// Cooperative cancellation, silent by contract.
    Aborted,
    /// Network failure, already routed through the error hooks.
    FetchFailed,
    /// >= 400: the page was replaced with the diagnostic rendering.
    DiagnosticRendered,
    /// No registration matched the event.
    Ignored,
}

/// One debounced settlement: the fired element, how many triggers coalesced
/// into it, and the shared result.
pub struct DebounceSettlement {
    pub element: String,
    pub waiters: usize,
    pub result: Result<DispatchOutcome, EngineError>,
}

/// A fetch the backend reported as still running.
pub(crate) struct PendingRequest {
    pub(crate) config: TriggerConfig,
    pub(crate) request: protocol::RequestDetail,
    pub(crate) abort: AbortHandle,
    pub(crate) disabled: Option<dom::Id>,
}

pub struct Engine {
    document: Document,
    registry: Registry,
    callbacks: DocumentCallbacks,
    options: Options,
    cookies: Vec<(String, String)>,
    in_flight: HashSet<String>,
    pending: HashMap<String, PendingRequest>,
    debounce: DebounceTable,
    fetch: Box<dyn FetchBackend>,
    reconcile: Box<dyn Reconcile>,
    transition: Option<Box<dyn ViewTransition>>,
    subscription_active: bool,
    initialized: bool,
    now: u64,
}

impl Engine {
    pub fn new(options: Options, fetch: Box<dyn FetchBackend>, reconcile: Box<dyn Reconcile>) -> Engine {
        Engine {
            document: Document::parse(""),
            registry: Registry::default(),
            callbacks: DocumentCallbacks::default(),
            options,
            cookies: Vec::new(),
            in_flight: HashSet::new(),
            pending: HashMap::new(),
            debounce: DebounceTable::default(),
            fetch,
            reconcile,
            transition: None,
            subscription_active: false,
            initialized: false,
            now: 0,
        }
    }

    pub fn with_transition(mut self, transition: Box<dyn ViewTransition>) -> Engine {
        self.transition = Some(transition);
        self
    }

    /// Install the document-wide interceptor bag, replacing all slots.
    pub fn add_callbacks(&mut self, callbacks: DocumentCallbacks) {
        self.callbacks = callbacks;
    }

    /// Install an element's interceptor bag. The registration must exist.
    pub fn set_element_callbacks(
        &mut self,
        element_id: &str,
        callbacks: ElementCallbacks,
    ) -> Result<(), EngineError> {
        let Some(entry) = self.registry.get_mut(element_id) else {
            return Err(EngineError::NotRegistered {
                element: element_id.to_string(),
            });
        };
        entry.callbacks = callbacks;
        Ok(())
    }

    /// Parse the page, activate the child-list subscription, and run the
    /// bracketed initial scan. Idempotent: a second call is a no-op until
    /// `teardown`.
    pub fn init(&mut self, html: &str) -> Result<(), EngineError> {
        if self.initialized {
            return Ok(());
        }
        self.document = Document::parse(html);
        self.subscription_active = true;
        self.initialized = true;
        if let Some(cb) = self.callbacks.before_document_processed.as_mut() {
            cb();
        }
        let root = self.document.root().id();
        let scanned = registry::scan_from(&mut self.document, &mut self.registry, &mut self.callbacks, root);
        if let Err(err) = scanned {
            self.route_error_for("", &err);
            return Err(err);
        }
        if let Some(cb) = self.callbacks.after_document_processed.as_mut() {
            cb();
        }
        log::trace!(target: "seam.engine", "document processed, {} trigger(s) registered", self.registry.len());
        Ok(())
    }

    /// Deactivate the subscription and drop all registrations and transient
    /// state. The engine can be re-initialized afterwards.
    pub fn teardown(&mut self) {
        self.subscription_active = false;
        self.registry.clear();
        self.debounce.clear();
        self.in_flight.clear();
        self.pending.clear();
        self.initialized = false;
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn is_registered(&self, element_id: &str) -> bool {
        self.registry.contains(element_id)
    }

    pub fn is_in_flight(&self, element_id: &str) -> bool {
        self.in_flight.contains(element_id)
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        match self.cookies.iter().position(|(k, _)| k == name) {
            Some(idx) => self.cookies[idx].1 = value.to_string(),
            None => self.cookies.push((name.to_string(), value.to_string())),
        }
    }

    pub fn set_value(&mut self, element_id: &str, value: &str) -> bool {
        self.document.set_value(element_id, value)
    }

    pub fn set_checked(&mut self, element_id: &str, checked: bool) -> bool {
        self.document.set_checked(element_id, checked)
    }

    pub fn set_active_element(&mut self, element_id: Option<&str>) {
        self.document.set_active_element(element_id);
    }

    /// Feed one trigger event to the engine. Fatal errors surface as `Err`
    /// after passing through both interceptor levels and the log.
    pub fn dispatch(&mut self, event: &TriggerEvent) -> Result<DispatchOutcome, EngineError> {
        let element_id = event.target().to_string();
        let config = {
            let Some(entry) = self.registry.get(&element_id) else {
                return Ok(DispatchOutcome::Ignored);
            };
            if entry.config.trigger() != event.name() {
                return Ok(DispatchOutcome::Ignored);
            }
            entry.config.clone()
        };
        let result = if config.hoist_to().is_some() {
            self.run_hoist(&config, event)
        } else if let Some(delay) = config.debounce() {
            self.debounce.schedule(&element_id, delay, event.clone(), self.now);
            Ok(DispatchOutcome::Debounced)
        } else {
            self.run_pipeline(&config, event)
        };
        if let Err(err) = &result {
            self.route_error_for(&element_id, err);
        }
        result
    }

    /// Advance the logical clock, firing every coalescer whose deadline has
    /// passed. Each fire dispatches once; its settlement is shared by all
    /// coalesced waiters.
    pub fn advance(&mut self, ms: u64) -> Vec<DebounceSettlement> {
        self.now += ms;
        let due = self.debounce.due(self.now);
        let mut settlements = Vec::with_capacity(due.len());
        for element_id in due {
            let Some((event, waiters)) = self.debounce.take(&element_id) else {
                continue;
            };
            let Some(entry) = self.registry.get(&element_id) else {
                settlements.push(DebounceSettlement {
                    element: element_id,
                    waiters,
                    result: Ok(DispatchOutcome::Ignored),
                });
                continue;
            };
            let config = entry.config.clone();
            let result = self.run_pipeline(&config, &event);
            if let Err(err) = &result {
                self.route_error_for(&element_id, err);
            }
            settlements.push(DebounceSettlement {
                element: element_id,
                waiters,
                result,
            });
        }
        settlements
    }

    /// Resolve a fetch the backend reported as pending. Clears the in-flight
    /// mark and restores the disabled control on every path.
    pub fn complete_fetch(
        &mut self,
        element_id: &str,
        result: Result<WireResponse, FetchError>,
    ) -> Result<DispatchOutcome, EngineError> {
        let Some(pending) = self.pending.remove(element_id) else {
            return Err(EngineError::NoPendingRequest {
                element: element_id.to_string(),
            });
        };
        self.in_flight.remove(element_id);
        if let Some(id) = pending.disabled {
            self.document.remove_attr_node(id, "disabled");
        }
        let response = match result {
            Err(e) => {
                let err = EngineError::Network {
                    element: element_id.to_string(),
                    detail: e.to_string(),
                };
                self.route_error_for(element_id, &err);
                return Ok(DispatchOutcome::FetchFailed);
            }
            Ok(r) => r,
        };
        if pending.abort.is_aborted() {
            return Ok(DispatchOutcome::Aborted);
        }
        let outcome = self.with_ctx(|ctx| {
            pipeline::settle_step(ctx, pending.config.id(), &pending.request, &response)
        });
        if let Err(err) = &outcome {
            self.route_error_for(element_id, err);
        }
        outcome
    }

    fn run_pipeline(
        &mut self,
        config: &TriggerConfig,
        event: &TriggerEvent,
    ) -> Result<DispatchOutcome, EngineError> {
        let config = config.clone();
        let event = event.clone();
        self.with_ctx(move |ctx| pipeline::execute(ctx, &config, &event))
    }

    /// One-time trigger transfer: copy action/method onto the hoist target,
    /// register it in place, then run the normal pipeline for the target.
    fn run_hoist(
        &mut self,
        config: &TriggerConfig,
        event: &TriggerEvent,
    ) -> Result<DispatchOutcome, EngineError> {
        let target_id = config
            .hoist_to()
            .expect("hoist handler requires a target")
            .to_string();
        let Some(target_node_id) = self.document.find(&target_id).map(Node::id) else {
            return Err(EngineError::HoistTargetMissing {
                element: config.id().to_string(),
                target: target_id,
            });
        };
        let method_attr = self
            .document
            .find(config.id())
            .and_then(|n| n.attr(attrs::METHOD_ATTR))
            .map(str::to_string);
        self.document.set_attr(&target_id, attrs::ACTION_ATTR, Some(config.action()));
        if let Some(method) = method_attr {
            self.document.set_attr(&target_id, attrs::METHOD_ATTR, Some(&method));
        }
        registry::register_element(
            &mut self.document,
            &mut self.registry,
            &mut self.callbacks,
            target_node_id,
            false,
        )?;
        let target_config = self
            .registry
            .get(&target_id)
            .ok_or(EngineError::NotRegistered {
                element: target_id.clone(),
            })?
            .config
            .clone();
        self.run_pipeline(&target_config, event)
    }

    fn with_ctx<T>(&mut self, f: impl FnOnce(&mut PipelineCtx<'_>) -> T) -> T {
        let mut transition = self.transition.take();
        let result = {
            let mut ctx = PipelineCtx {
                document: &mut self.document,
                registry: &mut self.registry,
                callbacks: &mut self.callbacks,
                options: &self.options,
                cookies: &self.cookies,
                in_flight: &mut self.in_flight,
                pending: &mut self.pending,
                fetch: self.fetch.as_mut(),
                reconcile: self.reconcile.as_mut(),
                transition: match transition {
                    Some(ref mut t) => Some(&mut **t),
                    None => None,
                },
                subscription_active: &mut self.subscription_active,
            };
            f(&mut ctx)
        };
        self.transition = transition;
        result
    }

    fn route_error_for(&mut self, element_id: &str, err: &EngineError) {
        let element_id = err.element().unwrap_or(element_id);
        callbacks::route_error(&mut self.registry, &mut self.callbacks, element_id, err);
    }
}
