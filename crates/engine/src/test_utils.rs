//! Shared doubles for engine tests: a scripted transport and builders.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use protocol::{RequestDetail, WireResponse};

use crate::capabilities::{DomReconciler, FetchBackend, FetchError, FetchOutcome};
use crate::engine::{Engine, Options};

/// Transport double: answers from a queue and records every request.
pub(crate) struct ScriptedFetch {
    responses: VecDeque<FetchOutcome>,
    requests: Rc<RefCell<Vec<RequestDetail>>>,
}

impl ScriptedFetch {
    pub(crate) fn new(
        responses: Vec<FetchOutcome>,
    ) -> (ScriptedFetch, Rc<RefCell<Vec<RequestDetail>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (
            ScriptedFetch {
                responses: responses.into(),
                requests: Rc::clone(&log),
            },
            log,
        )
    }
}

impl FetchBackend for ScriptedFetch {
    fn send(&mut self, request: &RequestDetail) -> FetchOutcome {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .pop_front()
            .unwrap_or_else(|| FetchOutcome::Settled(Err(FetchError::new("no scripted response left"))))
    }
}

pub(crate) fn settled(response: WireResponse) -> FetchOutcome {
    FetchOutcome::Settled(Ok(response))
}

pub(crate) fn engine_with(
    responses: Vec<FetchOutcome>,
) -> (Engine, Rc<RefCell<Vec<RequestDetail>>>) {
    engine_with_options(Options::default(), responses)
}

pub(crate) fn engine_with_options(
    options: Options,
    responses: Vec<FetchOutcome>,
) -> (Engine, Rc<RefCell<Vec<RequestDetail>>>) {
    let (fetch, log) = ScriptedFetch::new(responses);
    (
        Engine::new(options, Box::new(fetch), Box::new(DomReconciler)),
        log,
    )
}
