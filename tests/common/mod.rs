#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use seam::{
    DomReconciler, Engine, FetchBackend, FetchError, FetchOutcome, MERGE_HEADER, Options,
    RequestDetail, WireResponse,
};

/// Transport double: answers from a queue and records every request.
pub struct ScriptedFetch {
    responses: VecDeque<FetchOutcome>,
    requests: Rc<RefCell<Vec<RequestDetail>>>,
}

impl ScriptedFetch {
    pub fn new(responses: Vec<FetchOutcome>) -> (ScriptedFetch, Rc<RefCell<Vec<RequestDetail>>>) {
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

pub fn settled(response: WireResponse) -> FetchOutcome {
    FetchOutcome::Settled(Ok(response))
}

pub fn failed(message: &str) -> FetchOutcome {
    FetchOutcome::Settled(Err(FetchError::new(message)))
}

pub fn engine_with(responses: Vec<FetchOutcome>) -> (Engine, Rc<RefCell<Vec<RequestDetail>>>) {
    engine_with_options(Options::default(), responses)
}

pub fn engine_with_options(
    options: Options,
    responses: Vec<FetchOutcome>,
) -> (Engine, Rc<RefCell<Vec<RequestDetail>>>) {
    let (fetch, log) = ScriptedFetch::new(responses);
    (
        Engine::new(options, Box::new(fetch), Box::new(DomReconciler)),
        log,
    )
}

/// A 200 with one merge instruction and its fragment.
pub fn merge_response(target: &str, strategy: &str, fragment_html: &str) -> WireResponse {
    WireResponse::new(200)
        .with_header(
            MERGE_HEADER,
            &format!(r#"[{{"target":"{target}","strategy":"{strategy}"}}]"#),
        )
        .with_body(&format!(
            r#"<template id="{target}-fragment">{fragment_html}</template>"#
        ))
}

/// Shared event recorder for hook-order assertions.
pub fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) + Clone) {
    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = {
        let seen = Rc::clone(&seen);
        move |entry: &str| seen.borrow_mut().push(entry.to_string())
    };
    (seen, sink)
}
