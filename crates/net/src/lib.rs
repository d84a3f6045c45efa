//! Live HTTP transport for the engine, built on a blocking `ureq` agent.
//!
//! ureq reports >= 400 statuses as errors; this backend folds them back into
//! `WireResponse` so the engine's status classification owns that branch.
//! Transport failures (DNS, TLS, refused connections) become `FetchError`.

use std::time::Duration;

use engine::{FetchBackend, FetchError, FetchOutcome};
use protocol::{RequestDetail, WireResponse};

pub struct HttpFetch {
    agent: ureq::Agent,
}

impl HttpFetch {
    pub fn new() -> HttpFetch {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .user_agent("seam/0.1")
            .build();
        HttpFetch { agent }
    }
}

impl Default for HttpFetch {
    fn default() -> Self {
        HttpFetch::new()
    }
}

impl FetchBackend for HttpFetch {
    fn send(&mut self, request: &RequestDetail) -> FetchOutcome {
        let started = std::time::Instant::now();
        let mut call = self.agent.request(request.method.as_str(), &request.action);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }
        let result = if request.body.is_empty() {
            call.call()
        } else {
            call.send_string(&request.body)
        };
        let response = match result {
            Ok(response) => response,
            // the engine classifies >= 400 itself
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                log::warn!(
                    target: "seam.net",
                    "{} {} failed after {}ms: {transport}",
                    request.method.as_str(),
                    request.action,
                    started.elapsed().as_millis()
                );
                return FetchOutcome::Settled(Err(FetchError::new(transport.to_string())));
            }
        };
        FetchOutcome::Settled(into_wire(response))
    }
}

fn into_wire(response: ureq::Response) -> Result<WireResponse, FetchError> {
    let mut wire = WireResponse::new(response.status());
    for name in response.headers_names() {
        if let Some(value) = response.header(&name) {
            wire = wire.with_header(&name, value);
        }
    }
    let body = response
        .into_string()
        .map_err(|e| FetchError::new(format!("reading response body: {e}")))?;
    Ok(wire.with_body(&body))
}
