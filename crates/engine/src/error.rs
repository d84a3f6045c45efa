//! Error taxonomy for trigger processing.
//!
//! Configuration, concurrency and protocol errors are fatal per-attempt and
//! surface as `Err` after passing through both interceptor levels; network
//! failures are routed the same way but settle as an outcome, leaving the
//! page unchanged. Nothing is retried.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    InvalidMethod { element: String, method: String },
    MissingIdentifier { tag: String },
    AlreadyExecuting { element: String },
    HoistTargetMissing { element: String, target: String },
    NotRegistered { element: String },
    NoPendingRequest { element: String },
    MissingMergeHeader,
    MalformedHeader { header: String, detail: String },
    MissingFragment { fragment: String },
    EmptyFragment { fragment: String },
    MissingTarget { target: String },
    Network { element: String, detail: String },
}

impl EngineError {
    /// The element a routing pass should address, when the error names one.
    pub(crate) fn element(&self) -> Option<&str> {
        match self {
            EngineError::InvalidMethod { element, .. }
            | EngineError::AlreadyExecuting { element }
            | EngineError::HoistTargetMissing { element, .. }
            | EngineError::NotRegistered { element }
            | EngineError::NoPendingRequest { element }
            | EngineError::Network { element, .. } => Some(element),
            _ => None,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidMethod { element, method } => {
                write!(f, "{method} is not a valid HTTP method (element {element})")
            }
            EngineError::MissingIdentifier { tag } => {
                write!(f, "element <{tag}> declaring an action must have a unique id")
            }
            EngineError::AlreadyExecuting { element } => {
                write!(f, "element {element} is already executing a request")
            }
            EngineError::HoistTargetMissing { element, target } => {
                write!(f, "element {element} hoists to {target}, which is not in the document")
            }
            EngineError::NotRegistered { element } => {
                write!(f, "element {element} is not registered")
            }
            EngineError::NoPendingRequest { element } => {
                write!(f, "element {element} has no request awaiting completion")
            }
            EngineError::MissingMergeHeader => {
                write!(f, "expected a {} header on the response", protocol::MERGE_HEADER)
            }
            EngineError::MalformedHeader { header, detail } => {
                write!(f, "malformed {header} header: {detail}")
            }
            EngineError::MissingFragment { fragment } => {
                write!(f, "expected a response body fragment with id \"{fragment}\"")
            }
            EngineError::EmptyFragment { fragment } => {
                write!(f, "expected one or more child nodes in fragment \"{fragment}\"")
            }
            EngineError::MissingTarget { target } => {
                write!(f, "expected a document element with id \"{target}\"")
            }
            EngineError::Network { element, detail } => {
                write!(f, "request for element {element} failed: {detail}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
