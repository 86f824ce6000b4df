/// How an error should be treated by the polling loops.
///
/// Nothing terminates a loop: every class is caught per experiment and the
/// experiment is re-driven by the next cycle. The class decides the log
/// level and whether the failure is expected to clear on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// An external dependency was unreachable or answered with a failure.
    Transient,
    /// A record is missing fields or is malformed; needs a data fix.
    Data,
    /// An internal invariant broke.
    Fatal,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Data => "data",
            ErrorClass::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("No credential found for user {0}")]
    MissingCredential(String),

    #[error("Store unavailable: {0}")]
    Store(String),

    #[error("Queue unavailable: {0}")]
    Queue(String),

    #[error("Backend request failed: {0}")]
    Backend(String),

    #[error("Backend returned HTTP {0}")]
    BackendStatus(u16),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CoreError::Store(_)
            | CoreError::Queue(_)
            | CoreError::Backend(_)
            | CoreError::BackendStatus(_) => ErrorClass::Transient,
            CoreError::NotFound { .. }
            | CoreError::Malformed(_)
            | CoreError::MissingCredential(_) => ErrorClass::Data,
            CoreError::Internal(_) => ErrorClass::Fatal,
        }
    }
}
