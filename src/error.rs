//! Error taxonomy for the schema algebra and the alternative compiler.
//!
//! Rules whose reference path does not resolve are *not* errors: they are
//! skipped with a warning (see `whens`). Everything here aborts the whole
//! compilation; there is no partial `oneOf`.

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation was applied to a schema kind it does not support,
    /// e.g. removing a field from a string schema.
    #[error("cannot {op} on a schema of type `{found}`")]
    InvalidOperation { op: &'static str, found: &'static str },

    #[error("unknown reference `{0}`")]
    UnknownReference(String),

    #[error("malformed schema at {path}: {reason}")]
    MalformedSchema { path: String, reason: String },

    #[error("schema nesting exceeds the configured limit of {limit}")]
    DepthExceeded { limit: usize },

    /// Deserialization failure with the JSON path where it happened.
    #[error("at JSON path {path} → {message}")]
    Deserialize { path: String, message: String },

    #[error("jq: {0}")]
    Jq(String),
}

impl Error {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        let path = if path.is_empty() { "/".to_string() } else { path.to_string() };
        Self::MalformedSchema { path, reason: reason.into() }
    }
}
