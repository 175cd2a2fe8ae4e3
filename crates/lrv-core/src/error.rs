//! Error types shared by the engine, the store and the session.

use thiserror::Error;

/// Problems with the static rule configuration.
///
/// `UnsupportedWidget` never escapes the widget resolver: it is logged and the
/// field falls back to a plain textbox. The other variants fail config load.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unsupported widget type '{0}'")]
    UnsupportedWidget(String),
    #[error("invalid rule path '{path}': {reason}")]
    InvalidRulePath { path: String, reason: String },
    #[error("cannot read rules file: {0}")]
    Read(#[from] std::io::Error),
    #[error("malformed rules file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A path string that does not follow the `a.b[0].c` syntax.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid path '{path}': {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Path(#[from] PathError),
    /// A collect or list operation looked up a path the index never bound.
    #[error("no editor bound at path '{0}'")]
    UnboundPath(String),
    /// Text a typed editor cannot hold, e.g. a non-date for a datepicker.
    #[error("invalid input for '{path}': {reason}")]
    InvalidInput { path: String, reason: String },
    #[error("list '{path}' has no row with id {row}")]
    UnknownRow { path: String, row: u64 },
    #[error("payload root '{0}' not found in document")]
    MissingPayload(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("validation failed: {0}")]
    Validation(String),
}

pub type Result<T, E = ReviewError> = std::result::Result<T, E>;
