//! Error types shared by the transformers, publisher and sinks

use std::error::Error;
use std::fmt;

/// Failure to deliver a bulk request to the document store.
///
/// Always fatal for the run: the publisher records it, drains in-flight
/// work and surfaces it from [`close()`](crate::BatchPublisher::close).
#[derive(Debug)]
pub enum TransportError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Request exceeded the configured per-request timeout
    Timeout,
    /// Store answered but the body could not be understood
    MalformedResponse(String),
    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Timeout => write!(f, "bulk request timed out"),
            Self::MalformedResponse(msg) => write!(f, "malformed bulk response: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl TransportError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Error returned by [`BatchPublisher`](crate::BatchPublisher) operations.
#[derive(Debug)]
pub enum PublishError {
    /// Document submitted after `close()`
    Closed,
    /// A flush already failed at the transport level
    Transport(String),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "publisher is closed"),
            Self::Transport(msg) => write!(f, "bulk transport failed: {msg}"),
        }
    }
}

impl Error for PublishError {}

/// Failure to turn a parsed record into a document.
#[derive(Debug)]
pub enum TransformError {
    /// Document body could not be serialized
    Serialize(serde_json::Error),
    /// Object or child entry arrived outside a snapshot scope
    NoActiveSnapshot,
    /// Publisher refused the document
    Publish(PublishError),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize(e) => write!(f, "failed to serialize document: {e}"),
            Self::NoActiveSnapshot => write!(f, "entry received before any snapshot header"),
            Self::Publish(e) => write!(f, "{e}"),
        }
    }
}

impl Error for TransformError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialize(e) => Some(e),
            Self::Publish(e) => Some(e),
            Self::NoActiveSnapshot => None,
        }
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

impl From<PublishError> for TransformError {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

/// Failure of an external parser to decode an input file.
#[derive(Debug)]
pub enum ParseError {
    Io(std::io::Error),
    /// Unreadable content at a 1-based line
    Format { line: usize, message: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Format { line, message } => write!(f, "line {line}: {message}"),
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Format { .. } => None,
        }
    }
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Log an error; with `debug` also walk and log its `source()` chain.
pub fn log_error(context: &str, err: &dyn Error, debug: bool) {
    log::error!("{context}: {err}");
    if !debug {
        return;
    }
    let mut cause = err.source();
    while let Some(e) = cause {
        log::error!("  caused by: {e}");
        cause = e.source();
    }
    log::debug!("{context}: {err:?}");
}
