//! Core error types.

use std::fmt;
use std::panic::Location;

/// Errors raised while building or transforming messages.
#[derive(Debug)]
pub enum Error {
    /// An argument passed to a message mutator was rejected.
    InvalidArgument(String),

    /// Status code outside 100..=599.
    InvalidStatus(u16),

    /// I/O error (e.g. moving an uploaded file).
    Io(std::io::Error),

    /// HTTP error.
    Http(http::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::InvalidStatus(code) => write!(f, "invalid status code: {}", code),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Application failure raised by a handler or middleware.
///
/// Remembers where it was created so the connection handler can report
/// `file:line` in debug mode. Conversions via `?` record the location of
/// the `?` itself.
#[derive(Debug)]
pub struct HandlerError {
    message: String,
    location: &'static Location<'static>,
}

impl HandlerError {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
        }
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.location.line()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    #[track_caller]
    fn from(msg: String) -> Self {
        HandlerError::new(msg)
    }
}

impl From<&str> for HandlerError {
    #[track_caller]
    fn from(msg: &str) -> Self {
        HandlerError::new(msg)
    }
}

impl From<Error> for HandlerError {
    #[track_caller]
    fn from(e: Error) -> Self {
        HandlerError::new(e.to_string())
    }
}

impl From<std::io::Error> for HandlerError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        HandlerError::new(e.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    #[track_caller]
    fn from(e: serde_json::Error) -> Self {
        HandlerError::new(e.to_string())
    }
}

/// Outcome of a failed dispatch through the pipeline and router.
#[derive(Debug)]
pub enum DispatchError {
    /// No route matched the request.
    NotFound,

    /// Any other application failure.
    Failed(HandlerError),
}

impl DispatchError {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DispatchError::NotFound)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NotFound => f.write_str("resource not found"),
            DispatchError::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Failed(e) => Some(e),
            DispatchError::NotFound => None,
        }
    }
}

impl From<HandlerError> for DispatchError {
    fn from(e: HandlerError) -> Self {
        DispatchError::Failed(e)
    }
}

impl From<Error> for DispatchError {
    #[track_caller]
    fn from(e: Error) -> Self {
        DispatchError::Failed(HandlerError::from(e))
    }
}
