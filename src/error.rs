//! Error types.
//!
//! Three layers, three types:
//!
//! - [`Error`] surfaces configuration and infrastructure failures: a route
//!   pattern that does not compile, a controller that cannot be resolved,
//!   binding to a port. These happen before (or outside) request handling.
//! - [`HttpError`] is what a controller returns when it wants a specific HTTP
//!   status: `Err(HttpError::new(StatusCode::FORBIDDEN, "nope"))`.
//! - [`Failure`] is everything the exception listener can receive during a
//!   dispatch. It always maps to a status code and is always rendered.

use std::any::Any;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use thiserror::Error;

/// Configuration and infrastructure errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid requirement for `{placeholder}` in route `{pattern}`: {source}")]
    InvalidRequirement {
        pattern: String,
        placeholder: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid method requirement `{0}`")]
    InvalidMethod(String),

    #[error("malformed controller `{0}`, expected `Class::method`")]
    MalformedController(String),

    #[error("unable to find controller `{0}`")]
    UnknownController(String),

    #[error("controller for route `{route}` requires a value for the `{argument}` argument")]
    UnboundArgument { route: String, argument: String },

    #[error("route `{0}` does not exist")]
    UnknownRoute(String),

    #[error("missing parameter `{parameter}` to generate a URL for route `{route}`")]
    MissingParameter { route: String, parameter: String },

    #[error("invalid request uri `{0}`")]
    InvalidUri(String),
}

/// An error carrying an HTTP status code.
///
/// Controllers return it to abort with a specific status; the router uses it
/// for 404 and 405 outcomes.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    headers: HeaderMap,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), headers: HeaderMap::new() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// A 405 with the `Allow` header set from `allowed`.
    pub fn method_not_allowed(message: impl Into<String>, allowed: &[Method]) -> Self {
        let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        let mut error = Self::new(StatusCode::METHOD_NOT_ALLOWED, message);
        if let Ok(value) = HeaderValue::from_str(&allow) {
            error.headers.insert(http::header::ALLOW, value);
        }
        error
    }

    /// Adds a header to the error response. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
}

/// A failed dispatch, as seen by error handlers and the exception listener.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("controller panicked: {0}")]
    Panic(String),

    #[error("the controller must return a response (`{0}` given)")]
    InvalidReply(&'static str),
}

impl Failure {
    /// Wraps any error as an internal (500) failure.
    pub fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(Box::new(error))
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_owned()
        };
        Self::Panic(message)
    }

    /// HTTP errors keep their status; everything else is a 500.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http(e) => e.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(e) => Some(e),
            _ => None,
        }
    }

    /// Short kind label used in logs and debug pages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "HttpError",
            Self::Internal(_) => "InternalError",
            Self::Panic(_) => "Panic",
            Self::InvalidReply(_) => "InvalidReply",
        }
    }
}
