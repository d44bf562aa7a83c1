//! Controller return values.
//!
//! A controller does not have to return a [`Response`]. It returns something
//! that converts into a [`Reply`]: either a finished response, or a plain value
//! that view listeners may turn into one. Strings are values too; if nothing
//! else claims them the kernel wraps them in a `200 OK` HTML response.

use std::any::{Any, type_name};
use std::fmt;

use http::StatusCode;

use crate::error::{Failure, HttpError};
use crate::response::Response;

/// The raw result of invoking a controller.
pub enum Reply {
    Response(Response),
    Value(Value),
}

impl Reply {
    /// Wraps an arbitrary value for the view listeners.
    pub fn value<T: Any + Send>(value: T) -> Self {
        Self::Value(Value::new(value))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(r) => f.debug_tuple("Response").field(&r.status_code()).finish(),
            Self::Value(v) => f.debug_tuple("Value").field(&v.type_name()).finish(),
        }
    }
}

/// A type-erased controller value that remembers its type name.
pub struct Value {
    inner: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl Value {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self { inner: Box::new(value), type_name: type_name::<T>() }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Takes the value out if it is a `T`, hands it back otherwise.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        match self.inner.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(inner) => Err(Self { inner, type_name }),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion of a controller's return type into a [`Reply`].
///
/// Implement it on your own types to return them straight from controllers:
///
/// ```rust
/// use trellis::{IntoReply, Reply, Failure};
///
/// struct User { name: String }
///
/// impl IntoReply for User {
///     fn into_reply(self) -> Result<Reply, Failure> {
///         Ok(Reply::value(self))
///     }
/// }
/// ```
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, Failure>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, Failure> { Ok(self) }
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Reply, Failure> { Ok(Reply::Response(self)) }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, Failure> { Ok(Reply::value(self)) }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, Failure> { Ok(Reply::value(self.to_owned())) }
}

/// Return a bare status: `return StatusCode::NO_CONTENT`.
impl IntoReply for StatusCode {
    fn into_reply(self) -> Result<Reply, Failure> { Ok(Reply::Response(Response::status(self))) }
}

impl IntoReply for HttpError {
    fn into_reply(self) -> Result<Reply, Failure> { Err(self.into()) }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<Failure>,
{
    fn into_reply(self) -> Result<Reply, Failure> {
        self.map_err(Into::into)?.into_reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_values() {
        let reply = "foo".into_reply().unwrap();
        match reply {
            Reply::Value(v) => assert_eq!(v.downcast_ref::<String>().map(String::as_str), Some("foo")),
            Reply::Response(_) => panic!("expected a value"),
        }
    }

    #[test]
    fn errors_become_failures() {
        let result: Result<String, HttpError> = Err(HttpError::new(StatusCode::FORBIDDEN, "no"));
        let failure = result.into_reply().unwrap_err();
        assert_eq!(failure.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn downcast_hands_back_mismatches() {
        let value = Value::new(42u32);
        let value = value.downcast::<String>().unwrap_err();
        assert_eq!(value.type_name(), "u32");
        assert_eq!(value.downcast::<u32>().ok(), Some(42));
    }
}
