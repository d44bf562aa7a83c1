//! Exception listener: turns a [`Failure`] into a response.
//!
//! Registered error handlers get the first chance, in registration order;
//! the first one returning a response wins. If none does, the default
//! [`ExceptionHandler`] renders an HTML page: detailed in debug mode, generic
//! otherwise. This path never fails: a panicking error handler is logged and
//! skipped.

use std::error::Error as _;
use std::panic::{self, AssertUnwindSafe};

use html_escape::encode_text;
use http::StatusCode;
use tracing::error;

use crate::error::Failure;
use crate::request::Request;
use crate::response::Response;

pub(crate) type ErrorHandler = Box<dyn Fn(&Failure, &Request, StatusCode) -> Option<Response> + Send + Sync>;

/// Default renderer for failures nobody else handled.
#[derive(Clone, Copy, Debug)]
pub struct ExceptionHandler {
    debug: bool,
}

impl ExceptionHandler {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Renders `failure` with its status. HTTP errors keep their headers
    /// (e.g. `Allow` on a 405).
    pub fn render(&self, failure: &Failure) -> Response {
        let status = failure.status();
        let reason = status.canonical_reason().unwrap_or("Error");
        let body = if self.debug { debug_page(failure, status, reason) } else { generic_page(status, reason) };

        let mut builder = Response::builder().status(status);
        if let Some(http) = failure.as_http() {
            builder = builder.headers(http.headers());
        }
        builder.html(body)
    }
}

fn generic_page(status: StatusCode, reason: &str) -> String {
    let code = status.as_u16();
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>An Error Occurred: {reason}</title></head>\n\
         <body>\n<h1>Oops! An Error Occurred</h1>\n<h2>The server returned a \"{code} {reason}\".</h2>\n\
         <p>Something is broken. Please let us know what you were doing when this error occurred.</p>\n\
         </body>\n</html>\n"
    )
}

fn debug_page(failure: &Failure, status: StatusCode, reason: &str) -> String {
    let code = status.as_u16();
    let message = encode_text(&failure.to_string()).into_owned();

    let mut causes = String::new();
    let mut source = failure.source();
    while let Some(cause) = source {
        causes.push_str(&format!("<li>{}</li>\n", encode_text(&cause.to_string())));
        source = cause.source();
    }
    let causes = if causes.is_empty() { String::new() } else { format!("<h3>Caused by</h3>\n<ol>\n{causes}</ol>\n") };

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{message} ({code} {reason})</title></head>\n\
         <body>\n<h1>{kind}: {message}</h1>\n<p>{code} {reason}</p>\n{causes}</body>\n</html>\n",
        kind = failure.kind(),
    )
}

/// Runs the error handlers, then the default renderer.
pub(crate) fn respond(
    handlers: &[ErrorHandler],
    fallback: &ExceptionHandler,
    failure: &Failure,
    request: &Request,
) -> Response {
    let status = failure.status();
    for handler in handlers {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(failure, request, status))) {
            Ok(Some(response)) => return response,
            Ok(None) => {}
            Err(payload) => {
                let panic = Failure::from_panic(payload);
                error!(cause = %panic, "error handler panicked, skipping it");
            }
        }
    }
    fallback.render(failure)
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::error::HttpError;

    #[derive(Debug, thiserror::Error)]
    #[error("query failed")]
    struct QueryError(#[source] std::io::Error);

    fn request() -> Request {
        Request::create(Method::GET, "/").unwrap()
    }

    #[test]
    fn generic_page_hides_details() {
        let failure = Failure::internal(QueryError(std::io::Error::other("secret dsn")));
        let response = ExceptionHandler::new(false).render(&failure);
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.content().contains("Oops! An Error Occurred"));
        assert!(!response.content().contains("secret dsn"));
    }

    #[test]
    fn debug_page_shows_message_and_causes_escaped() {
        let failure = Failure::internal(QueryError(std::io::Error::other("<dsn>")));
        let response = ExceptionHandler::new(true).render(&failure);
        let content = response.content();
        assert!(content.contains("query failed"));
        assert!(content.contains("&lt;dsn&gt;"));
    }

    #[test]
    fn http_errors_keep_status_and_headers() {
        let failure = Failure::from(HttpError::method_not_allowed("nope", &[Method::GET]));
        let response = ExceptionHandler::new(false).render(&failure);
        assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header("allow"), Some("GET"));
    }

    #[test]
    fn first_handler_with_a_response_wins_and_panics_are_skipped() {
        let handlers: Vec<ErrorHandler> = vec![
            Box::new(|_, _, _| panic!("broken handler")),
            Box::new(|_, _, _| None),
            Box::new(|_, _, status| Some(Response::text(format!("handled {}", status.as_u16())))),
            Box::new(|_, _, _| Some(Response::text("too late"))),
        ];
        let failure = Failure::from(HttpError::new(StatusCode::FORBIDDEN, "no"));
        let response = respond(&handlers, &ExceptionHandler::new(false), &failure, &request());
        assert_eq!(response.content(), "handled 403");
    }
}
