//! The request dispatcher.
//!
//! [`Kernel::handle`] takes one request through a fixed sequence of states
//! and always produces exactly one response:
//!
//! ```text
//! received ─▶ matched ─▶ before hooks ─▶ controller ─▶ views ─▶ normalized ─▶ after hooks ─▶ sent
//!     │          │             │              │           │          │
//!     └──────────┴─────────────┴──────────────┴───────────┴──────────┴─▶ failed ─▶ error handlers
//! ```
//!
//! Nothing a controller or listener does can escape as an error or a panic:
//! both are caught, logged and turned into an error response.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, debug_span, error, warn};

use crate::config::Config;
use crate::context::Context;
use crate::controller::ControllerResolver;
use crate::error::{Error, Failure, HttpError};
use crate::exception::{self, ErrorHandler, ExceptionHandler};
use crate::middleware::Middleware;
use crate::reply::{Reply, Value};
use crate::request::{Params, Request, Scheme};
use crate::response::Response;
use crate::router::{Match, Router};
use crate::view::Views;

/// A built application, ready to handle requests.
///
/// Immutable once built: share it behind an `Arc` and call
/// [`handle`](Kernel::handle) from as many threads as needed.
pub struct Kernel {
    pub(crate) config: Config,
    pub(crate) router: Router,
    pub(crate) resolver: ControllerResolver,
    pub(crate) context: Context,
    pub(crate) views: Views,
    pub(crate) middleware: Middleware,
    pub(crate) error_handlers: Vec<ErrorHandler>,
    pub(crate) exception_handler: ExceptionHandler,
}

impl Kernel {
    /// Dispatches one request.
    pub fn handle(&self, request: Request) -> Response {
        let span = debug_span!("dispatch", method = %request.method(), path = %request.path());
        let _guard = span.enter();
        debug!("> {} {}", request.method(), request.request_uri());

        let mut request = Arc::new(request);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&mut request)))
            .unwrap_or_else(|payload| Err(Failure::from_panic(payload)));

        let mut response = match outcome {
            Ok(response) => response,
            Err(failure) => self.handle_failure(&failure, &request),
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.middleware.run_after(&request, &mut response))) {
            let failure = Failure::from_panic(payload);
            response = self.handle_failure(&failure, &request);
        }

        debug!("< {}", response.status_code());
        response
    }

    fn dispatch(&self, request: &mut Arc<Request>) -> Result<Response, Failure> {
        let (route, params) = match self.router.matches(request, &self.config) {
            Match::Found { route, params } => (route, params),
            Match::Redirect { location } => {
                debug!(%location, "redirecting");
                return Ok(Response::redirect(&location, StatusCode::MOVED_PERMANENTLY));
            }
            Match::MethodNotAllowed { allowed } => {
                let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
                let message = format!(
                    "No route found for \"{} {}\": Method Not Allowed (Allow: {allow})",
                    request.method(),
                    request.path(),
                );
                return Err(HttpError::method_not_allowed(message, &allowed).into());
            }
            Match::NotFound => {
                let message = format!("No route found for \"{} {}\"", request.method(), request.path());
                return Err(HttpError::not_found(message).into());
            }
        };

        debug!(route = %route.name, "matched");
        Arc::make_mut(request).set_params(params);

        if let Some(response) = self.middleware.run_before(request) {
            return Ok(response);
        }

        let reply = self
            .resolver
            .bind(&route.handler, &route.route.signature, Arc::clone(request), &self.context)?
            .invoke()?;

        match reply {
            Reply::Response(response) => Ok(response),
            Reply::Value(value) => match self.views.process(value, request) {
                Reply::Response(response) => Ok(response),
                Reply::Value(value) => normalize(value),
            },
        }
    }

    fn handle_failure(&self, failure: &Failure, request: &Request) -> Response {
        if failure.status().is_server_error() {
            error!(kind = failure.kind(), "{failure}");
        } else {
            warn!(kind = failure.kind(), "{failure}");
        }
        exception::respond(&self.error_handlers, &self.exception_handler, failure, request)
    }

    /// Path for the route named `name`, e.g. `/blog/2`.
    pub fn path(&self, name: &str, params: &Params) -> Result<String, Error> {
        let route = self.router.get(name).ok_or_else(|| Error::UnknownRoute(name.to_owned()))?;
        route.path.generate(&route.route, params, name)
    }

    /// Absolute URL for the route named `name`.
    ///
    /// Scheme and host come from the route when it constrains them, otherwise
    /// from `request`. Default ports are omitted.
    pub fn url(&self, name: &str, params: &Params, request: &Request) -> Result<String, Error> {
        let route = self.router.get(name).ok_or_else(|| Error::UnknownRoute(name.to_owned()))?;
        let path = route.path.generate(&route.route, params, name)?;

        let scheme = route.route.scheme.unwrap_or(request.scheme());
        let host = match &route.host {
            Some(host) => host.generate(&route.route, params, name)?,
            None => request.host().to_owned(),
        };
        let (port, default) = match scheme {
            Scheme::Http => (self.config.http_port, 80),
            Scheme::Https => (self.config.https_port, 443),
        };
        let port = if scheme == request.scheme() { request.port().unwrap_or(default) } else { port };
        let port = if port == default { String::new() } else { format!(":{port}") };

        Ok(format!("{scheme}://{host}{port}{path}"))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

/// Turns a value no view listener converted into a response.
fn normalize(value: Value) -> Result<Response, Failure> {
    value
        .downcast::<String>()
        .map(Response::html)
        .map_err(|value| Failure::InvalidReply(value.type_name()))
}
