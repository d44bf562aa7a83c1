//! Application-level middleware.
//!
//! Two hooks around every dispatch:
//!
//! - **before**: runs once a route has matched, in registration order, and
//!   may short-circuit by returning a response. The controller then never
//!   runs.
//! - **after**: runs on every outgoing response, including error pages and
//!   redirects, and may modify it in place.
//!
//! ```rust
//! use trellis::{Application, Arguments, Response};
//!
//! let mut app = Application::new();
//! app.get("/", |_: &Arguments| "home");
//! app.before(|req| {
//!     if req.header("authorization").is_none() && req.path().starts_with("/admin") {
//!         return Some(Response::redirect("/login", trellis::StatusCode::FOUND));
//!     }
//!     None
//! });
//! app.after(|_req, res| {
//!     res.headers_mut().insert("x-frame-options", "DENY".parse().unwrap());
//! });
//! ```

use tracing::trace;

use crate::request::Request;
use crate::response::Response;

pub(crate) type Before = Box<dyn Fn(&Request) -> Option<Response> + Send + Sync>;
pub(crate) type After = Box<dyn Fn(&Request, &mut Response) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Middleware {
    before: Vec<Before>,
    after: Vec<After>,
}

impl Middleware {
    pub(crate) fn push_before(&mut self, hook: Before) {
        self.before.push(hook);
    }

    pub(crate) fn push_after(&mut self, hook: After) {
        self.after.push(hook);
    }

    /// First response returned by a before hook, if any.
    pub(crate) fn run_before(&self, request: &Request) -> Option<Response> {
        for (i, hook) in self.before.iter().enumerate() {
            if let Some(response) = hook(request) {
                trace!(hook = i, "before middleware short-circuited");
                return Some(response);
            }
        }
        None
    }

    pub(crate) fn run_after(&self, request: &Request, response: &mut Response) {
        for hook in &self.after {
            hook(request, response);
        }
    }
}
