//! Application builder.
//!
//! Everything is registered on an [`Application`]: routes, controller
//! classes, context values, view listeners, error handlers and middleware.
//! [`Application::build`] validates the lot and freezes it into a
//! [`Kernel`]. Configuration mistakes (bad patterns, unknown controllers,
//! arguments with no source) surface there, never while serving.

use std::any::Any;

use http::{Method, StatusCode};
use tracing::{debug, info};

use crate::config::Config;
use crate::context::Context;
use crate::controller::{ClassBuilder, ControllerResolver, Controllers, IntoController};
use crate::error::{Error, Failure};
use crate::exception::{ErrorHandler, ExceptionHandler};
use crate::kernel::Kernel;
use crate::middleware::Middleware;
use crate::reply::{Reply, Value};
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use crate::router::RouteCollection;
use crate::view::Views;

/// Collects the configuration of an application.
///
/// ```rust
/// use trellis::{Application, Arguments, Method, Request, Response, StatusCode};
///
/// let mut app = Application::new();
/// app.get("/hello/{name}", |args: &Arguments| format!("Hello {}", args.get("name").unwrap_or("?")))
///     .arg("name");
/// app.error(|_failure, _req, status| {
///     (status == StatusCode::NOT_FOUND).then(|| Response::html("nothing here"))
/// });
///
/// let kernel = app.build().unwrap();
/// let res = kernel.handle(Request::create(Method::GET, "/hello/world").unwrap());
/// assert_eq!(res.content(), "Hello world");
/// ```
#[derive(Default)]
pub struct Application {
    config: Config,
    routes: RouteCollection,
    controllers: Controllers,
    context: Context,
    views: Views,
    middleware: Middleware,
    error_handlers: Vec<ErrorHandler>,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    // ── Routes ────────────────────────────────────────────────────────────────

    /// Maps `path` for any method.
    pub fn route(&mut self, path: &str, controller: impl IntoController) -> &mut Route {
        self.routes.add(Route::new(path, controller.into_controller()))
    }

    pub fn get(&mut self, path: &str, controller: impl IntoController) -> &mut Route {
        self.routes.add_for(Method::GET, path, controller)
    }

    pub fn post(&mut self, path: &str, controller: impl IntoController) -> &mut Route {
        self.routes.add_for(Method::POST, path, controller)
    }

    pub fn put(&mut self, path: &str, controller: impl IntoController) -> &mut Route {
        self.routes.add_for(Method::PUT, path, controller)
    }

    pub fn patch(&mut self, path: &str, controller: impl IntoController) -> &mut Route {
        self.routes.add_for(Method::PATCH, path, controller)
    }

    pub fn delete(&mut self, path: &str, controller: impl IntoController) -> &mut Route {
        self.routes.add_for(Method::DELETE, path, controller)
    }

    /// Direct access to the route collection, e.g. to add prebuilt routes.
    pub fn routes_mut(&mut self) -> &mut RouteCollection {
        &mut self.routes
    }

    // ── Controllers and context ───────────────────────────────────────────────

    /// Registers methods of a controller class addressable as `"name::method"`.
    pub fn class<T: Default + 'static>(&mut self, name: &str) -> ClassBuilder<'_, T> {
        self.controllers.class::<T>(name)
    }

    /// Makes `value` available to controllers declaring an argument `name`.
    pub fn provide<T: Any + Send + Sync>(&mut self, name: &str, value: T) -> &mut Self {
        self.context.insert(name, value);
        self
    }

    // ── Listeners ─────────────────────────────────────────────────────────────

    /// A view listener for controller values of type `T`.
    pub fn view<T, F, R>(&mut self, listener: F) -> &mut Self
    where
        T: Any,
        F: Fn(&T, &Request) -> R + Send + Sync + 'static,
        R: Into<Option<Reply>> + 'static,
    {
        self.views.push_typed(listener);
        self
    }

    /// A view listener for controller values of any type.
    pub fn view_any<F, R>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(&Value, &Request) -> R + Send + Sync + 'static,
        R: Into<Option<Reply>> + 'static,
    {
        self.views.push_any(listener);
        self
    }

    /// An error handler. Handlers run in registration order; the first one
    /// returning a response decides what the client gets.
    pub fn error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Failure, &Request, StatusCode) -> Option<Response> + Send + Sync + 'static,
    {
        self.error_handlers.push(Box::new(handler));
        self
    }

    /// Runs after routing, before the controller. Returning a response skips
    /// the controller.
    pub fn before<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
    {
        self.middleware.push_before(Box::new(hook));
        self
    }

    /// Runs on every response before it is sent.
    pub fn after<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        self.middleware.push_after(Box::new(hook));
        self
    }

    // ── Build ─────────────────────────────────────────────────────────────────

    /// Validates the configuration and freezes it into a [`Kernel`].
    pub fn build(self) -> Result<Kernel, Error> {
        let resolver = ControllerResolver::new(self.controllers);
        let router = self.routes.compile(|_, controller| resolver.resolve(controller))?;

        for route in router.routes() {
            resolver.check_arguments(&route.name, &route.route.signature, &route.placeholders(), &self.context)?;
            debug!(name = %route.name, route = ?route.route, "route compiled");
        }
        info!(routes = router.routes().len(), debug = self.config.debug, "application built");

        Ok(Kernel {
            exception_handler: ExceptionHandler::new(self.config.debug),
            config: self.config,
            router,
            resolver,
            context: self.context,
            views: self.views,
            middleware: self.middleware,
            error_handlers: self.error_handlers,
        })
    }
}
