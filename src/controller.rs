//! Controller descriptors and their resolution.
//!
//! A route points at a [`Controller`]: either a native function/closure, or a
//! `"Class::method"` name looked up in the [`Controllers`] registry. Every
//! descriptor is resolved exactly once, when the application is built, into
//! the same [`BoxedHandler`] shape. An unknown class or method is a
//! configuration error and the application refuses to build.
//!
//! Arguments are bound explicitly. A route declares the names its controller
//! needs ([`Route::arg`](crate::Route::arg)); the resolver checks at build
//! time that each one can be satisfied and, per request, fills an
//! [`Arguments`] value from the sources in this order:
//!
//! 1. placeholder values of the matched route (route defaults included)
//! 2. the request itself (`request`)
//! 3. values registered in the [`Context`]
//! 4. the default given with [`Route::arg_or`](crate::Route::arg_or)

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::{Context, Shared};
use crate::error::{Error, Failure};
use crate::handler::{BoxedHandler, Handler};
use crate::reply::{IntoReply, Reply};
use crate::request::Request;

/// Name under which the current request can be declared as an argument.
pub const REQUEST_ARGUMENT: &str = "request";

// ── Controller ────────────────────────────────────────────────────────────────

/// What a route invokes.
#[derive(Clone)]
pub enum Controller {
    Native(BoxedHandler),
    Method { class: String, method: String },
}

impl Controller {
    pub fn new(handler: impl Handler) -> Self {
        Self::Native(handler.into_boxed_handler())
    }

    /// A `"Class::method"` descriptor. Nothing is checked until build time.
    ///
    /// The split happens on the last `::`, so module-qualified class names
    /// such as `"admin::Users::list"` work.
    pub fn named(descriptor: &str) -> Self {
        match descriptor.rsplit_once("::") {
            Some((class, method)) => Self::Method { class: class.to_owned(), method: method.to_owned() },
            None => Self::Method { class: descriptor.to_owned(), method: String::new() },
        }
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(_) => f.write_str("Native(..)"),
            Self::Method { class, method } => write!(f, "Method({class}::{method})"),
        }
    }
}

/// Anything a route can be pointed at: a native controller or a [`Controller`].
pub trait IntoController {
    fn into_controller(self) -> Controller;
}

impl IntoController for Controller {
    fn into_controller(self) -> Controller {
        self
    }
}

impl<H: Handler> IntoController for H {
    fn into_controller(self) -> Controller {
        Controller::new(self)
    }
}

// ── Controllers registry ──────────────────────────────────────────────────────

/// Registry of controller classes addressable as `"Class::method"`.
///
/// ```rust
/// use trellis::{Arguments, Controllers};
///
/// #[derive(Default)]
/// struct Blog;
///
/// impl Blog {
///     fn index(&self) -> String { "posts".into() }
///     fn version() -> &'static str { "1.0" }
/// }
///
/// let mut controllers = Controllers::new();
/// controllers
///     .class::<Blog>("Blog")
///     .method("index", |blog: &Blog, _: &Arguments| blog.index())
///     .static_method("version", |_: &Arguments| Blog::version());
/// ```
#[derive(Default)]
pub struct Controllers {
    classes: HashMap<String, HashMap<String, BoxedHandler>>,
}

impl Controllers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or continues) registering methods of `T` under `name`.
    pub fn class<T: Default + 'static>(&mut self, name: &str) -> ClassBuilder<'_, T> {
        let methods = self.classes.entry(name.to_owned()).or_default();
        ClassBuilder { methods, _class: PhantomData }
    }

    fn lookup(&self, class: &str, method: &str) -> Option<&BoxedHandler> {
        self.classes.get(class)?.get(method)
    }
}

/// Registers the methods of one controller class.
pub struct ClassBuilder<'a, T> {
    methods: &'a mut HashMap<String, BoxedHandler>,
    _class: PhantomData<fn() -> T>,
}

impl<T: Default + 'static> ClassBuilder<'_, T> {
    /// An instance method. Each invocation builds a fresh `T::default()`.
    pub fn method<F, R>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T, &Arguments) -> R + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        let handler = move |args: &Arguments| {
            let instance = T::default();
            f(&instance, args)
        };
        self.methods.insert(name.to_owned(), handler.into_boxed_handler());
        self
    }

    /// A static method. No instance is ever built.
    pub fn static_method<F, R>(self, name: &str, f: F) -> Self
    where
        F: Fn(&Arguments) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        self.methods.insert(name.to_owned(), f.into_boxed_handler());
        self
    }
}

// ── Signature ─────────────────────────────────────────────────────────────────

/// One declared controller argument.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Parameter {
    pub(crate) name: String,
    pub(crate) default: Option<String>,
}

/// The arguments a route's controller declares, in declaration order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Signature {
    parameters: Vec<Parameter>,
}

impl Signature {
    pub(crate) fn push(&mut self, name: impl Into<String>, default: Option<String>) {
        self.parameters.push(Parameter { name: name.into(), default });
    }

    pub(crate) fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
}

// ── Arguments ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Bound {
    Text(String),
    Shared(Shared),
    Request,
}

/// The values bound for one controller invocation.
pub struct Arguments {
    request: Arc<Request>,
    bound: Vec<(String, Bound)>,
}

impl Arguments {
    /// The current request. Always available, declared or not.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// A bound string argument (placeholder value or declared default).
    pub fn get(&self, name: &str) -> Option<&str> {
        match self.find(name)? {
            Bound::Text(value) => Some(value),
            _ => None,
        }
    }

    /// A bound context value.
    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        match self.find(name)? {
            Bound::Shared(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn find(&self, name: &str) -> Option<&Bound> {
        self.bound.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.bound.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>();
        f.debug_struct("Arguments").field("bound", &names).finish()
    }
}

// ── Resolver ──────────────────────────────────────────────────────────────────

/// A controller with its arguments bound, ready to run.
pub(crate) struct Invocation {
    handler: BoxedHandler,
    arguments: Arguments,
}

impl Invocation {
    pub(crate) fn invoke(self) -> Result<Reply, Failure> {
        self.handler.call(&self.arguments)
    }
}

/// Turns descriptors into handlers and declared arguments into values.
pub(crate) struct ControllerResolver {
    controllers: Controllers,
}

impl ControllerResolver {
    pub(crate) fn new(controllers: Controllers) -> Self {
        Self { controllers }
    }

    /// Resolves a descriptor into a handler. Called once per route at build time.
    pub(crate) fn resolve(&self, controller: Controller) -> Result<BoxedHandler, Error> {
        match controller {
            Controller::Native(handler) => Ok(handler),
            Controller::Method { class, method } => {
                let descriptor = format!("{class}::{method}");
                if class.is_empty() || method.is_empty() {
                    return Err(Error::MalformedController(descriptor));
                }
                self.controllers
                    .lookup(&class, &method)
                    .cloned()
                    .ok_or(Error::UnknownController(descriptor))
            }
        }
    }

    /// Checks that every declared argument of `route` has a source.
    ///
    /// `placeholders` are the names the route's path and host patterns
    /// capture plus the keys of its defaults.
    pub(crate) fn check_arguments(
        &self,
        route: &str,
        signature: &Signature,
        placeholders: &[String],
        context: &Context,
    ) -> Result<(), Error> {
        for parameter in signature.parameters() {
            let name = parameter.name.as_str();
            let bindable = placeholders.iter().any(|p| p == name)
                || name == REQUEST_ARGUMENT
                || context.contains(name)
                || parameter.default.is_some();
            if !bindable {
                return Err(Error::UnboundArgument { route: route.to_owned(), argument: name.to_owned() });
            }
        }
        Ok(())
    }

    /// Binds the declared arguments for one request.
    pub(crate) fn bind(
        &self,
        handler: &BoxedHandler,
        signature: &Signature,
        request: Arc<Request>,
        context: &Context,
    ) -> Result<Invocation, Failure> {
        let mut bound = Vec::with_capacity(signature.parameters().len());
        for parameter in signature.parameters() {
            let name = parameter.name.as_str();
            let value = if let Some(value) = request.param(name) {
                Bound::Text(value.to_owned())
            } else if name == REQUEST_ARGUMENT {
                Bound::Request
            } else if let Some(value) = context.shared(name) {
                Bound::Shared(value)
            } else if let Some(default) = &parameter.default {
                Bound::Text(default.clone())
            } else {
                return Err(Failure::Internal(
                    format!("controller requires a value for the `{name}` argument").into(),
                ));
            };
            bound.push((parameter.name.clone(), value));
        }
        Ok(Invocation { handler: Arc::clone(handler), arguments: Arguments { request, bound } })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::Method;

    use super::*;

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Default for Counted {
        fn default() -> Self {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Counted
        }
    }

    fn resolver() -> ControllerResolver {
        let mut controllers = Controllers::new();
        controllers
            .class::<Counted>("Counted")
            .method("instance", |_: &Counted, _: &Arguments| "instance")
            .static_method("shared", |_: &Arguments| "static");
        ControllerResolver::new(controllers)
    }

    fn request() -> Arc<Request> {
        Arc::new(Request::create(Method::GET, "/").unwrap())
    }

    fn run(resolver: &ControllerResolver, descriptor: &str) -> String {
        let handler = resolver.resolve(Controller::named(descriptor)).unwrap();
        let invocation = resolver.bind(&handler, &Signature::default(), request(), &Context::new()).unwrap();
        match invocation.invoke().unwrap() {
            Reply::Value(v) => v.downcast::<String>().ok().unwrap(),
            Reply::Response(_) => panic!("expected a value"),
        }
    }

    #[test]
    fn instance_and_static_methods_resolve() {
        let resolver = resolver();

        let before = BUILT.load(Ordering::SeqCst);
        assert_eq!(run(&resolver, "Counted::shared"), "static");
        assert_eq!(BUILT.load(Ordering::SeqCst), before);

        assert_eq!(run(&resolver, "Counted::instance"), "instance");
        assert_eq!(BUILT.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn unknown_and_malformed_descriptors_fail() {
        let resolver = resolver();
        assert!(matches!(resolver.resolve(Controller::named("Nope::x")), Err(Error::UnknownController(_))));
        assert!(matches!(resolver.resolve(Controller::named("Counted::nope")), Err(Error::UnknownController(_))));
        assert!(matches!(resolver.resolve(Controller::named("Counted")), Err(Error::MalformedController(_))));
        assert!(matches!(resolver.resolve(Controller::named("::x")), Err(Error::MalformedController(_))));
    }

    #[test]
    fn check_arguments_requires_a_source() {
        let resolver = resolver();
        let mut context = Context::new();
        context.insert("db", 1u8);

        let mut signature = Signature::default();
        signature.push("id", None);
        signature.push("request", None);
        signature.push("db", None);
        signature.push("page", Some("1".into()));
        assert!(resolver.check_arguments("r", &signature, &["id".into()], &context).is_ok());

        signature.push("missing", None);
        let err = resolver.check_arguments("r", &signature, &["id".into()], &context).unwrap_err();
        assert!(matches!(err, Error::UnboundArgument { ref argument, .. } if argument == "missing"));
    }

    #[test]
    fn bind_prefers_placeholders_then_context_then_defaults() {
        let resolver = resolver();
        let mut context = Context::new();
        context.insert("name", String::from("from-context"));
        context.insert("limit", 5usize);

        let mut req = Request::create(Method::GET, "/").unwrap();
        let mut params = crate::request::Params::new();
        params.insert("name", "from-path");
        req.set_params(params);

        let mut signature = Signature::default();
        signature.push("name", None);
        signature.push("limit", None);
        signature.push("page", Some("1".into()));

        let handler: BoxedHandler = (|args: &Arguments| {
            format!(
                "{}:{}:{}",
                args.get("name").unwrap_or("-"),
                args.service::<usize>("limit").copied().unwrap_or(0),
                args.get("page").unwrap_or("-"),
            )
        })
        .into_boxed_handler();

        let invocation = resolver.bind(&handler, &signature, Arc::new(req), &context).unwrap();
        match invocation.invoke().unwrap() {
            Reply::Value(v) => assert_eq!(v.downcast::<String>().ok().as_deref(), Some("from-path:5:1")),
            Reply::Response(_) => panic!("expected a value"),
        }
    }
}
