//! Ordered route collection and request matching.
//!
//! Routes are tried in registration order and the first one whose every
//! constraint holds wins. There is no tree and no specificity ranking: if two
//! patterns can both match, the one registered first takes the request. For
//! each route the checks run in this order:
//!
//! 1. path pattern (placeholders and their requirements)
//! 2. method set (a miss adds the route's methods to the `Allow` set)
//! 3. host pattern
//! 4. condition
//! 5. scheme (a miss remembers a redirect candidate and keeps searching)
//!
//! When nothing matches, the matcher falls back to redirects before giving up:
//! a scheme redirect if some route only failed on the scheme, then a
//! trailing-slash redirect for `GET`/`HEAD` if `path + "/"` would match.

use std::collections::HashSet;

use http::Method;

use crate::config::Config;
use crate::controller::{Controller, IntoController};
use crate::error::Error;
use crate::method::MethodSet;
use crate::request::{Params, Request, Scheme};
use crate::route::{CompiledRoute, Route};

// ── RouteCollection ───────────────────────────────────────────────────────────

/// Routes in registration order. Mutated only while the application is being
/// configured.
#[derive(Default)]
pub struct RouteCollection {
    routes: Vec<Route>,
}

impl RouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route and returns it for further configuration.
    pub fn add(&mut self, route: Route) -> &mut Route {
        self.routes.push(route);
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    /// Shortcut for a route restricted to a single method.
    pub fn add_for(&mut self, method: Method, path: &str, controller: impl IntoController) -> &mut Route {
        let mut route = Route::new(path, controller.into_controller());
        route.methods = MethodSet::one(method);
        self.add(route)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }

    /// Compiles every route, resolving controllers through `resolve`.
    pub(crate) fn compile<F>(self, mut resolve: F) -> Result<Router, Error>
    where
        F: FnMut(&Route, Controller) -> Result<crate::handler::BoxedHandler, Error>,
    {
        let mut taken: HashSet<String> = self.routes.iter().filter_map(|r| r.name.clone()).collect();
        let mut routes = Vec::with_capacity(self.routes.len());

        for route in self.routes {
            let name = match &route.name {
                Some(name) => name.clone(),
                None => unique_name(generated_name(&route), &mut taken),
            };
            let handler = resolve(&route, route.controller.clone())?;
            routes.push(CompiledRoute::compile(name, route, handler)?);
        }
        Ok(Router { routes })
    }
}

/// `GET /users/{id}` becomes `GET_users_id`.
fn generated_name(route: &Route) -> String {
    let methods = route.method_pattern.clone().unwrap_or_else(|| {
        if route.methods.is_any() { String::new() } else { route.methods.to_string() }
    });
    let raw = format!("{methods}_{}", route.path);

    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = match c {
            '/' | ':' | '|' | '-' => '_',
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => c,
            _ => continue,
        };
        if !(c == '_' && name.ends_with('_')) {
            name.push(c);
        }
    }
    if name == "_" { "_root_".to_owned() } else { name }
}

fn unique_name(base: String, taken: &mut HashSet<String>) -> String {
    let mut name = base.clone();
    let mut i = 1;
    while taken.contains(&name) {
        name = format!("{base}_{i}");
        i += 1;
    }
    taken.insert(name.clone());
    name
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Outcome of matching one request.
pub(crate) enum Match<'r> {
    Found { route: &'r CompiledRoute, params: Params },
    /// Trailing slash or scheme redirect, always permanent.
    Redirect { location: String },
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

enum Lookup<'r> {
    Found(&'r CompiledRoute, Params),
    WrongScheme(Scheme),
    Miss(MethodSet),
}

/// The compiled, read-only route table.
pub(crate) struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    pub(crate) fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    pub(crate) fn get(&self, name: &str) -> Option<&CompiledRoute> {
        self.routes.iter().find(|r| r.name == name)
    }

    pub(crate) fn matches(&self, request: &Request, config: &Config) -> Match<'_> {
        let allowed = match self.lookup(request, request.path()) {
            Lookup::Found(route, params) => return Match::Found { route, params },
            Lookup::WrongScheme(scheme) => {
                return Match::Redirect { location: scheme_url(request, scheme, config) };
            }
            Lookup::Miss(allowed) => allowed,
        };

        let redirectable = matches!(*request.method(), Method::GET | Method::HEAD);
        if redirectable && !request.path().ends_with('/') {
            let with_slash = format!("{}/", request.path());
            if !matches!(self.lookup(request, &with_slash), Lookup::Miss(_)) {
                let location = match request.query() {
                    Some(q) => format!("{}/?{q}", request.raw_path()),
                    None => format!("{}/", request.raw_path()),
                };
                return Match::Redirect { location };
            }
        }

        if allowed.is_any() {
            Match::NotFound
        } else {
            Match::MethodNotAllowed { allowed: allowed.into_allow_list() }
        }
    }

    fn lookup(&self, request: &Request, path: &str) -> Lookup<'_> {
        let mut allowed = MethodSet::any();
        let mut wrong_scheme = None;

        for route in &self.routes {
            let mut params = Params::new();
            if !route.path.captures(path, &mut params) {
                continue;
            }
            if !route.methods.allows(request.method()) {
                allowed.merge(&route.methods);
                continue;
            }
            if let Some(host) = &route.host {
                if !host.captures(request.host(), &mut params) {
                    continue;
                }
            }
            for (name, default) in &route.route.defaults {
                if !params.contains(name) {
                    params.insert(name.as_str(), default.as_str());
                }
            }
            if let Some(condition) = &route.route.condition {
                if !condition(request, &params) {
                    continue;
                }
            }
            if let Some(scheme) = route.route.scheme {
                if scheme != request.scheme() {
                    wrong_scheme.get_or_insert(scheme);
                    continue;
                }
            }
            return Lookup::Found(route, params);
        }

        match wrong_scheme {
            Some(scheme) => Lookup::WrongScheme(scheme),
            None => Lookup::Miss(allowed),
        }
    }
}

/// Same host, path and query under `scheme`. The port is kept only when it
/// differs from the default for that scheme.
fn scheme_url(request: &Request, scheme: Scheme, config: &Config) -> String {
    let (port, default) = match scheme {
        Scheme::Http => (config.http_port, 80),
        Scheme::Https => (config.https_port, 443),
    };
    let port = if port == default { String::new() } else { format!(":{port}") };
    format!("{scheme}://{}{port}{}", request.host(), request.request_uri())
}
