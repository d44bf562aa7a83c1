//! Routes and their compiled form.
//!
//! A [`Route`] is what the application author writes: a pattern, a
//! controller, and a handful of constraints set through `&mut self`
//! modifiers. Nothing is validated until the application is built, when each
//! route is compiled into a [`CompiledRoute`]: path and host regexes, the list
//! of placeholder names, and a resolved handler.

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::controller::{Controller, Signature};
use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::method::MethodSet;
use crate::request::{Params, Request, Scheme};

/// Default regex for a path placeholder: one segment.
const DEFAULT_PATH_REQUIREMENT: &str = "[^/]+";

/// Default regex for a host placeholder: one label.
const DEFAULT_HOST_REQUIREMENT: &str = "[^.]+";

const MAX_REGEX_SIZE: usize = 1 << 20;

/// A boolean predicate evaluated against the request and placeholder values.
pub type Condition = Arc<dyn Fn(&Request, &Params) -> bool + Send + Sync>;

// ── Route ─────────────────────────────────────────────────────────────────────

/// One configured route.
///
/// ```rust
/// use trellis::{Application, Arguments};
///
/// let mut app = Application::new();
/// app.get("/blog/{page}", |args: &Arguments| format!("page {}", args.get("page").unwrap_or("?")))
///     .assert("page", r"\d+")
///     .value("page", "1")
///     .arg("page")
///     .bind("blog");
/// ```
pub struct Route {
    pub(crate) path: String,
    pub(crate) methods: MethodSet,
    pub(crate) method_pattern: Option<String>,
    pub(crate) host: Option<String>,
    pub(crate) scheme: Option<Scheme>,
    pub(crate) condition: Option<Condition>,
    pub(crate) requirements: Vec<(String, String)>,
    pub(crate) defaults: Vec<(String, String)>,
    pub(crate) signature: Signature,
    pub(crate) name: Option<String>,
    pub(crate) controller: Controller,
}

impl Route {
    /// A route answering `path` with `controller`, for any method, host and scheme.
    ///
    /// The path is only parsed when the application is built, so a malformed
    /// pattern surfaces there as [`Error::InvalidPattern`].
    pub fn new(path: &str, controller: Controller) -> Self {
        Self {
            path: path.to_owned(),
            methods: MethodSet::any(),
            method_pattern: None,
            host: None,
            scheme: None,
            condition: None,
            requirements: Vec::new(),
            defaults: Vec::new(),
            signature: Signature::default(),
            name: None,
            controller,
        }
    }

    /// Restricts the route to `pattern`, e.g. `"GET|POST"`.
    pub fn method(&mut self, pattern: &str) -> &mut Self {
        self.method_pattern = Some(pattern.to_owned());
        self
    }

    /// Requires the host to match `pattern`, e.g. `"{locale}.example.com"`.
    /// Host placeholders are available like path placeholders.
    pub fn host(&mut self, pattern: &str) -> &mut Self {
        self.host = Some(pattern.to_owned());
        self
    }

    /// Requests over https are redirected to http.
    pub fn require_http(&mut self) -> &mut Self {
        self.scheme = Some(Scheme::Http);
        self
    }

    /// Requests over http are redirected to https.
    pub fn require_https(&mut self) -> &mut Self {
        self.scheme = Some(Scheme::Https);
        self
    }

    /// Only match when `condition` holds. A failing condition is a plain
    /// non-match: the search moves on to the next route.
    pub fn when<F>(&mut self, condition: F) -> &mut Self
    where
        F: Fn(&Request, &Params) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Constrains placeholder `name` to `regex`.
    pub fn assert(&mut self, name: &str, regex: &str) -> &mut Self {
        self.requirements.retain(|(k, _)| k != name);
        self.requirements.push((name.to_owned(), regex.to_owned()));
        self
    }

    /// Default value for placeholder `name`. Trailing placeholders with
    /// defaults become optional.
    pub fn value(&mut self, name: &str, default: &str) -> &mut Self {
        self.defaults.retain(|(k, _)| k != name);
        self.defaults.push((name.to_owned(), default.to_owned()));
        self
    }

    /// Declares a controller argument that must be bindable.
    pub fn arg(&mut self, name: &str) -> &mut Self {
        self.signature.push(name, None);
        self
    }

    /// Declares a controller argument with a fallback value.
    pub fn arg_or(&mut self, name: &str, default: &str) -> &mut Self {
        self.signature.push(name, Some(default.to_owned()));
        self
    }

    /// Names the route, for URL generation.
    pub fn bind(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_owned());
        self
    }

    /// The path pattern as registered, placeholders included.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The host pattern set with [`Route::host`], if any.
    pub fn host_pattern(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The scheme set with [`Route::require_https`] or [`Route::require_http`].
    pub fn required_scheme(&self) -> Option<Scheme> {
        self.scheme
    }

    /// The name given with [`Route::bind`]. Unnamed routes get a generated
    /// name when the collection is built; this returns `None` for them.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn requirement(&self, name: &str) -> Option<&str> {
        self.requirements.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub(crate) fn default_for(&self, name: &str) -> Option<&str> {
        self.defaults.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("methods", &self.method_pattern)
            .field("host", &self.host)
            .field("scheme", &self.scheme)
            .field("name", &self.name)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

// ── Pattern compilation ───────────────────────────────────────────────────────

#[derive(Debug)]
enum Token {
    Text(String),
    /// A placeholder with the separator that precedes it (`/`, `.` or empty).
    Variable { separator: Option<char>, name: String },
}

/// A compiled path or host pattern.
#[derive(Debug)]
pub(crate) struct Pattern {
    source: String,
    regex: Regex,
    tokens: Vec<Token>,
    variables: Vec<String>,
    is_host: bool,
}

impl Pattern {
    pub(crate) fn compile(route: &Route, source: &str, default_requirement: &str, is_host: bool) -> Result<Self, Error> {
        let tokens = tokenize(source, is_host)?;

        let mut variables: Vec<String> = Vec::new();
        for token in &tokens {
            if let Token::Variable { name, .. } = token {
                if variables.contains(name) {
                    return Err(invalid(source, format!("placeholder `{name}` is used more than once")));
                }
                variables.push(name.clone());
            }
        }

        // The tail of placeholders that all have defaults is optional.
        let mut first_optional = tokens.len();
        if !is_host {
            for (i, token) in tokens.iter().enumerate().rev() {
                match token {
                    Token::Variable { name, .. } if route.default_for(name).is_some() => first_optional = i,
                    _ => break,
                }
            }
        }

        let mut regex = String::from("^");
        for (i, token) in tokens.iter().enumerate() {
            // An optional tail starting the pattern keeps its separator
            // mandatory, so `/{page}` still matches `/`.
            let mut separator_emitted = false;
            if i >= first_optional {
                if let (0, Token::Variable { separator: Some(separator), .. }) = (i, token) {
                    regex.push_str(&regex::escape(&separator.to_string()));
                    separator_emitted = true;
                }
                regex.push_str("(?:");
            }
            match token {
                Token::Text(text) => regex.push_str(&regex::escape(text)),
                Token::Variable { separator, name } => {
                    if let Some(separator) = separator.filter(|_| !separator_emitted) {
                        regex.push_str(&regex::escape(&separator.to_string()));
                    }
                    let requirement = trim_anchors(route.requirement(name).unwrap_or(default_requirement));
                    Regex::new(requirement).map_err(|source| Error::InvalidRequirement {
                        pattern: source_string(route),
                        placeholder: name.clone(),
                        source,
                    })?;
                    regex.push_str(&format!("(?P<{name}>{requirement})"));
                }
            }
        }
        for _ in first_optional..tokens.len() {
            regex.push_str(")?");
        }
        regex.push('$');

        let regex = RegexBuilder::new(&regex)
            .case_insensitive(is_host)
            .size_limit(MAX_REGEX_SIZE)
            .build()
            .map_err(|e| invalid(source, e.to_string()))?;

        Ok(Self { source: source.to_owned(), regex, tokens, variables, is_host })
    }

    pub(crate) fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Matches `subject`, writing captured placeholders into `params`.
    pub(crate) fn captures(&self, subject: &str, params: &mut Params) -> bool {
        let Some(caps) = self.regex.captures(subject) else {
            return false;
        };
        for name in &self.variables {
            if let Some(value) = caps.name(name) {
                params.insert(name.as_str(), value.as_str());
            }
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn is_match(&self, subject: &str) -> bool {
        self.regex.is_match(subject)
    }

    /// Rebuilds a concrete string from the pattern.
    ///
    /// Trailing placeholders whose value equals their default are dropped,
    /// so `/blog/{page}` with default `1` generates `/blog` for page 1.
    pub(crate) fn generate(&self, route: &Route, params: &Params, route_name: &str) -> Result<String, Error> {
        let value_of = |name: &str| -> Result<String, Error> {
            params
                .get(name)
                .or_else(|| route.default_for(name))
                .map(str::to_owned)
                .ok_or_else(|| Error::MissingParameter { route: route_name.to_owned(), parameter: name.to_owned() })
        };

        let mut end = self.tokens.len();
        if !self.is_host {
            while let Some(Token::Variable { name, .. }) = end.checked_sub(1).map(|i| &self.tokens[i]) {
                match route.default_for(name) {
                    Some(default) if params.get(name).is_none_or(|v| v == default) => end -= 1,
                    _ => break,
                }
            }
        }

        let mut out = String::new();
        for token in &self.tokens[..end] {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Variable { separator, name } => {
                    if let Some(separator) = separator {
                        out.push(*separator);
                    }
                    out.push_str(&value_of(name)?);
                }
            }
        }
        if out.is_empty() && !self.is_host && !self.source.is_empty() {
            out.push('/');
        }
        Ok(out)
    }
}

fn tokenize(source: &str, is_host: bool) -> Result<Vec<Token>, Error> {
    let separator_char = if is_host { '.' } else { '/' };
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut chars = source.chars();

    while let Some(c) = chars.next() {
        if c == '}' {
            return Err(invalid(source, "unexpected `}`".into()));
        }
        if c != '{' {
            text.push(c);
            continue;
        }

        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            name.push(c);
        }
        if !closed {
            return Err(invalid(source, "unclosed `{`".into()));
        }
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid(source, format!("invalid placeholder name `{name}`")));
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid(source, format!("placeholder `{name}` must not start with a digit")));
        }

        let separator = if text.ends_with(separator_char) {
            text.pop();
            Some(separator_char)
        } else {
            None
        };
        if !text.is_empty() {
            tokens.push(Token::Text(std::mem::take(&mut text)));
        }
        tokens.push(Token::Variable { separator, name });
    }
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    Ok(tokens)
}

/// Requirements are embedded in a larger regex, so their own `^`/`$`
/// anchors are dropped.
fn trim_anchors(requirement: &str) -> &str {
    let requirement = requirement.strip_prefix('^').unwrap_or(requirement);
    match requirement.strip_suffix('$') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => requirement,
    }
}

fn invalid(pattern: &str, reason: String) -> Error {
    Error::InvalidPattern { pattern: pattern.to_owned(), reason }
}

fn source_string(route: &Route) -> String {
    match &route.host {
        Some(host) => format!("{host}{}", route.path),
        None => route.path.clone(),
    }
}

// ── CompiledRoute ─────────────────────────────────────────────────────────────

/// A route ready for matching: patterns compiled, controller resolved.
pub(crate) struct CompiledRoute {
    pub(crate) name: String,
    pub(crate) route: Route,
    pub(crate) methods: MethodSet,
    pub(crate) path: Pattern,
    pub(crate) host: Option<Pattern>,
    pub(crate) handler: BoxedHandler,
}

impl CompiledRoute {
    pub(crate) fn compile(name: String, route: Route, handler: BoxedHandler) -> Result<Self, Error> {
        let methods = match &route.method_pattern {
            Some(pattern) => pattern.parse()?,
            None => route.methods.clone(),
        };
        let path = Pattern::compile(&route, &route.path, DEFAULT_PATH_REQUIREMENT, false)?;
        let host = route
            .host
            .as_deref()
            .map(|host| Pattern::compile(&route, host, DEFAULT_HOST_REQUIREMENT, true))
            .transpose()?;
        Ok(Self { name, route, methods, path, host, handler })
    }

    /// Every name a controller argument can bind to from the route itself.
    pub(crate) fn placeholders(&self) -> Vec<String> {
        let mut names = self.path.variables().to_vec();
        if let Some(host) = &self.host {
            names.extend(host.variables().iter().cloned());
        }
        for (name, _) in &self.route.defaults {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Arguments;

    fn route(path: &str) -> Route {
        Route::new(path, Controller::new(|_: &Arguments| "ok"))
    }

    fn compile(route: &Route) -> Result<Pattern, Error> {
        Pattern::compile(route, &route.path, DEFAULT_PATH_REQUIREMENT, false)
    }

    #[test]
    fn placeholders_capture_one_segment() {
        let r = route("/users/{id}/posts/{post}");
        let pattern = compile(&r).unwrap();
        let mut params = Params::new();
        assert!(pattern.captures("/users/42/posts/7", &mut params));
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("post"), Some("7"));
        assert!(!pattern.is_match("/users/42/posts/7/extra"));
        assert!(!pattern.is_match("/users/4/2/posts/7"));
    }

    #[test]
    fn requirements_constrain_placeholders() {
        let mut r = route("/users/{id}");
        r.assert("id", r"\d+");
        let pattern = compile(&r).unwrap();
        assert!(pattern.is_match("/users/42"));
        assert!(!pattern.is_match("/users/bob"));
    }

    #[test]
    fn anchored_requirements_are_trimmed() {
        let mut r = route("/u/{id}");
        r.assert("id", r"^\d+$");
        let pattern = compile(&r).unwrap();
        assert!(pattern.is_match("/u/42"));
        assert!(!pattern.is_match("/u/bob"));

        assert_eq!(trim_anchors(r"^\d+$"), r"\d+");
        assert_eq!(trim_anchors(r"a\$"), r"a\$");
    }

    #[test]
    fn optional_root_placeholder_keeps_its_slash() {
        let mut r = route("/{page}");
        r.value("page", "1");
        let pattern = compile(&r).unwrap();
        assert!(pattern.is_match("/"));
        assert!(pattern.is_match("/2"));
        assert!(!pattern.is_match(""));
        assert_eq!(pattern.generate(&r, &Params::new(), "home").unwrap(), "/");
    }

    #[test]
    fn literal_text_is_escaped() {
        let pattern = compile(&route("/files/a.b+c")).unwrap();
        assert!(pattern.is_match("/files/a.b+c"));
        assert!(!pattern.is_match("/files/aXb+c"));
    }

    #[test]
    fn trailing_placeholders_with_defaults_are_optional() {
        let mut r = route("/blog/{year}/{page}");
        r.value("page", "1").value("year", "2024");
        let pattern = compile(&r).unwrap();
        assert!(pattern.is_match("/blog"));
        assert!(pattern.is_match("/blog/2020"));
        assert!(pattern.is_match("/blog/2020/3"));
        assert!(!pattern.is_match("/blog/"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(matches!(compile(&route("/a/{id")), Err(Error::InvalidPattern { .. })));
        assert!(matches!(compile(&route("/a/id}")), Err(Error::InvalidPattern { .. })));
        assert!(matches!(compile(&route("/a/{}")), Err(Error::InvalidPattern { .. })));
        assert!(matches!(compile(&route("/{a}/{a}")), Err(Error::InvalidPattern { .. })));

        let mut r = route("/a/{id}");
        r.assert("id", "(");
        assert!(matches!(compile(&r), Err(Error::InvalidRequirement { .. })));
    }

    #[test]
    fn host_patterns_split_on_dots() {
        let r = route("/");
        let pattern = Pattern::compile(&r, "{locale}.example.com", DEFAULT_HOST_REQUIREMENT, true).unwrap();
        let mut params = Params::new();
        assert!(pattern.captures("fr.example.com", &mut params));
        assert_eq!(params.get("locale"), Some("fr"));
        assert!(!pattern.is_match("a.b.example.com"));
    }

    #[test]
    fn generate_fills_placeholders_and_drops_default_tail() {
        let mut r = route("/blog/{slug}/{page}");
        r.value("page", "1");
        let pattern = compile(&r).unwrap();

        let params: Params = [("slug", "hello")].into_iter().collect();
        assert_eq!(pattern.generate(&r, &params, "blog").unwrap(), "/blog/hello");

        let params: Params = [("slug", "hello"), ("page", "3")].into_iter().collect();
        assert_eq!(pattern.generate(&r, &params, "blog").unwrap(), "/blog/hello/3");

        let err = pattern.generate(&r, &Params::new(), "blog").unwrap_err();
        assert!(matches!(err, Error::MissingParameter { ref parameter, .. } if parameter == "slug"));
    }
}
