//! Incoming HTTP request type.

use std::fmt;

use bytes::Bytes;
use http::header::HOST;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use percent_encoding::percent_decode_str;

use crate::error::Error;

/// URL scheme of a request, or the one a route requires.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("https") {
            Some(Self::Https)
        } else if s.eq_ignore_ascii_case("http") {
            Some(Self::Http)
        } else {
            None
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placeholder values extracted by the router, in pattern order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets `name`, replacing an earlier value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// An incoming HTTP request.
///
/// Built by the server from hyper's request parts, or directly from a URI:
///
/// ```rust
/// use trellis::{Method, Request, Scheme};
///
/// let req = Request::create(Method::GET, "https://example.com/users/42?tab=posts").unwrap();
/// assert_eq!(req.scheme(), Scheme::Https);
/// assert_eq!(req.host(), "example.com");
/// assert_eq!(req.path(), "/users/42");
/// assert_eq!(req.query(), Some("tab=posts"));
/// ```
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    raw_path: String,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    params: Params,
}

impl Request {
    /// Builds a request from an absolute or origin-form URI.
    ///
    /// Missing parts default to `http`, host `localhost` and path `/`.
    pub fn create(method: Method, uri: &str) -> Result<Self, Error> {
        let uri: Uri = uri.parse().map_err(|_| Error::InvalidUri(uri.to_owned()))?;
        let scheme = uri.scheme_str().and_then(Scheme::parse).unwrap_or(Scheme::Http);
        let host = uri.host().unwrap_or("localhost").to_owned();
        let port = uri.port_u16();
        Ok(Self::assemble(method, scheme, host, port, &uri, HeaderMap::new(), Bytes::new()))
    }

    /// Builds a request from what hyper hands the server.
    ///
    /// The scheme honors `x-forwarded-proto`, so routes requiring https work
    /// behind a TLS-terminating proxy. The host comes from the `Host` header.
    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(Scheme::parse)
            .or_else(|| parts.uri.scheme_str().and_then(Scheme::parse))
            .unwrap_or(Scheme::Http);

        let authority = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_owned());
        let (host, port) = split_authority(&authority);

        Self::assemble(parts.method, scheme, host, port, &parts.uri, parts.headers, body)
    }

    fn assemble(
        method: Method,
        scheme: Scheme,
        host: String,
        port: Option<u16>,
        uri: &Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        let raw_path = match uri.path() {
            "" => "/".to_owned(),
            p => p.to_owned(),
        };
        let path = percent_decode_str(&raw_path).decode_utf8_lossy().into_owned();
        Self {
            method,
            scheme,
            host: host.to_ascii_lowercase(),
            port,
            raw_path,
            path,
            query: uri.query().filter(|q| !q.is_empty()).map(str::to_owned),
            headers,
            body,
            params: Params::new(),
        }
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn scheme(&self) -> Scheme { self.scheme }
    pub fn is_secure(&self) -> bool { self.scheme == Scheme::Https }
    pub fn host(&self) -> &str { &self.host }
    pub fn port(&self) -> Option<u16> { self.port }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// The percent-decoded path, used for matching.
    pub fn path(&self) -> &str { &self.path }

    /// The path as it arrived on the wire.
    pub fn raw_path(&self) -> &str { &self.raw_path }

    pub fn query(&self) -> Option<&str> { self.query.as_deref() }

    /// Raw path plus query string, e.g. `/search?q=rust`.
    pub fn request_uri(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.raw_path),
            None => self.raw_path.clone(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a decoded query-string parameter.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let name = parts.next()?;
            (name == key).then(|| {
                let value = parts.next().unwrap_or("").replace('+', " ");
                percent_decode_str(&value).decode_utf8_lossy().into_owned()
            })
        })
    }

    /// Returns a placeholder value of the matched route.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    pub fn params(&self) -> &Params { &self.params }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }
}

fn split_authority(authority: &str) -> (String, Option<u16>) {
    // `[::1]:8080` keeps its brackets; only a trailing numeric port is split off.
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !port.contains(']') => match port.parse() {
            Ok(port) => (host.to_owned(), Some(port)),
            Err(_) => (authority.to_owned(), None),
        },
        _ => (authority.to_owned(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_defaults_missing_parts() {
        let req = Request::create(Method::GET, "/foo").unwrap();
        assert_eq!(req.scheme(), Scheme::Http);
        assert_eq!(req.host(), "localhost");
        assert_eq!(req.port(), None);
        assert_eq!(req.path(), "/foo");
        assert_eq!(req.query(), None);
    }

    #[test]
    fn create_reads_absolute_uris() {
        let req = Request::create(Method::POST, "https://Example.com:8443/a%20b?x=1").unwrap();
        assert!(req.is_secure());
        assert_eq!(req.host(), "example.com");
        assert_eq!(req.port(), Some(8443));
        assert_eq!(req.raw_path(), "/a%20b");
        assert_eq!(req.path(), "/a b");
        assert_eq!(req.request_uri(), "/a%20b?x=1");
    }

    #[test]
    fn query_params_are_decoded() {
        let req = Request::create(Method::GET, "/s?q=hello+world&lang=en%2Dus&flag").unwrap();
        assert_eq!(req.query_param("q").as_deref(), Some("hello world"));
        assert_eq!(req.query_param("lang").as_deref(), Some("en-us"));
        assert_eq!(req.query_param("flag").as_deref(), Some(""));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn from_parts_honors_forwarded_proto_and_host_header() {
        let (parts, ()) = http::Request::builder()
            .method(Method::GET)
            .uri("/secured?x=1")
            .header("host", "example.com:8080")
            .header("x-forwarded-proto", "https")
            .body(())
            .unwrap()
            .into_parts();
        let req = Request::from_parts(parts, Bytes::new());
        assert_eq!(req.scheme(), Scheme::Https);
        assert_eq!(req.host(), "example.com");
        assert_eq!(req.port(), Some(8080));
        assert_eq!(req.request_uri(), "/secured?x=1");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = Request::create(Method::GET, "/")
            .unwrap()
            .with_header("X-Token", "abc");
        assert_eq!(req.header("x-token"), Some("abc"));
    }

    #[test]
    fn params_replace_existing_values() {
        let mut params = Params::new();
        params.insert("id", "1");
        params.insert("id", "2");
        assert_eq!(params.get("id"), Some("2"));
        assert_eq!(params.len(), 1);
    }
}
