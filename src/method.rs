//! Method requirements.
//!
//! A route's method requirement is written the way it reads in a config file:
//! `"GET"`, `"GET|POST"`, `"put|patch"`. Names are case-insensitive on the way
//! in and stored as [`http::Method`] values. An empty set means "any method".

use std::fmt;
use std::str::FromStr;

use http::Method;

use crate::error::Error;

/// The set of methods a route accepts.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MethodSet {
    methods: Vec<Method>,
}

impl MethodSet {
    /// The empty set, which accepts every method.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn one(method: Method) -> Self {
        Self { methods: vec![method] }
    }

    pub fn is_any(&self) -> bool {
        self.methods.is_empty()
    }

    /// `HEAD` is accepted wherever `GET` is.
    pub fn allows(&self, method: &Method) -> bool {
        self.is_any()
            || self.methods.contains(method)
            || (*method == Method::HEAD && self.methods.contains(&Method::GET))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    /// Adds the methods of `other` that are not already present.
    pub(crate) fn merge(&mut self, other: &MethodSet) {
        for method in &other.methods {
            if !self.methods.contains(method) {
                self.methods.push(method.clone());
            }
        }
    }

    /// The methods to advertise in an `Allow` header. HEAD is listed
    /// right after GET since GET routes answer it too.
    pub(crate) fn into_allow_list(mut self) -> Vec<Method> {
        if !self.methods.contains(&Method::HEAD) {
            if let Some(i) = self.methods.iter().position(|m| m == Method::GET) {
                self.methods.insert(i + 1, Method::HEAD);
            }
        }
        self.methods
    }
}

/// Parses a `|`-separated list of method names.
impl FromStr for MethodSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = MethodSet::any();
        for name in s.split('|').map(str::trim).filter(|name| !name.is_empty()) {
            let method = Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                .map_err(|_| Error::InvalidMethod(s.to_owned()))?;
            if !set.methods.contains(&method) {
                set.methods.push(method);
            }
        }
        Ok(set)
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("ANY");
        }
        let names = self.methods.iter().map(Method::as_str).collect::<Vec<_>>();
        f.write_str(&names.join("|"))
    }
}
