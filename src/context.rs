//! Named, read-only values controllers can bind as arguments.
//!
//! This is the application's answer to a service container: values are
//! registered by name while the application is configured and handed to the
//! kernel as one immutable map. There is no lazy construction and no ambient
//! lookup; a controller sees a value only if its route declares it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) type Shared = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
pub struct Context {
    values: HashMap<String, Shared>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `name`, replacing an earlier one.
    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.values.get(name)?.downcast_ref::<T>()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub(crate) fn shared(&self, name: &str) -> Option<Shared> {
        self.values.get(name).cloned()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.values.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("Context").field("values", &names).finish()
    }
}
