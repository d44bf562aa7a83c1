//! View listeners.
//!
//! When a controller returns a value instead of a response, the kernel hands
//! that value to the view listeners in registration order. A listener may
//! leave the value alone (`None`), replace it with another value, or turn it
//! into a response, which ends view processing.
//!
//! Typed listeners only see values of their declared type:
//!
//! ```rust
//! use trellis::{Application, Arguments, Reply, Response};
//!
//! struct Post { title: String }
//!
//! let mut app = Application::new();
//! app.get("/post", |_: &Arguments| Reply::value(Post { title: "Hello".into() }));
//! app.view(|post: &Post, _req| Some(Reply::from(Response::html(format!("<h1>{}</h1>", post.title)))));
//! ```

use std::any::{Any, type_name};

use tracing::trace;

use crate::reply::{Reply, Value};
use crate::request::Request;

type Listener = Box<dyn Fn(&Value, &Request) -> Option<Reply> + Send + Sync>;

struct ViewListener {
    accepts: &'static str,
    call: Listener,
}

/// Ordered view listeners.
#[derive(Default)]
pub(crate) struct Views {
    listeners: Vec<ViewListener>,
}

impl Views {
    /// A listener that fires only for values of type `T`.
    pub(crate) fn push_typed<T, F, R>(&mut self, listener: F)
    where
        T: Any,
        F: Fn(&T, &Request) -> R + Send + Sync + 'static,
        R: Into<Option<Reply>> + 'static,
    {
        let call = move |value: &Value, request: &Request| -> Option<Reply> {
            let typed = value.downcast_ref::<T>()?;
            listener(typed, request).into()
        };
        self.listeners.push(ViewListener { accepts: type_name::<T>(), call: Box::new(call) });
    }

    /// A listener that fires for every value.
    pub(crate) fn push_any<F, R>(&mut self, listener: F)
    where
        F: Fn(&Value, &Request) -> R + Send + Sync + 'static,
        R: Into<Option<Reply>> + 'static,
    {
        let call = move |value: &Value, request: &Request| -> Option<Reply> { listener(value, request).into() };
        self.listeners.push(ViewListener { accepts: "*", call: Box::new(call) });
    }

    pub(crate) fn process(&self, mut value: Value, request: &Request) -> Reply {
        for listener in &self.listeners {
            match (listener.call)(&value, request) {
                None => {}
                Some(Reply::Response(response)) => {
                    trace!(listener = listener.accepts, "view listener produced a response");
                    return Reply::Response(response);
                }
                Some(Reply::Value(replacement)) => {
                    trace!(listener = listener.accepts, from = value.type_name(), to = replacement.type_name(), "view listener replaced the value");
                    value = replacement;
                }
            }
        }
        Reply::Value(value)
    }
}
