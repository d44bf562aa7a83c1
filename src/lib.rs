//! # trellis
//!
//! A micro web framework: an ordered route table, controllers resolved once
//! at startup, and a dispatcher that turns every request into exactly one
//! response.
//!
//! ## How a request flows
//!
//! 1. The router tries routes in registration order. Path, method, host,
//!    condition and scheme must all hold; the first route that passes wins.
//! 2. Before middleware runs and may answer early.
//! 3. The controller runs with the arguments its route declared.
//! 4. A non-response return value goes through the view listeners, then a
//!    plain string becomes a `200` HTML response.
//! 5. Anything that fails along the way goes to the error handlers and
//!    finally to the default exception page.
//! 6. After middleware sees every response.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use trellis::{Application, Arguments, HttpError, Response, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut app = Application::new();
//!
//!     app.get("/users/{id}", get_user).assert("id", r"\d+").arg("id");
//!     app.post("/users", |_: &Arguments| {
//!         Response::builder()
//!             .status(StatusCode::CREATED)
//!             .header("location", "/users/99")
//!             .no_body()
//!     });
//!
//!     let kernel = app.build().expect("invalid application");
//!     Server::bind("0.0.0.0:3000").serve(kernel).await.unwrap();
//! }
//!
//! fn get_user(args: &Arguments) -> Result<String, HttpError> {
//!     match args.get("id") {
//!         Some("0") => Err(HttpError::not_found("no such user")),
//!         Some(id) => Ok(format!("<h1>user {id}</h1>")),
//!         None => unreachable!(),
//!     }
//! }
//! ```
//!
//! The same kernel can be driven without a socket, which is how the tests
//! exercise it:
//!
//! ```rust
//! use trellis::{Application, Arguments, Method, Request};
//!
//! let mut app = Application::new();
//! app.get("/", |_: &Arguments| "home");
//! let kernel = app.build().unwrap();
//!
//! let res = kernel.handle(Request::create(Method::GET, "/").unwrap());
//! assert_eq!(res.content(), "home");
//! ```

mod app;
mod config;
mod context;
mod controller;
mod error;
mod exception;
mod handler;
mod kernel;
mod method;
mod middleware;
mod reply;
mod request;
mod response;
mod route;
mod router;
mod server;
mod view;

pub use app::Application;
pub use config::Config;
pub use context::Context;
pub use controller::{Arguments, ClassBuilder, Controller, Controllers, IntoController, REQUEST_ARGUMENT};
pub use error::{Error, Failure, HttpError};
pub use exception::ExceptionHandler;
pub use handler::Handler;
pub use kernel::Kernel;
pub use method::MethodSet;
pub use reply::{IntoReply, Reply, Value};
pub use request::{Params, Request, Scheme};
pub use response::{ContentType, Response, ResponseBuilder};
pub use route::{Condition, Route};
pub use router::RouteCollection;
pub use server::Server;

pub use http::{Method, StatusCode};
