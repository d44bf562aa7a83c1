//! Handler trait and type erasure.
//!
//! # How controllers are stored
//!
//! Routes hold controllers of *different* types in one `Vec`. Rust
//! collections hold one concrete type, so each controller is hidden behind a
//! trait object (`dyn ErasedHandler`) and stored uniformly.
//!
//! ```text
//! fn hello(args: &Arguments) -> String { … }     ← user writes this
//!        ↓ app.get("/", hello)
//! hello.into_boxed_handler()                     ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                     ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(&args)  at request time           ← one vtable dispatch
//!        ↓
//! hello(&args).into_reply()                      ← Result<Reply, Failure>
//! ```
//!
//! Controllers are synchronous: a dispatch runs start to finish without
//! suspension points. The server moves each dispatch onto tokio's blocking
//! pool so slow controllers do not stall the reactor.

use std::sync::Arc;

use crate::controller::Arguments;
use crate::error::Failure;
use crate::reply::{IntoReply, Reply};

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, args: &Arguments) -> Result<Reply, Failure>;
}

/// A type-erased controller shared by every request that hits its route.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid native controller.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the signature:
///
/// ```text
/// fn name(args: &Arguments) -> impl IntoReply
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, R> private::Sealed for F
where
    F: Fn(&Arguments) -> R + Send + Sync + 'static,
    R: IntoReply,
{
}

impl<F, R> Handler for F
where
    F: Fn(&Arguments) -> R + Send + Sync + 'static,
    R: IntoReply,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete controller `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(&Arguments) -> R,
    R: IntoReply,
{
    fn call(&self, args: &Arguments) -> Result<Reply, Failure> {
        (self.0)(args).into_reply()
    }
}
