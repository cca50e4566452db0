//! Blocking and awaitable callables.
//!
//! Every hook, responder, and error handler is stored as a [`Callable`]: either
//! a plain function that runs to completion on the calling thread, or a
//! function returning a boxed future that the executor awaits. The form is
//! fixed when the callable is constructed, which lets registration check
//! compatibility with the application's execution mode before any request is
//! served.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The invocation form of a [`Callable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableForm {
    /// Runs to completion when called.
    Blocking,
    /// Returns a future that must be awaited.
    Awaitable,
}

impl CallableForm {
    /// Returns the lowercase name of the form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Awaitable => "awaitable",
        }
    }
}

impl fmt::Display for CallableForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A callback in one of two forms.
///
/// `B` is the `dyn Fn` signature of the blocking form and `A` the signature
/// of the awaitable form. Concrete aliases (for example
/// [`Responder`](crate::Responder)) add constructors and a `call` method
/// for their argument list.
pub enum Callable<B: ?Sized, A: ?Sized> {
    /// A function that runs to completion.
    Blocking(Arc<B>),
    /// A function returning a future.
    Awaitable(Arc<A>),
}

impl<B: ?Sized, A: ?Sized> Callable<B, A> {
    /// Returns the invocation form.
    #[must_use]
    pub const fn form(&self) -> CallableForm {
        match self {
            Self::Blocking(_) => CallableForm::Blocking,
            Self::Awaitable(_) => CallableForm::Awaitable,
        }
    }

    /// Returns true if the callable must be awaited.
    #[must_use]
    pub const fn is_awaitable(&self) -> bool {
        matches!(self, Self::Awaitable(_))
    }
}

impl<B: ?Sized, A: ?Sized> Clone for Callable<B, A> {
    fn clone(&self) -> Self {
        match self {
            Self::Blocking(f) => Self::Blocking(Arc::clone(f)),
            Self::Awaitable(f) => Self::Awaitable(Arc::clone(f)),
        }
    }
}

impl<B: ?Sized, A: ?Sized> fmt::Debug for Callable<B, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callable").field(&self.form()).finish()
    }
}
