//! Uniform handle over asynchronous functions of zero, one or two arguments
//!
//! Arity is carried by the argument type `A`: `()` for nullary functions, the
//! argument itself for unary ones and an `(A, B)` tuple for binary ones. A
//! decorator is generic over `A`, so one implementation serves every arity.
//!
//! ```rust
//! use decorum_core::Callable;
//!
//! # tokio_test::block_on(async {
//! let ping = Callable::<(), &str, String>::nullary(|| async { Ok("pong") });
//! let add = Callable::<(i32, i32), i32, String>::binary(|a, b| async move { Ok(a + b) });
//!
//! assert_eq!(ping.call(()).await, Ok("pong"));
//! assert_eq!(add.call2(2, 3).await, Ok(5));
//! # });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

/// Boxed future returned by every callable
pub type CallFuture<T, E> = BoxFuture<'static, Result<T, E>>;

type CallFn<A, T, E> = dyn Fn(A) -> CallFuture<T, E> + Send + Sync;

/// A cheaply clonable asynchronous function `A -> Result<T, E>`
///
/// Callables own no state. Decorators hold state *about* a callable and hand
/// out new callables of the same shape.
pub struct Callable<A, T, E> {
    inner: Arc<CallFn<A, T, E>>,
}

impl<A, T, E> Callable<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wrap a unary async function
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self { inner: Arc::new(move |args| f(args).boxed()) }
    }

    /// Wrap a function that already returns a boxed future
    pub fn from_boxed<F>(f: F) -> Self
    where
        F: Fn(A) -> CallFuture<T, E> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Invoke the callable
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        (self.inner)(args)
    }
}

impl<T, E> Callable<(), T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wrap a nullary async function
    pub fn nullary<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::new(move |()| f())
    }

    /// Invoke a nullary callable
    pub fn call0(&self) -> CallFuture<T, E> {
        self.call(())
    }
}

impl<A, B, T, E> Callable<(A, B), T, E>
where
    A: Send + 'static,
    B: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wrap a binary async function
    pub fn binary<F, Fut>(f: F) -> Self
    where
        F: Fn(A, B) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::new(move |(a, b)| f(a, b))
    }

    /// Invoke a binary callable
    pub fn call2(&self, a: A, b: B) -> CallFuture<T, E> {
        self.call((a, b))
    }
}

impl<A, T, E> Clone for Callable<A, T, E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<A, T, E> fmt::Debug for Callable<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable").finish_non_exhaustive()
    }
}
