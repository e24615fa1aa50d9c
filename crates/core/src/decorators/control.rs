//! Control-flow decorators: validate, switch and repeat
//!
//! None of these hold timing state. They exist so that argument checks,
//! routing and repetition compose in a pipeline like every other decorator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use decorum_common::error::DecoratorError;
use futures::future;
use tracing::debug;

use crate::callable::{CallFuture, Callable};

/// Argument check returning a message on rejection
pub type Validator<A> = Arc<dyn Fn(&A) -> Result<(), String> + Send + Sync>;

/// Runs every validator before delegating
///
/// All validators run even after one rejects, so the error carries every
/// message at once.
pub struct Validate<A, T, E> {
    inner: Callable<A, T, E>,
    validators: Vec<Validator<A>>,
}

impl<A, T, E> Validate<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: From<DecoratorError> + Send + 'static,
{
    /// Validate arguments before calling `inner`
    pub fn new(inner: Callable<A, T, E>) -> Self {
        Self { inner, validators: Vec::new() }
    }

    /// Add a validator
    pub fn rule<F>(mut self, validator: F) -> Self
    where
        F: Fn(&A) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Invoke after validation
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        let messages: Vec<String> =
            self.validators.iter().filter_map(|validator| validator(&args).err()).collect();

        if messages.is_empty() {
            return self.inner.call(args);
        }
        debug!(failures = messages.len(), "Arguments rejected");
        Box::pin(future::ready(Err(E::from(DecoratorError::validation(messages)))))
    }

    /// A callable that routes through this decorator
    pub fn callable(&self) -> Callable<A, T, E> {
        let this = self.clone();
        Callable::from_boxed(move |args| this.call(args))
    }
}

impl<A, T, E> Clone for Validate<A, T, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), validators: self.validators.clone() }
    }
}

impl<A, T, E> fmt::Debug for Validate<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validate").field("validators", &self.validators.len()).finish_non_exhaustive()
    }
}

/// Maps arguments to a branch name
pub type Selector<A> = Arc<dyn Fn(&A) -> String + Send + Sync>;

/// Routes each call to the branch its selector names
pub struct Switch<A, T, E> {
    selector: Selector<A>,
    branches: HashMap<String, Callable<A, T, E>>,
    fallback: Option<Callable<A, T, E>>,
}

impl<A, T, E> Switch<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: From<DecoratorError> + Send + 'static,
{
    /// Route calls by `selector`
    pub fn new<F>(selector: F) -> Self
    where
        F: Fn(&A) -> String + Send + Sync + 'static,
    {
        Self { selector: Arc::new(selector), branches: HashMap::new(), fallback: None }
    }

    /// Add a branch, replacing any previous branch with the same name
    pub fn branch<S: Into<String>>(mut self, name: S, callable: Callable<A, T, E>) -> Self {
        self.branches.insert(name.into(), callable);
        self
    }

    /// Branch used when no named branch matches
    pub fn fallback(mut self, callable: Callable<A, T, E>) -> Self {
        self.fallback = Some(callable);
        self
    }

    /// Invoke the selected branch
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        let selected = (self.selector)(&args);
        match self.branches.get(&selected).or(self.fallback.as_ref()) {
            Some(branch) => branch.call(args),
            None => {
                debug!(selector = %selected, "No branch matches");
                Box::pin(future::ready(Err(E::from(DecoratorError::no_match(selected)))))
            }
        }
    }

    /// A callable that routes through this switch
    pub fn callable(&self) -> Callable<A, T, E> {
        let this = self.clone();
        Callable::from_boxed(move |args| this.call(args))
    }
}

impl<A, T, E> Clone for Switch<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            selector: Arc::clone(&self.selector),
            branches: self.branches.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

impl<A, T, E> fmt::Debug for Switch<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.branches.keys().collect();
        names.sort();
        f.debug_struct("Switch")
            .field("branches", &names)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Observes `(iteration, value)` after each successful iteration (1-based)
pub type IterationObserver<T> = Arc<dyn Fn(u32, &T) + Send + Sync>;

/// Runs the callable several times in sequence
pub struct Repeat<A, T, E> {
    inner: Callable<A, T, E>,
    times: u32,
    on_iteration: Option<IterationObserver<T>>,
}

impl<A, T, E> Repeat<A, T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: From<DecoratorError> + Send + 'static,
{
    /// Run `inner` `times` times per call
    pub fn new(inner: Callable<A, T, E>, times: u32) -> Self {
        Self { inner, times, on_iteration: None }
    }

    /// Observe each iteration's value
    pub fn on_iteration<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, &T) + Send + Sync + 'static,
    {
        self.on_iteration = Some(Arc::new(observer));
        self
    }

    /// Run the iterations and return the last value
    ///
    /// Stops at the first error. Zero iterations is a state violation.
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        let inner = self.inner.clone();
        let times = self.times;
        let on_iteration = self.on_iteration.clone();

        Box::pin(async move {
            let mut last = None;
            for iteration in 1..=times {
                let value = inner.call(args.clone()).await?;
                if let Some(observer) = &on_iteration {
                    observer(iteration, &value);
                }
                last = Some(value);
            }
            last.ok_or_else(|| {
                E::from(DecoratorError::state_violation("repeat requires at least one iteration"))
            })
        })
    }

    /// A callable that routes through this decorator
    pub fn callable(&self) -> Callable<A, T, E> {
        let this = self.clone();
        Callable::from_boxed(move |args| this.call(args))
    }
}

impl<A, T, E> Clone for Repeat<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            times: self.times,
            on_iteration: self.on_iteration.clone(),
        }
    }
}

impl<A, T, E> fmt::Debug for Repeat<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repeat").field("times", &self.times).finish_non_exhaustive()
    }
}
