//! Deferred side effects.
//!
//! An [`Effect`] describes one fallible action without performing it.
//! Nothing happens until [`Effect::run`] is called, and an effect can be
//! run any number of times; each run performs the action again. This lets
//! orchestration (spawn, then write, then read) be assembled up front and
//! exercised in tests with substituted effects instead of real OS calls.
//!
//! ```
//! use ptyvisor::effect::Effect;
//!
//! let doubled = Effect::<i32, String>::pure(21).map(|n| n * 2);
//! assert_eq!(doubled.run(), Ok(42));
//! ```

use std::fmt;
use std::sync::Arc;

type Thunk<T, E> = Arc<dyn Fn() -> Result<T, E> + Send + Sync>;

/// A re-invokable, zero-argument computation yielding `Result<T, E>`.
pub struct Effect<T, E> {
    thunk: Thunk<T, E>,
}

impl<T, E> Clone for Effect<T, E> {
    fn clone(&self) -> Self {
        Self {
            thunk: Arc::clone(&self.thunk),
        }
    }
}

impl<T, E> fmt::Debug for Effect<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Effect { .. }")
    }
}

impl<T: 'static, E: 'static> Effect<T, E> {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Self { thunk: Arc::new(f) }
    }

    /// An effect that performs nothing and always yields `value`.
    pub fn pure(value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        Self::from_fn(move || Ok(value.clone()))
    }

    /// An effect that performs nothing and always fails with `error`.
    pub fn fail(error: E) -> Self
    where
        E: Clone + Send + Sync,
    {
        Self::from_fn(move || Err(error.clone()))
    }

    /// Perform the action.
    pub fn run(&self) -> Result<T, E> {
        (self.thunk)()
    }

    /// Transform the success value; errors pass through untouched.
    pub fn map<U, F>(self, f: F) -> Effect<U, E>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let thunk = self.thunk;
        Effect::from_fn(move || thunk().map(&f))
    }

    /// Transform the error value; successes pass through untouched.
    pub fn map_err<E2, F>(self, f: F) -> Effect<T, E2>
    where
        E2: 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let thunk = self.thunk;
        Effect::from_fn(move || thunk().map_err(&f))
    }

    /// Chain a dependent effect. `f` is never called if `self` fails.
    pub fn bind<U, F>(self, f: F) -> Effect<U, E>
    where
        U: 'static,
        F: Fn(T) -> Effect<U, E> + Send + Sync + 'static,
    {
        let thunk = self.thunk;
        Effect::from_fn(move || {
            let value = thunk()?;
            f(value).run()
        })
    }

    /// Alias of [`Effect::bind`].
    pub fn and_then<U, F>(self, f: F) -> Effect<U, E>
    where
        U: 'static,
        F: Fn(T) -> Effect<U, E> + Send + Sync + 'static,
    {
        self.bind(f)
    }

    /// Run `self`, discard its value, then run `next`.
    pub fn then<U: 'static>(self, next: Effect<U, E>) -> Effect<U, E> {
        let thunk = self.thunk;
        Effect::from_fn(move || {
            thunk()?;
            next.run()
        })
    }
}

/// Combine effects into one that runs them strictly in order.
///
/// Stops at the first failure and returns it; effects after the failing
/// one are not run.
pub fn sequence<T: 'static, E: 'static>(effects: Vec<Effect<T, E>>) -> Effect<Vec<T>, E> {
    Effect::from_fn(move || effects.iter().map(Effect::run).collect())
}
