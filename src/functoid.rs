//! Functoid: a callable bundled with its declared dependency keys
//! (`spec.md` §4.5).

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::key::{registry, Key};

/// Type-erased constructed value. Values are never downcast anywhere except
/// at the boundary where a concrete type was known (inside a closure the
/// caller supplied), so the DI core itself never needs `T: Debug`.
pub type BoxedValue = Arc<dyn Any + Send + Sync>;

/// Boxed future returned by an asynchronous [`Functoid`]'s callable.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Failure modes when building or invoking a [`Functoid`]
/// (`spec.md` §7 `FunctoidConstructionError`).
#[derive(Debug, thiserror::Error)]
pub enum FunctoidError {
    #[error("callable expects {expected} argument(s), but {actual} dependency key(s) were declared")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("the value produced for `{0}` could not be downcast to the expected type")]
    DowncastFailed(String),
    #[error("user callable failed: {0}")]
    CallableFailed(#[from] anyhow::Error),
    #[error("invoked an async functoid synchronously")]
    AsyncCalledSynchronously,
}

type SyncFn = dyn Fn(&[BoxedValue]) -> Result<BoxedValue, FunctoidError> + Send + Sync;
type AsyncFn = dyn Fn(SmallVec<[BoxedValue; 4]>) -> BoxFuture<Result<BoxedValue, FunctoidError>> + Send + Sync;

#[derive(Clone)]
enum Callable {
    Sync(Arc<SyncFn>),
    Async(Arc<AsyncFn>),
}

/// A callable bundled with its declared dependency [`Key`]s
/// (`spec.md` §4.5, GLOSSARY).
///
/// `callable.arity == dependencies.len()` is enforced at construction.
#[derive(Clone)]
pub struct Functoid {
    callable: Callable,
    dependencies: SmallVec<[Key; 4]>,
}

impl fmt::Debug for Functoid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Functoid")
            .field("is_async", &self.is_async())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl Functoid {
    /// Build a synchronous functoid from a callable and its explicit,
    /// ordered list of dependency keys — the canonical form (`spec.md`
    /// §4.5).
    pub fn from_fn<F>(dependencies: Vec<Key>, f: F) -> Self
    where
        F: Fn(&[BoxedValue]) -> Result<BoxedValue, FunctoidError> + Send + Sync + 'static,
    {
        Self {
            callable: Callable::Sync(Arc::new(f)),
            dependencies: dependencies.into(),
        }
    }

    /// Build an asynchronous functoid.
    pub fn from_async_fn<F, Fut>(dependencies: Vec<Key>, f: F) -> Self
    where
        F: Fn(SmallVec<[BoxedValue; 4]>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BoxedValue, FunctoidError>> + Send + 'static,
    {
        Self {
            callable: Callable::Async(Arc::new(move |args| Box::pin(f(args)))),
            dependencies: dependencies.into(),
        }
    }

    /// A zero-dependency functoid that always returns `value`.
    pub fn constant(value: BoxedValue) -> Self {
        Self::from_fn(vec![], move |_| Ok(value.clone()))
    }

    /// Build a functoid whose dependency keys are read from the process-
    /// lexical registry by type name (`spec.md` §9's reflection
    /// re-architecting note).
    pub fn from_registry<F>(type_name: &'static str, f: F) -> Option<Self>
    where
        F: Fn(&[BoxedValue]) -> Result<BoxedValue, FunctoidError> + Send + Sync + 'static,
    {
        let dependencies = registry::lookup(type_name)?;
        Some(Self::from_fn(dependencies, f))
    }

    pub fn dependencies(&self) -> &[Key] {
        &self.dependencies
    }

    pub fn is_async(&self) -> bool {
        matches!(self.callable, Callable::Async(_))
    }

    /// Invoke a synchronous functoid. Fails with
    /// [`FunctoidError::AsyncCalledSynchronously`] if this functoid is
    /// async.
    pub fn invoke_sync(&self, args: &[BoxedValue]) -> Result<BoxedValue, FunctoidError> {
        match &self.callable {
            Callable::Sync(f) => f(args),
            Callable::Async(_) => Err(FunctoidError::AsyncCalledSynchronously),
        }
    }

    /// Invoke this functoid, awaiting it if it is async.
    pub fn invoke_async(&self, args: SmallVec<[BoxedValue; 4]>) -> BoxFuture<Result<BoxedValue, FunctoidError>> {
        match &self.callable {
            Callable::Sync(f) => {
                let result = f(&args);
                Box::pin(std::future::ready(result))
            }
            Callable::Async(f) => f(args),
        }
    }

    /// Wrap this functoid's result with `map`, preserving its dependency
    /// list and awaiting behaviour.
    pub fn map<F>(self, map: F) -> Self
    where
        F: Fn(BoxedValue) -> Result<BoxedValue, FunctoidError> + Send + Sync + 'static,
    {
        let dependencies = self.dependencies.clone().into_vec();
        let map = Arc::new(map);
        match self.callable {
            Callable::Sync(f) => {
                let map = map.clone();
                Self::from_fn(dependencies, move |args| map(f(args)?))
            }
            Callable::Async(f) => Self::from_async_fn(dependencies, move |args| {
                let f = f.clone();
                let map = map.clone();
                async move {
                    let value = f(args).await?;
                    map(value)
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(n: i64) -> BoxedValue {
        Arc::new(n)
    }

    #[test]
    fn arity_is_implicit_in_dependency_count() {
        let functoid = Functoid::from_fn(vec![Key::of::<i64>()], |args| Ok(boxed(*args[0].downcast_ref::<i64>().unwrap() + 1)));
        assert_eq!(functoid.dependencies().len(), 1);
        let out = functoid.invoke_sync(&[boxed(41)]).unwrap();
        assert_eq!(*out.downcast_ref::<i64>().unwrap(), 42);
    }

    #[test]
    fn constant_ignores_args() {
        let functoid = Functoid::constant(boxed(7));
        assert!(functoid.dependencies().is_empty());
        let out = functoid.invoke_sync(&[]).unwrap();
        assert_eq!(*out.downcast_ref::<i64>().unwrap(), 7);
    }

    #[tokio::test]
    async fn async_functoid_can_be_awaited() {
        let functoid = Functoid::from_async_fn(vec![], |_args| async { Ok(boxed(9)) });
        assert!(functoid.is_async());
        let out = functoid.invoke_async(Default::default()).await.unwrap();
        assert_eq!(*out.downcast_ref::<i64>().unwrap(), 9);
    }
}
