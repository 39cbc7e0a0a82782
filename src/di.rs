//! The dependency-injection container (§4.4): a keyed singleton cache with
//! lazy async factories, cycle-safe resolution, and deterministic teardown.
//!
//! Grounded on the teacher crate's `beans::BeanRegistry` for the overall
//! shape (type-erased `Box<dyn Any + Send + Sync>` entries, a boxed async
//! factory per registration, a dedicated error enum) but restructured from
//! a one-shot "resolve the whole graph via topological sort" builder into
//! a long-lived, incrementally-populated singleton cache per §4.4 — the
//! teacher resolves its whole `BeanContext` once at startup; this
//! container instead serves `get(key)` lazily for the life of the process,
//! which is why it needs per-key locks and task-local cycle detection
//! instead of a static Kahn's-algorithm pass.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::AcbError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type AnyArc = Arc<dyn Any + Send + Sync>;

/// Implemented by every type the container can own as a singleton.
///
/// Mirrors the adapter lifecycle's cleanup protocol (§4.5): `teardown` is
/// expected to be idempotent on the implementing type, since the
/// container itself only calls it once per key during `teardown()`.
pub trait Teardown: Send + Sync + 'static {
    fn teardown(&self) -> BoxFuture<'_, Result<(), AcbError>>;
}

/// Wraps a plain value that needs no cleanup (e.g. a config struct) so it
/// can still be bound into the container.
pub struct Plain<T>(pub T);

impl<T: Send + Sync + 'static> Teardown for Plain<T> {
    fn teardown(&self) -> BoxFuture<'_, Result<(), AcbError>> {
        Box::pin(async { Ok(()) })
    }
}

impl<T> std::ops::Deref for Plain<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

/// A DI capability key: a type, optionally disambiguated by a static name
/// for cases where multiple instances of the same interface coexist.
#[derive(Clone, Copy)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<&'static str>,
}

impl Key {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: None,
        }
    }

    pub fn named<T: 'static>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: Some(name),
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}
impl Eq for Key {}

impl std::hash::Hash for Key {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name {
            Some(name) => write!(f, "{}#{name}", self.type_name),
            None => write!(f, "{}", self.type_name),
        }
    }
}

type Factory = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyArc, AcbError>> + Send + Sync>;
type TeardownFn = Arc<dyn Fn(AnyArc) -> BoxFuture<'static, Result<(), AcbError>> + Send + Sync>;

tokio::task_local! {
    static IN_FLIGHT: RefCell<Vec<Key>>;
}

struct Guard {
    key: Key,
}

impl Drop for Guard {
    fn drop(&mut self) {
        let _ = IN_FLIGHT.try_with(|cell| {
            cell.borrow_mut().retain(|k| *k != self.key);
        });
    }
}

/// The keyed singleton cache. Cheap to clone (all state is behind `Arc`).
#[derive(Clone, Default)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

#[derive(Default)]
struct ContainerInner {
    factories: DashMap<Key, Factory>,
    teardowns: DashMap<Key, TeardownFn>,
    cache: DashMap<Key, AnyArc>,
    locks: DashMap<Key, Arc<AsyncMutex<()>>>,
    order: StdMutex<Vec<Key>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding. If a cached instance already exists for `key`,
    /// it is discarded without cleanup — this is meant to run before use.
    pub fn bind<T, F, Fut>(&self, key: Key, factory: F)
    where
        T: Teardown,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let factory: Factory = Arc::new(move || {
            let fut = factory();
            Box::pin(async move {
                let value = fut.await;
                Ok(Arc::new(value) as AnyArc)
            })
        });
        let teardown: TeardownFn = Arc::new(|any: AnyArc| {
            Box::pin(async move {
                match any.downcast::<T>() {
                    Ok(concrete) => concrete.teardown().await,
                    Err(_) => Ok(()),
                }
            })
        });

        self.inner.factories.insert(key, factory);
        self.inner.teardowns.insert(key, teardown);
        self.inner.cache.remove(&key);
        self.inner.order.lock().unwrap().retain(|k| *k != key);
    }

    /// Bind a concrete, already-constructed instance.
    pub fn bind_instance<T: Teardown>(&self, key: Key, instance: T) {
        let instance = Arc::new(instance);
        self.bind::<T, _, _>(key, move || {
            let instance = instance.clone();
            async move { Arc::try_unwrap(instance).unwrap_or_else(|_| unreachable!()) }
        });
    }

    /// Resolve `key`, constructing it lazily on first call and reusing the
    /// cached instance afterward.
    pub async fn get<T: Teardown>(&self, key: Key) -> Result<Arc<T>, AcbError> {
        if IN_FLIGHT.try_with(|_| ()).is_ok() {
            self.get_inner::<T>(key).await
        } else {
            IN_FLIGHT
                .scope(RefCell::new(Vec::new()), self.get_inner::<T>(key))
                .await
        }
    }

    async fn get_inner<T: Teardown>(&self, key: Key) -> Result<Arc<T>, AcbError> {
        if let Some(cached) = self.inner.cache.get(&key) {
            return downcast(cached.clone());
        }

        let already_building = IN_FLIGHT.with(|cell| cell.borrow().contains(&key));
        if already_building {
            tracing::warn!(key = %key, "dependency cycle detected during resolution");
            return Err(AcbError::CycleDetected { key: key.to_string() });
        }
        IN_FLIGHT.with(|cell| cell.borrow_mut().push(key));
        let _guard = Guard { key };

        let lock = self
            .inner
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _permit = lock.lock().await;

        if let Some(cached) = self.inner.cache.get(&key) {
            return downcast(cached.clone());
        }

        let factory = self.inner.factories.get(&key).map(|f| f.clone()).ok_or_else(|| {
            tracing::warn!(key = %key, "no binding registered for key");
            AcbError::NoAdapterEnabled {
                category: key.to_string(),
            }
        })?;

        let value = (*factory)().await?;
        self.inner.cache.insert(key, value.clone());
        self.inner.order.lock().unwrap().push(key);

        downcast(value)
    }

    /// Resolve `key` and apply `f` to the resolved instance — the static
    /// approximation of the source's reflective `inject(function)`.
    pub async fn inject1<T, R>(
        &self,
        key: Key,
        f: impl FnOnce(Arc<T>) -> R,
    ) -> Result<R, AcbError>
    where
        T: Teardown,
    {
        let instance = self.get::<T>(key).await?;
        Ok(f(instance))
    }

    /// Tear down all cached instances in reverse insertion order. Errors
    /// from individual cleanups are collected, not propagated — one bad
    /// resource cannot block the rest of the sweep.
    pub async fn teardown(&self) -> Vec<AcbError> {
        let order: Vec<Key> = {
            let mut order = self.inner.order.lock().unwrap();
            std::mem::take(&mut *order)
        };

        let mut errors = Vec::new();
        for key in order.into_iter().rev() {
            let Some((_, value)) = self.inner.cache.remove(&key) else {
                continue;
            };
            if let Some(teardown) = self.inner.teardowns.get(&key).map(|t| t.clone()) {
                if let Err(err) = (*teardown)(value).await {
                    tracing::error!(key = %key, error = %err, "adapter cleanup failed");
                    errors.push(err);
                }
            }
        }
        errors
    }

    /// Test-mode reset (§4.6): discard all cached instances, bindings, and
    /// locks without awaiting cleanup. Callers in application mode should
    /// use `teardown()` instead.
    pub fn reset_for_test(&self) {
        self.inner.factories.clear();
        self.inner.teardowns.clear();
        self.inner.cache.clear();
        self.inner.locks.clear();
        self.inner.order.lock().unwrap().clear();
    }
}

fn downcast<T: Teardown>(any: AnyArc) -> Result<Arc<T>, AcbError> {
    any.downcast::<T>()
        .map_err(|_| AcbError::ConfigInvalid(format!("DI container type mismatch for '{}'", type_name::<T>())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        id: usize,
    }
    impl Teardown for Counter {
        fn teardown(&self) -> BoxFuture<'_, Result<(), AcbError>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn factory_invoked_at_most_once_per_key() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let container = Container::new();
        container.bind::<Counter, _, _>(Key::of::<Counter>(), || async {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Counter { id: 1 }
        });

        let a = container.get::<Counter>(Key::of::<Counter>()).await.unwrap();
        let b = container.get::<Counter>(Key::of::<Counter>()).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn named_bindings_are_independent() {
        let container = Container::new();
        container.bind::<Counter, _, _>(Key::named::<Counter>("primary"), || async { Counter { id: 1 } });
        container.bind::<Counter, _, _>(Key::named::<Counter>("secondary"), || async { Counter { id: 2 } });

        let primary = container.get::<Counter>(Key::named::<Counter>("primary")).await.unwrap();
        let secondary = container.get::<Counter>(Key::named::<Counter>("secondary")).await.unwrap();
        assert_eq!(primary.id, 1);
        assert_eq!(secondary.id, 2);
    }

    #[tokio::test]
    async fn unbound_key_is_no_adapter_enabled() {
        let container = Container::new();
        let err = container.get::<Counter>(Key::of::<Counter>()).await.unwrap_err();
        assert!(matches!(err, AcbError::NoAdapterEnabled { .. }));
    }

    struct Recorder {
        id: &'static str,
        log: Arc<StdMutex<Vec<&'static str>>>,
    }
    impl Teardown for Recorder {
        fn teardown(&self) -> BoxFuture<'_, Result<(), AcbError>> {
            let log = self.log.clone();
            let id = self.id;
            Box::pin(async move {
                log.lock().unwrap().push(id);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn teardown_visits_reverse_insertion_order() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let container = Container::new();

        {
            let log = log.clone();
            container.bind_instance(Key::named::<Recorder>("a"), Recorder { id: "a", log });
        }
        {
            let log = log.clone();
            container.bind_instance(Key::named::<Recorder>("b"), Recorder { id: "b", log });
        }
        {
            let log = log.clone();
            container.bind_instance(Key::named::<Recorder>("c"), Recorder { id: "c", log });
        }

        container.get::<Recorder>(Key::named::<Recorder>("a")).await.unwrap();
        container.get::<Recorder>(Key::named::<Recorder>("b")).await.unwrap();
        container.get::<Recorder>(Key::named::<Recorder>("c")).await.unwrap();

        let errors = container.teardown().await;
        assert!(errors.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
    }

    struct CycleA;
    impl Teardown for CycleA {
        fn teardown(&self) -> BoxFuture<'_, Result<(), AcbError>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn same_task_reentry_is_cycle_detected() {
        let container = Container::new();
        let container_for_factory = container.clone();
        container.bind::<CycleA, _, _>(Key::of::<CycleA>(), move || {
            let container = container_for_factory.clone();
            async move {
                // Re-entering the same key on the same task while the
                // factory is still running must raise CycleDetected.
                let err = container.get::<CycleA>(Key::of::<CycleA>()).await.unwrap_err();
                assert!(matches!(err, AcbError::CycleDetected { .. }));
                CycleA
            }
        });

        container.get::<CycleA>(Key::of::<CycleA>()).await.unwrap();
    }

    #[tokio::test]
    async fn bind_discards_cache_without_cleanup() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let container = Container::new();
        container.bind_instance(
            Key::of::<Recorder>(),
            Recorder { id: "old", log: log.clone() },
        );
        container.get::<Recorder>(Key::of::<Recorder>()).await.unwrap();

        // Re-binding discards the cached instance without invoking cleanup.
        container.bind_instance(
            Key::of::<Recorder>(),
            Recorder { id: "new", log: log.clone() },
        );
        assert!(log.lock().unwrap().is_empty());

        let resolved = container.get::<Recorder>(Key::of::<Recorder>()).await.unwrap();
        assert_eq!(resolved.id, "new");
    }

    #[tokio::test]
    async fn cleanup_errors_are_collected_not_propagated() {
        struct Failing;
        impl Teardown for Failing {
            fn teardown(&self) -> BoxFuture<'_, Result<(), AcbError>> {
                Box::pin(async { Err(AcbError::ConfigInvalid("boom".into())) })
            }
        }

        let container = Container::new();
        container.bind_instance(Key::named::<Failing>("bad"), Failing);
        container.bind_instance(Key::named::<Failing>("good"), Failing);
        container.get::<Failing>(Key::named::<Failing>("bad")).await.unwrap();
        container.get::<Failing>(Key::named::<Failing>("good")).await.unwrap();

        let errors = container.teardown().await;
        assert_eq!(errors.len(), 2);
    }
}
