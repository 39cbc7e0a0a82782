//! The adapter lifecycle scaffold (§4.5): lazy client construction, a
//! secondary resource cache, idempotent cleanup, and the async
//! context-manager protocol.
//!
//! Grounded on the teacher crate's `Bean`/`AsyncBean` lifecycle (a
//! construct-once, close-once object with a per-instance lock) and on
//! spec.md §4.5's `AdapterBase` description (`_ensure_client`,
//! `_ensure_resource`, `cleanup`, `__aenter__`/`__aexit__`), adapted to
//! Rust's lack of dynamic attribute probing: every resource the base
//! tracks must say how to close itself via the `Closeable` trait.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::error::AcbError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type AnyArc = Arc<dyn Any + Send + Sync>;
type CloserFn = Arc<dyn Fn(AnyArc) -> BoxFuture<'static, Result<(), AcbError>> + Send + Sync>;

/// Implemented by anything an [`AdapterBase`] can hold as a primary client
/// or secondary resource, so the base knows how to shut it down without
/// probing for a close method at runtime.
pub trait Closeable: Send + Sync + 'static {
    fn close(&self) -> BoxFuture<'_, Result<(), AcbError>>;
}

struct Resource {
    name: String,
    value: AnyArc,
    closer: CloserFn,
}

/// Lifecycle scaffold shared by every concrete adapter. `C` is the
/// adapter's primary client type.
pub struct AdapterBase<C: Closeable> {
    client: AsyncMutex<Option<Arc<C>>>,
    resources: AsyncMutex<Vec<Resource>>,
    cleaned: AtomicBool,
}

impl<C: Closeable> Default for AdapterBase<C> {
    fn default() -> Self {
        Self {
            client: AsyncMutex::new(None),
            resources: AsyncMutex::new(Vec::new()),
            cleaned: AtomicBool::new(false),
        }
    }
}

impl<C: Closeable> AdapterBase<C> {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_not_cleaned(&self) -> Result<(), AcbError> {
        if self.cleaned.load(Ordering::SeqCst) {
            Err(AcbError::AlreadyCleanedUp)
        } else {
            Ok(())
        }
    }

    /// Return the primary client, constructing it via `create` on first
    /// call. Concurrent first calls serialize behind this instance's lock.
    pub async fn ensure_client<F, Fut>(&self, create: F) -> Result<Arc<C>, AcbError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, AcbError>>,
    {
        self.check_not_cleaned()?;
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = Arc::new(create().await?);
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Return a named secondary resource, constructing it via `create` on
    /// first call for that name. Resources are closed in insertion order
    /// (reversed) during `cleanup`, before the primary client.
    pub async fn ensure_resource<R, F, Fut>(&self, name: &str, create: F) -> Result<Arc<R>, AcbError>
    where
        R: Closeable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, AcbError>>,
    {
        self.check_not_cleaned()?;
        let mut resources = self.resources.lock().await;
        if let Some(existing) = resources.iter().find(|r| r.name == name) {
            if let Ok(value) = existing.value.clone().downcast::<R>() {
                return Ok(value);
            }
        }

        let value: Arc<R> = Arc::new(create().await?);
        let closer: CloserFn = Arc::new(|any: AnyArc| {
            Box::pin(async move {
                match any.downcast::<R>() {
                    Ok(resource) => resource.close().await,
                    Err(_) => Ok(()),
                }
            })
        });
        resources.push(Resource {
            name: name.to_string(),
            value: value.clone(),
            closer,
        });
        Ok(value)
    }

    /// Idempotent cleanup: the first call closes every cached resource
    /// (most-recently-created first) then the primary client; later calls
    /// are no-ops. Individual close failures are logged and do not stop
    /// the sweep.
    pub async fn cleanup(&self) -> Result<(), AcbError> {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let resources = {
            let mut guard = self.resources.lock().await;
            std::mem::take(&mut *guard)
        };
        for resource in resources.into_iter().rev() {
            if let Err(err) = (*resource.closer)(resource.value).await {
                tracing::error!(resource = %resource.name, error = %err, "resource close failed");
            }
        }

        let client = {
            let mut guard = self.client.lock().await;
            guard.take()
        };
        if let Some(client) = client {
            if let Err(err) = client.close().await {
                tracing::error!(error = %err, "client close failed");
            }
        }

        Ok(())
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned.load(Ordering::SeqCst)
    }

    /// Enter the async context-manager protocol: wraps `self` in a guard
    /// whose drop spawns `cleanup()` if `close()` wasn't called explicitly.
    pub fn enter(self: &Arc<Self>) -> AdapterGuard<C> {
        AdapterGuard {
            base: self.clone(),
            closed: false,
        }
    }
}

/// RAII approximation of an async context manager. Prefer calling
/// `close()` explicitly; the `Drop` impl is a best-effort fallback that
/// spawns cleanup onto the current Tokio runtime, mirroring what a
/// garbage-collected `async with` block does when a caller forgets to
/// exit it cleanly.
pub struct AdapterGuard<C: Closeable> {
    base: Arc<AdapterBase<C>>,
    closed: bool,
}

impl<C: Closeable> AdapterGuard<C> {
    pub async fn close(mut self) -> Result<(), AcbError> {
        self.closed = true;
        self.base.cleanup().await
    }
}

impl<C: Closeable> std::ops::Deref for AdapterGuard<C> {
    type Target = AdapterBase<C>;
    fn deref(&self) -> &AdapterBase<C> {
        &self.base
    }
}

impl<C: Closeable> Drop for AdapterGuard<C> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let base = self.base.clone();
        tokio::spawn(async move {
            if let Err(err) = base.cleanup().await {
                tracing::error!(error = %err, "adapter cleanup on drop failed");
            }
        });
    }
}

/// A concrete adapter built on top of [`AdapterBase`]. `init` runs once,
/// after construction and before the instance is handed to the caller;
/// the default implementation is a no-op.
pub trait Adapter: Send + Sync + 'static {
    type Client: Closeable;

    fn base(&self) -> &AdapterBase<Self::Client>;

    fn init(&self) -> impl Future<Output = Result<(), AcbError>> + Send {
        async { Ok(()) }
    }
}
