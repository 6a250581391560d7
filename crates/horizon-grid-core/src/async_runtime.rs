//! Async runtime integration for Horizon Grid.
//!
//! This module wraps a Tokio runtime (or a handle to one the host already
//! runs) and provides the three kinds of background work the grid needs:
//!
//! - **Plain tasks** via [`AsyncRuntime::spawn`], awaited through an
//!   [`AsyncTaskHandle`].
//! - **Cancellable tasks** via [`AsyncRuntime::spawn_cancellable`]. Cancelling
//!   the token resolves the task immediately and its handle yields `None`.
//! - **Detached delayed tasks** via [`AsyncRuntime::spawn_after`]. The returned
//!   [`DetachedTask`] can cancel the work, but dropping it does not: the task
//!   outlives whatever scheduled it.
//!
//! # Feature Flag
//!
//! This module requires the `tokio` feature (enabled by default).
//!
//! # Example
//!
//! ```no_run
//! use horizon_grid_core::async_runtime::{AsyncRuntime, AsyncRuntimeConfig};
//! use std::time::Duration;
//!
//! let runtime = AsyncRuntime::new(AsyncRuntimeConfig::default().with_worker_threads(2)).unwrap();
//!
//! let handle = runtime.spawn(async { 40 + 2 });
//! assert_eq!(runtime.handle().block_on(handle.wait()), Some(42));
//!
//! // Runs after two seconds even if `_task` is dropped right away.
//! let _task = runtime.spawn_after(Duration::from_secs(2), || println!("dismissed"));
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{Notify, oneshot};

use crate::error::{AsyncRuntimeError, Result};
use crate::logging::targets;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> u64 {
    NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Configuration for a runtime owned by the grid host.
#[derive(Debug, Clone)]
pub struct AsyncRuntimeConfig {
    /// Worker threads for the multi-threaded runtime. Defaults to CPU count.
    pub worker_threads: Option<usize>,
    /// Name prefix for runtime threads.
    pub thread_name: String,
}

impl Default for AsyncRuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "horizon-grid".to_string(),
        }
    }
}

impl AsyncRuntimeConfig {
    /// Set the number of worker threads.
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    /// Set the thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Decrements the runtime's active task count when a task ends, however it ends.
struct ActiveTaskGuard(Arc<AtomicU64>);

impl ActiveTaskGuard {
    fn enter(counter: &Arc<AtomicU64>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter.clone())
    }
}

impl Drop for ActiveTaskGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A handle to a spawned async task.
#[derive(Debug)]
pub struct AsyncTaskHandle<T> {
    id: u64,
    receiver: oneshot::Receiver<T>,
}

impl<T> AsyncTaskHandle<T> {
    /// Get the unique task ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Await the task's result.
    ///
    /// Returns `None` if the task was cancelled or panicked. Cancellation goes
    /// through the token returned by [`AsyncRuntime::spawn_cancellable`].
    pub async fn wait(self) -> Option<T> {
        self.receiver.await.ok()
    }
}

/// A cancellation token for async tasks.
///
/// Supports both polling via [`is_cancelled`](Self::is_cancelled) and async
/// waiting via [`cancelled`](Self::cancelled).
#[derive(Debug, Clone)]
pub struct AsyncCancellationToken {
    inner: Arc<CancellationState>,
}

#[derive(Debug)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl AsyncCancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation and wake every waiter.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Wait until cancellation is requested.
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for AsyncCancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A delayed task that keeps running after its creator is gone.
///
/// Dropping a `DetachedTask` does not cancel it. Call [`cancel`](Self::cancel)
/// to stop it explicitly.
#[derive(Debug, Clone)]
pub struct DetachedTask {
    id: u64,
    token: AsyncCancellationToken,
}

impl DetachedTask {
    /// Get the unique task ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the task before it fires. Has no effect once it has run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// The async runtime manager.
///
/// Either owns a Tokio runtime or borrows the host's through a [`Handle`].
pub struct AsyncRuntime {
    // Kept alive so the owned runtime does not shut down.
    _runtime: Option<Runtime>,
    handle: Handle,
    active_tasks: Arc<AtomicU64>,
}

impl AsyncRuntime {
    /// Create a new multi-threaded runtime with the given configuration.
    pub fn new(config: AsyncRuntimeConfig) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name(&config.thread_name).enable_all();
        if let Some(workers) = config.worker_threads {
            builder.worker_threads(workers);
        }

        let runtime = builder
            .build()
            .map_err(|e| AsyncRuntimeError::CreationFailed(e.to_string()))?;
        let handle = runtime.handle().clone();

        Ok(Self {
            _runtime: Some(runtime),
            handle,
            active_tasks: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Wrap a handle to a runtime the host already drives.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            _runtime: None,
            handle,
            active_tasks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wrap the runtime the calling thread is currently inside.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|_| AsyncRuntimeError::NoCurrentRuntime)
    }

    /// Get the number of tasks that have been spawned and not yet finished.
    pub fn active_tasks(&self) -> u64 {
        self.active_tasks.load(Ordering::Acquire)
    }

    /// Get a handle to the underlying Tokio runtime.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawn an async task on the runtime.
    pub fn spawn<F, T>(&self, future: F) -> AsyncTaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = next_task_id();
        let (sender, receiver) = oneshot::channel();
        let guard = ActiveTaskGuard::enter(&self.active_tasks);

        self.handle.spawn(async move {
            let _guard = guard;
            let _ = sender.send(future.await);
        });

        AsyncTaskHandle { id, receiver }
    }

    /// Spawn an async task with a cancellation token.
    ///
    /// The future is raced against the token: once the token is cancelled the
    /// future is dropped at its next suspension point and the handle yields
    /// `None`. The task also receives a clone of the token for cooperative
    /// checks between awaits.
    pub fn spawn_cancellable<F, Fut, T>(&self, f: F) -> (AsyncTaskHandle<T>, AsyncCancellationToken)
    where
        F: FnOnce(AsyncCancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let token = AsyncCancellationToken::new();
        let race_token = token.clone();
        let task_token = token.clone();

        let id = next_task_id();
        let (sender, receiver) = oneshot::channel();
        let guard = ActiveTaskGuard::enter(&self.active_tasks);

        self.handle.spawn(async move {
            let _guard = guard;
            let future = f(task_token);
            tokio::select! {
                biased;
                _ = race_token.cancelled() => {
                    tracing::trace!(target: targets::RUNTIME, task_id = id, "task cancelled");
                }
                result = future => {
                    let _ = sender.send(result);
                }
            }
        });

        (AsyncTaskHandle { id, receiver }, token)
    }

    /// Run `task` once after `delay`, independently of the caller's lifetime.
    ///
    /// The returned [`DetachedTask`] may cancel the work; dropping it does not.
    pub fn spawn_after<F>(&self, delay: Duration, task: F) -> DetachedTask
    where
        F: FnOnce() + Send + 'static,
    {
        let id = next_task_id();
        let token = AsyncCancellationToken::new();
        let task_token = token.clone();
        let guard = ActiveTaskGuard::enter(&self.active_tasks);

        self.handle.spawn(async move {
            let _guard = guard;
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    tracing::trace!(target: targets::RUNTIME, task_id = id, "detached task cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    tracing::trace!(target: targets::RUNTIME, task_id = id, "detached task fired");
                    task();
                }
            }
        });

        DetachedTask { id, token }
    }
}

impl fmt::Debug for AsyncRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRuntime")
            .field("owned", &self._runtime.is_some())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}
