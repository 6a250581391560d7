//! Core systems for Horizon Grid.
//!
//! This crate provides the reactive plumbing the grid engine is built on:
//!
//! - **Signal/Slot System**: Type-safe change notification for host renderers
//! - **Property System**: Interior-mutable values with change detection
//! - **Async Runtime**: Tokio integration with cancellable and detached tasks
//! - **Logging**: Tracing targets for filtering grid subsystems
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_grid_core::Signal;
//!
//! let refresh_requested = Signal::<u64>::new();
//!
//! let conn_id = refresh_requested.connect(|key| {
//!     println!("refresh key is now {}", key);
//! });
//!
//! refresh_requested.emit(1);
//! refresh_requested.disconnect(conn_id);
//! ```
//!
//! # Property Example
//!
//! ```
//! use horizon_grid_core::{Property, Signal};
//!
//! struct Pager {
//!     row_count: Property<usize>,
//!     row_count_changed: Signal<usize>,
//! }
//!
//! impl Pager {
//!     fn grow(&self, by: usize) {
//!         let next = self.row_count.get() + by;
//!         if self.row_count.set(next) {
//!             self.row_count_changed.emit(next);
//!         }
//!     }
//! }
//!
//! let pager = Pager { row_count: Property::new(50), row_count_changed: Signal::new() };
//! pager.grow(50);
//! assert_eq!(pager.row_count.get(), 100);
//! ```

#[cfg(feature = "tokio")]
pub mod async_runtime;
mod error;
pub mod logging;
pub mod property;
pub mod signal;

#[cfg(feature = "tokio")]
pub use async_runtime::{
    AsyncCancellationToken, AsyncRuntime, AsyncRuntimeConfig, AsyncTaskHandle, DetachedTask,
};
pub use error::{AsyncRuntimeError, Result};
pub use logging::PerfSpan;
pub use property::Property;
pub use signal::{ConnectionId, Signal};
