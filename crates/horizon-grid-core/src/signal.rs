//! Signal/slot system for Horizon Grid.
//!
//! Signals are how grid state tells the host renderer that something changed.
//! A [`Signal<Args>`] owns a set of connected slots (closures); emitting the
//! signal invokes every slot with a reference to the arguments.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The signal type for emitting notifications
//! - [`ConnectionId`] - Identifier returned when connecting a slot
//!
//! # Re-entrancy
//!
//! Slots are snapshotted before they are invoked, so a slot may connect,
//! disconnect, or emit on the same signal without deadlocking. Connections
//! made during an emission take effect from the next emission.
//!
//! # Example
//!
//! ```
//! use horizon_grid_core::Signal;
//!
//! let sort_changed = Signal::<(Option<usize>, bool)>::new();
//!
//! let conn_id = sort_changed.connect(|(column, ascending)| {
//!     println!("sorting by {:?}, ascending = {}", column, ascending);
//! });
//!
//! sort_changed.emit((Some(2), true));
//! sort_changed.disconnect(conn_id);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// The ID remains valid until the connection is explicitly disconnected
    /// or the signal is dropped.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple for multiple arguments.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync`. Slots run on the emitting thread.
pub struct Signal<Args> {
    slots: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Emit the signal, invoking all connected slots in connection order.
    #[tracing::instrument(skip_all, target = "horizon_grid_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        let slots: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for slot in slots {
            slot(&args);
        }
    }
}

impl<Args> fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.slots.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_signal_connect_emit() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(42);
        signal.emit(100);

        assert_eq!(*received.lock(), vec![42, 100]);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        let conn_id = signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(1);
        assert!(signal.disconnect(conn_id));
        assert!(!signal.disconnect(conn_id));
        signal.emit(2);

        assert_eq!(*received.lock(), vec![1]);
    }

    #[test]
    fn test_reentrant_emit_does_not_deadlock() {
        let signal = Arc::new(Signal::<u32>::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner = signal.clone();
        let hits_clone = hits.clone();
        signal.connect(move |&depth| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            if depth < 2 {
                inner.emit(depth + 1);
            }
        });

        signal.emit(0);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_connect_during_emit_applies_next_time() {
        let signal = Arc::new(Signal::<()>::new());
        let late_hits = Arc::new(AtomicUsize::new(0));

        let inner = signal.clone();
        let late = late_hits.clone();
        let once = AtomicBool::new(false);
        signal.connect(move |_| {
            if !once.swap(true, Ordering::SeqCst) {
                let late = late.clone();
                inner.connect(move |_| {
                    late.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        signal.emit(());
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        signal.emit(());
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_from_multiple_threads() {
        let signal = Arc::new(Signal::<usize>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = counter.clone();
        signal.connect(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let signal = signal.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        signal.emit(i);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 400);
    }
}
