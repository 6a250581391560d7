//! Property system for Horizon Grid.
//!
//! A [`Property<T>`] wraps a value behind a `parking_lot::RwLock` and reports
//! whether a write actually changed it. Grid state is built from properties
//! paired with [`Signal`](crate::Signal)s: the owner writes the property and
//! emits the signal only when `set()` returns `true`.
//!
//! Properties are cheap to share: wrap one in an `Arc` when a task needs to
//! outlive the struct that created it.

use std::fmt;

use parking_lot::RwLock;

/// A reactive value that tracks changes.
///
/// # Example
///
/// ```
/// use horizon_grid_core::Property;
///
/// let prop = Property::new(42);
/// assert!(!prop.set(42));
/// assert!(prop.set(100));
/// assert_eq!(prop.get(), 100);
/// ```
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Mutate the value in place.
    ///
    /// No change detection is performed; the caller decides whether to notify.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        f(&mut self.value.write())
    }
}

impl<T: Clone> Property<T> {
    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }
}

impl<T: PartialEq> Property<T> {
    /// Set the value, returning `true` if the value changed.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }
}

impl<T: Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.value.read())
            .finish()
    }
}
