//! Shared, string-keyed, heterogeneously typed context.
//!
//! Handlers read and write named values of arbitrary type through a
//! [`Context`]. Every lookup names the type it expects and is checked; a
//! key holding some other type is reported as
//! [`ContextError::TypeMismatch`].
//!
//! # Ownership
//!
//! The context owns everything inserted into it. To keep a window into data
//! the caller also holds, insert a shared handle (`Arc<T>` or
//! `Arc<Mutex<T>>`) and keep a clone.
//!
//! # Locking
//!
//! The key map sits behind one `RwLock`, and each value behind its own
//! `Mutex`. Handlers in the same fan-out may work on different keys without
//! waiting on each other. Accessor closures must not touch the key they
//! were handed: the per-value lock is not reentrant.
//!
//! # Example
//!
//! ```rust
//! use switchyard::context::{Context, ContextError};
//!
//! let ctx = Context::new();
//! assert!(ctx.insert("count", 0_i32));
//! assert!(!ctx.insert("count", 99_i32)); // first insertion wins
//!
//! ctx.update("count", |count: &mut i32| *count += 1).unwrap();
//! assert_eq!(ctx.get::<i32>("count"), Ok(1));
//!
//! assert!(matches!(
//!     ctx.get::<String>("count"),
//!     Err(ContextError::TypeMismatch { .. })
//! ));
//! ```

mod error;

pub use error::ContextError;

use parking_lot::{Mutex, RwLock};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type Slot = Arc<Mutex<Box<dyn Any + Send>>>;

/// Left in a slot whose value was taken, for handles cloned before removal.
struct Vacant;

fn not_found(key: &str) -> ContextError {
    ContextError::NotFound {
        key: key.to_string(),
    }
}

#[derive(Clone)]
struct Entry {
    type_name: &'static str,
    slot: Slot,
}

impl Entry {
    fn new<T: Any + Send>(value: T) -> Self {
        Self {
            type_name: type_name::<T>(),
            slot: Arc::new(Mutex::new(Box::new(value))),
        }
    }

    fn mismatch<T>(&self, key: &str) -> ContextError {
        ContextError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
            found: self.type_name,
        }
    }

    fn read<T, R, F>(&self, key: &str, f: F) -> Result<R, ContextError>
    where
        T: Any,
        F: FnOnce(&T) -> R,
    {
        let guard = self.slot.lock();
        if (**guard).is::<Vacant>() {
            return Err(not_found(key));
        }
        let value = (**guard)
            .downcast_ref::<T>()
            .ok_or_else(|| self.mismatch::<T>(key))?;
        Ok(f(value))
    }

    fn write<T, R, F>(&self, key: &str, f: F) -> Result<R, ContextError>
    where
        T: Any,
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.slot.lock();
        if (**guard).is::<Vacant>() {
            return Err(not_found(key));
        }
        let value = (**guard)
            .downcast_mut::<T>()
            .ok_or_else(|| self.mismatch::<T>(key))?;
        Ok(f(value))
    }
}

/// Thread-safe registry of named values.
#[derive(Default)]
pub struct Context {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `value`.
    ///
    /// The first insertion under a key wins: if the key is already bound
    /// this is a no-op and returns `false`. Use [`Context::replace`] or
    /// [`Context::update`] to change a bound value.
    pub fn insert<T: Any + Send>(&self, key: impl Into<String>, value: T) -> bool {
        let key = key.into();
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            debug!(key = %key, "context key already bound, keeping first value");
            return false;
        }
        entries.insert(key, Entry::new(value));
        true
    }

    fn entry(&self, key: &str) -> Result<Entry, ContextError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| not_found(key))
    }

    /// Run `f` against the value at `key`.
    pub fn with<T, R, F>(&self, key: &str, f: F) -> Result<R, ContextError>
    where
        T: Any,
        F: FnOnce(&T) -> R,
    {
        self.entry(key)?.read(key, f)
    }

    /// Run `f` against a mutable reference to the value at `key`.
    pub fn with_mut<T, R, F>(&self, key: &str, f: F) -> Result<R, ContextError>
    where
        T: Any,
        F: FnOnce(&mut T) -> R,
    {
        self.entry(key)?.write(key, f)
    }

    /// Clone the value out of `key`.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Result<T, ContextError> {
        self.with(key, |value: &T| value.clone())
    }

    /// Mutate the value at `key` in place.
    pub fn update<T, F>(&self, key: &str, f: F) -> Result<(), ContextError>
    where
        T: Any,
        F: FnOnce(&mut T),
    {
        self.with_mut(key, f)
    }

    /// Swap in a new value of the bound type, returning the previous one.
    pub fn replace<T: Any>(&self, key: &str, value: T) -> Result<T, ContextError> {
        self.with_mut(key, |slot: &mut T| std::mem::replace(slot, value))
    }

    /// Remove `key` and hand its value back to the caller.
    ///
    /// The key is left in place if it holds another type.
    pub fn take<T: Any + Send>(&self, key: &str) -> Result<T, ContextError> {
        let entry = self.entry(key)?;
        let mut guard = entry.slot.lock();
        if (**guard).is::<Vacant>() {
            return Err(not_found(key));
        }
        if !(**guard).is::<T>() {
            return Err(entry.mismatch::<T>(key));
        }

        {
            let mut entries = self.entries.write();
            if entries
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(&current.slot, &entry.slot))
            {
                entries.remove(key);
            }
        }

        let emptied: Box<dyn Any + Send> = Box::new(Vacant);
        let value = std::mem::replace(&mut *guard, emptied);
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| entry.mismatch::<T>(key))
    }

    /// Remove `key`, returning whether it was bound.
    ///
    /// A removed key may later be bound again, to any type.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Type name of the value bound at `key`.
    pub fn type_of(&self, key: &str) -> Option<&'static str> {
        self.entries.read().get(key).map(|entry| entry.type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Bound keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        let mut map: Vec<(&str, &str)> = entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.type_name))
            .collect();
        map.sort();
        f.debug_map().entries(map).finish()
    }
}
