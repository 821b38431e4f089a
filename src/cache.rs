//! Weak singleton instance cache.
//!
//! A get-or-create table that deduplicates instances by identity while
//! they remain externally referenced. The cache itself never keeps an
//! instance alive: slots hold [`Weak`] references, so an instance is
//! reclaimed exactly when its last external [`Rc`] drops, and the next
//! request for that key builds a fresh one.
//!
//! Caches are plain values, constructed explicitly and passed in by the
//! caller (one per managed type, no ambient global state), which keeps
//! instance lifetime and test isolation explicit.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::{Rc, Weak};

pub struct InstanceCache<K, T> {
  slots: RefCell<HashMap<K, Weak<T>>>,
}

impl<K, T> Default for InstanceCache<K, T> {
  fn default() -> Self { Self { slots: RefCell::new(HashMap::new()) } }
}

impl<K, T> InstanceCache<K, T>
where
  K: Eq + Hash + Clone,
{
  pub fn new() -> Self { Self::default() }

  /// Return the live instance for `key`, or invoke `build` exactly once to
  /// create it. A failing `build` caches nothing.
  ///
  /// Atomic with respect to a single-threaded caller: while any external
  /// strong reference to a previously produced instance exists, every call
  /// for the same key returns that identical instance without invoking
  /// `build`. Dead slots are swept on insertion.
  pub fn get_or_create<E>(
    &self,
    key: K,
    build: impl FnOnce() -> Result<T, E>,
  ) -> Result<Rc<T>, E> {
    let existing = self.slots.borrow().get(&key).and_then(Weak::upgrade);
    if let Some(instance) = existing {
      tracing::debug!("instance cache hit");
      return Ok(instance);
    }

    // Borrow released above: `build` may recursively hit this cache.
    let instance = Rc::new(build()?);
    let mut slots = self.slots.borrow_mut();
    slots.retain(|_, slot| slot.strong_count() > 0);
    slots.insert(key, Rc::downgrade(&instance));
    tracing::debug!(live = slots.len(), "instance cache insert");
    Ok(instance)
  }

  /// Live instance for `key`, if one is currently strongly held elsewhere.
  pub fn get(&self, key: &K) -> Option<Rc<T>> {
    self.slots.borrow().get(key).and_then(Weak::upgrade)
  }

  /// Number of live entries.
  pub fn len(&self) -> usize {
    self
      .slots
      .borrow()
      .values()
      .filter(|slot| slot.strong_count() > 0)
      .count()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
