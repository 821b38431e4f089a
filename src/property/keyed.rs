//! Keyed-container projection.
//!
//! Derives a child property over the entry at a fixed key inside a
//! container reachable from the parent value. Unlike field projection the
//! mapped value may become absent when its key disappears mid-session,
//! which this source models explicitly instead of crashing or silently
//! losing updates.
//!
//! Disappearance semantics (the hard-failure variant, chosen
//! deliberately):
//!
//! - `get` keeps returning the last value seen and never fails;
//! - `set` fails with [`NotFoundError`] while the key is absent, and
//!   succeeds again if the key reappears; there is no local replay of
//!   writes made in between, the container owner stays authoritative;
//! - the change stream terminates with [`NotFoundError`] the moment a
//!   parent change drops the key, and stays terminated even if the key
//!   comes back.

use super::{Property, PropertySource};
use crate::error::{BindError, NotFoundError, ValidationError};
use crate::observer::{BoxedObserver, ChangeObserver};
use crate::subscription::Subscription;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

struct KeyedSource<T, K, U> {
  parent: Property<T>,
  key: Rc<K>,
  entry: Rc<dyn Fn(&T, &K) -> Option<U>>,
  store: Rc<dyn Fn(T, &K, U) -> Option<T>>,
  /// Last value observed for the key, served by `get` while absent.
  last: Rc<RefCell<U>>,
}

impl<T, K, U> PropertySource<U> for KeyedSource<T, K, U>
where
  T: Clone + PartialEq + 'static,
  K: Debug + 'static,
  U: Clone + PartialEq + 'static,
{
  fn get(&self) -> U {
    match (self.entry)(&self.parent.get(), &self.key) {
      Some(live) => {
        *self.last.borrow_mut() = live.clone();
        live
      }
      None => self.last.borrow().clone(),
    }
  }

  fn validate(&self, value: &U) -> Result<(), ValidationError> {
    // While the key is absent no parent value can be constructed to
    // check; the subsequent write fails with NotFound regardless.
    match (self.store)(self.parent.get(), &self.key, value.clone()) {
      Some(updated) => self.parent.validate(&updated),
      None => Ok(()),
    }
  }

  fn set(&self, value: U) -> Result<(), BindError> {
    match (self.store)(self.parent.get(), &self.key, value.clone()) {
      Some(updated) => {
        self.parent.set(updated)?;
        // The container accepted the value; it is now the last seen.
        *self.last.borrow_mut() = value;
        Ok(())
      }
      None => Err(NotFoundError::new(&*self.key).into()),
    }
  }

  fn observe(&self, observer: BoxedObserver<U>) -> Subscription {
    self.parent.observe(Box::new(KeyedObserver {
      key: self.key.clone(),
      entry: self.entry.clone(),
      seen: self.get(),
      last: self.last.clone(),
      inner: observer,
      done: false,
    }))
  }
}

pub(super) fn derive<T, K, U>(
  parent: Property<T>,
  key: K,
  entry: impl Fn(&T, &K) -> Option<U> + 'static,
  store: impl Fn(T, &K, U) -> Option<T> + 'static,
) -> Result<Property<U>, NotFoundError>
where
  T: Clone + PartialEq + 'static,
  K: Debug + 'static,
  U: Clone + PartialEq + 'static,
{
  // Require the key at construction time so the child always has a safe
  // last-known value.
  let initial = entry(&parent.get(), &key).ok_or_else(|| NotFoundError::new(&key))?;
  Ok(Property::from_source(Rc::new(KeyedSource {
    parent,
    key: Rc::new(key),
    entry: Rc::new(entry),
    store: Rc::new(store),
    last: Rc::new(RefCell::new(initial)),
  })))
}

/// Filters parent changes down to one key's projected value, deduplicated,
/// and terminates the stream when the key disappears.
struct KeyedObserver<T, K, U> {
  key: Rc<K>,
  entry: Rc<dyn Fn(&T, &K) -> Option<U>>,
  seen: U,
  last: Rc<RefCell<U>>,
  inner: BoxedObserver<U>,
  done: bool,
}

impl<T, K, U> ChangeObserver<T> for KeyedObserver<T, K, U>
where
  K: Debug,
  U: Clone + PartialEq,
{
  fn next(&mut self, value: T) {
    match (self.entry)(&value, &self.key) {
      Some(live) => {
        if live != self.seen {
          self.seen = live.clone();
          *self.last.borrow_mut() = live.clone();
          self.inner.next(live);
        }
      }
      None => {
        self.done = true;
        self.inner.error(NotFoundError::new(&*self.key));
      }
    }
  }

  fn error(&mut self, err: NotFoundError) {
    self.done = true;
    self.inner.error(err);
  }

  #[inline]
  fn is_closed(&self) -> bool { self.done || self.inner.is_closed() }
}
