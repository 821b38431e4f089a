//! Observable properties.
//!
//! A [`Property<T>`] is a value slot with synchronous read, explicit
//! validation, validated write, and a deduplicated push stream of its
//! changes. The handle is cheap to clone (`Rc` inside) and type-erases the
//! concrete source behind [`PropertySource`], of which three exist: the
//! root store ([`property::root`]), field projection and keyed-container
//! projection (the derivation combinators [`Property::field`] and
//! [`Property::keyed`]).
//!
//! # Contract
//!
//! - `get` is synchronous and side-effect-free.
//! - `set` is a no-op for a value equal to the current one; it does **not**
//!   run validation. `validate` is a separate step the caller invokes
//!   first, and writing a value that failed validation is the caller's
//!   responsibility.
//! - The change stream emits only values that differ from the immediately
//!   preceding one and never replays the current value on subscribe.
//! - Notifications are delivered synchronously, before the triggering
//!   `set` returns. A write issued from inside a callback is queued and
//!   delivered once the in-progress value has reached every observer, so
//!   no emission is lost; single-threaded discipline is assumed
//!   throughout.
//!
//! [`property::root`]: crate::property::root

pub mod field;
pub mod keyed;
pub mod root;

use crate::error::{BindError, NotFoundError, ValidationError};
use crate::observer::{BoxedObserver, FnErrObserver, FnObserver};
use crate::subscription::Subscription;
use std::fmt::Debug;
use std::rc::Rc;

/// Backing implementation of a [`Property`].
///
/// Object-safe so the handle can erase the source kind. Implementations
/// own their backing storage privately: a root store owns the value, a
/// derived source owns a handle to its parent. Sources never hold strong
/// references to anything downstream of themselves.
pub trait PropertySource<T> {
  /// Current value. Always succeeds; a keyed source falls back to the
  /// last value seen while its key is absent.
  fn get(&self) -> T;

  /// Pure check of a proposed value. Independent of [`set`](Self::set).
  ///
  /// A keyed source whose key is currently absent has no parent value to
  /// check against and returns `Ok(())` vacuously; the write itself still
  /// fails with [`BindError::NotFound`].
  fn validate(&self, value: &T) -> Result<(), ValidationError>;

  /// Store a new value and broadcast it if it differs from the current
  /// one. Fails with [`BindError::NotFound`] only for a keyed source
  /// whose key is absent.
  fn set(&self, value: T) -> Result<(), BindError>;

  /// Attach an observer to the change stream.
  fn observe(&self, observer: BoxedObserver<T>) -> Subscription;
}

/// Handle to an observable property.
///
/// Clones share the same underlying source. Dropping the last handle (and
/// every subscription into it) releases the source; a derived property
/// keeps its parent alive, never the other way around.
pub struct Property<T> {
  source: Rc<dyn PropertySource<T>>,
}

impl<T> Clone for Property<T> {
  #[inline]
  fn clone(&self) -> Self { Self { source: self.source.clone() } }
}

impl<T> Property<T>
where
  T: Clone + PartialEq + 'static,
{
  /// Wrap a custom source. The built-in constructors and combinators
  /// cover the common cases; this is the escape hatch.
  pub fn from_source(source: Rc<dyn PropertySource<T>>) -> Self { Self { source } }

  #[inline]
  pub fn get(&self) -> T { self.source.get() }

  #[inline]
  pub fn validate(&self, value: &T) -> Result<(), ValidationError> {
    self.source.validate(value)
  }

  #[inline]
  pub fn set(&self, value: T) -> Result<(), BindError> { self.source.set(value) }

  /// Attach a boxed observer. Most callers want [`subscribe`] or
  /// [`subscribe_err`] instead.
  ///
  /// [`subscribe`]: Property::subscribe
  /// [`subscribe_err`]: Property::subscribe_err
  #[inline]
  pub fn observe(&self, observer: BoxedObserver<T>) -> Subscription {
    self.source.observe(observer)
  }

  /// Subscribe to distinct value changes. The current value is not
  /// replayed. Stream errors (keyed sources only) close the subscription
  /// silently; use [`subscribe_err`](Property::subscribe_err) to observe
  /// them.
  pub fn subscribe(&self, on_change: impl FnMut(T) + 'static) -> Subscription {
    self.observe(Box::new(FnObserver::new(on_change)))
  }

  /// Subscribe with an error handler for keyed-stream termination.
  pub fn subscribe_err(
    &self,
    on_change: impl FnMut(T) + 'static,
    on_err: impl FnMut(NotFoundError) + 'static,
  ) -> Subscription {
    self.observe(Box::new(FnErrObserver::new(on_change, on_err)))
  }

  /// Field projection: derive a child property whose value is a pure
  /// function of this one, with `merge` producing the updated parent
  /// value on a child write (read-modify-write, not a patch).
  ///
  /// The child stream re-applies a dedup filter seeded with the child's
  /// value at subscribe time, because two distinct parent values may
  /// project to the same child value.
  pub fn field<U>(
    &self,
    project: impl Fn(&T) -> U + 'static,
    merge: impl Fn(T, U) -> T + 'static,
  ) -> Property<U>
  where
    U: Clone + PartialEq + 'static,
  {
    field::derive(self.clone(), project, merge)
  }

  /// Keyed-container projection: derive a child property over the entry
  /// at `key` inside a container reachable from this value. `entry` looks
  /// the value up, `store` writes it back, both returning `None` when the
  /// key is absent.
  ///
  /// Fails with [`NotFoundError`] if the key is absent right now, which
  /// guarantees the child always has a safe last-known value. While the
  /// key is absent later, `get` returns the last value seen, `set` fails
  /// with [`NotFoundError`], and the change stream terminates with the
  /// same error. Note that `validate` is vacuous while the key is absent:
  /// it returns `Ok(())` because no merged parent value exists to check,
  /// so a validated write can still fail with [`NotFoundError`].
  pub fn keyed<K, U>(
    &self,
    key: K,
    entry: impl Fn(&T, &K) -> Option<U> + 'static,
    store: impl Fn(T, &K, U) -> Option<T> + 'static,
  ) -> Result<Property<U>, NotFoundError>
  where
    K: Debug + 'static,
    U: Clone + PartialEq + 'static,
  {
    keyed::derive(self.clone(), key, entry, store)
  }
}

impl<T> Debug for Property<T>
where
  T: Clone + PartialEq + Debug + 'static,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Property").field("value", &self.get()).finish()
  }
}
