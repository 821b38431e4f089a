//! Cancellation handles for change streams.
//!
//! A [`Subscription`] is the only cancellation mechanism in the core:
//! calling [`Subscription::unsubscribe`] (or dropping a
//! [`SubscriptionGuard`]) detaches the observer. There is no cancellation
//! token; everything else is reference-based teardown.

use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;

/// Handle returned from `subscribe` that allows deregistering an observer
/// before its source is dropped.
///
/// Cloning yields another handle to the same subscription; unsubscribing
/// through any clone closes all of them. Observer slots are pruned lazily
/// at the next broadcast, so an unsubscribed observer is guaranteed to
/// miss every emission after `unsubscribe` returns.
#[derive(Clone, Default)]
pub struct Subscription(Rc<RefCell<Inner>>);

struct Inner {
  closed: bool,
  teardown: SmallVec<[Box<dyn FnOnce()>; 1]>,
}

impl Default for Inner {
  fn default() -> Self { Inner { closed: false, teardown: SmallVec::new() } }
}

impl Subscription {
  pub fn new() -> Self { Self::default() }

  /// A subscription that is already closed. Useful as a terminal sentinel.
  pub fn closed() -> Self {
    let sub = Self::default();
    sub.0.borrow_mut().closed = true;
    sub
  }

  /// Register a teardown action to run once when this subscription closes.
  /// If the subscription is already closed the action runs immediately.
  pub fn add_teardown(&self, action: impl FnOnce() + 'static) {
    let closed = self.0.borrow().closed;
    if closed {
      action();
    } else {
      self.0.borrow_mut().teardown.push(Box::new(action));
    }
  }

  pub fn unsubscribe(&self) {
    let teardown = {
      let mut inner = self.0.borrow_mut();
      if inner.closed {
        return;
      }
      inner.closed = true;
      std::mem::take(&mut inner.teardown)
    };
    // Run teardowns outside the borrow so they may touch this handle.
    for action in teardown {
      action();
    }
  }

  #[inline]
  pub fn is_closed(&self) -> bool { self.0.borrow().closed }

  /// Activates RAII behavior: `unsubscribe` is called automatically when
  /// the returned guard goes out of scope.
  ///
  /// **Attention:** if you don't assign the return value to a variable the
  /// guard drops immediately, which is probably not what you want.
  pub fn unsubscribe_when_dropped(self) -> SubscriptionGuard { SubscriptionGuard(self) }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("is_closed", &self.is_closed())
      .finish()
  }
}

/// An RAII wrapper that unsubscribes when dropped.
///
/// If you want to drop it immediately, wrap it in its own scope.
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard(Subscription);

impl SubscriptionGuard {
  pub fn new(subscription: Subscription) -> Self { Self(subscription) }
}

impl Drop for SubscriptionGuard {
  #[inline]
  fn drop(&mut self) { self.0.unsubscribe() }
}
