//! Change-stream consumers.
//!
//! [`ChangeObserver`] is the consumer side of a property's change stream.
//! It is object-safe so sources can hold heterogeneous observers behind
//! `Box<dyn ChangeObserver<T>>`; closures are adapted through
//! [`FnObserver`] and [`FnErrObserver`].

use crate::error::NotFoundError;
use crate::subscription::Subscription;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Consumer of a property's change stream.
///
/// `next` delivers a distinct new value. `error` is terminal and only ever
/// carries a [`NotFoundError`] from a keyed-derived stream whose key
/// disappeared; root and field-derived streams never call it. After
/// `error`, or once `is_closed` returns `true`, the source drops the
/// observer at its next broadcast.
pub trait ChangeObserver<T> {
  fn next(&mut self, value: T);

  fn error(&mut self, err: NotFoundError);

  /// Whether this observer will accept no further values.
  fn is_closed(&self) -> bool;
}

/// Boxed observer stored by sources.
pub type BoxedObserver<T> = Box<dyn ChangeObserver<T>>;

/// Closure adapter: the closure becomes the `next` handler, stream errors
/// close the observer silently.
pub struct FnObserver<F> {
  f: F,
  done: bool,
}

impl<F> FnObserver<F> {
  pub fn new(f: F) -> Self { Self { f, done: false } }
}

impl<T, F> ChangeObserver<T> for FnObserver<F>
where
  F: FnMut(T),
{
  #[inline]
  fn next(&mut self, value: T) { (self.f)(value); }

  fn error(&mut self, _err: NotFoundError) { self.done = true; }

  #[inline]
  fn is_closed(&self) -> bool { self.done }
}

/// Closure adapter with an error handler for keyed streams.
pub struct FnErrObserver<F, E> {
  f: F,
  on_err: E,
  done: bool,
}

impl<F, E> FnErrObserver<F, E> {
  pub fn new(f: F, on_err: E) -> Self { Self { f, on_err, done: false } }
}

impl<T, F, E> ChangeObserver<T> for FnErrObserver<F, E>
where
  F: FnMut(T),
  E: FnMut(NotFoundError),
{
  #[inline]
  fn next(&mut self, value: T) { (self.f)(value); }

  fn error(&mut self, err: NotFoundError) {
    self.done = true;
    (self.on_err)(err);
  }

  #[inline]
  fn is_closed(&self) -> bool { self.done }
}

// ============================================================================
// Subscriber list
// ============================================================================

struct Entry<T> {
  sub: Subscription,
  observer: BoxedObserver<T>,
}

/// Multicast list of boxed observers, shared behind `Rc<RefCell<..>>` by
/// whichever source owns it.
pub(crate) struct Subscribers<T> {
  entries: SmallVec<[Entry<T>; 1]>,
  /// Set while a broadcast frame is delivering; re-entrant values queue up
  /// in `pending` instead of racing the moved-out entry list.
  delivering: bool,
  pending: VecDeque<T>,
}

impl<T> Default for Subscribers<T> {
  fn default() -> Self {
    Self {
      entries: SmallVec::new(),
      delivering: false,
      pending: VecDeque::new(),
    }
  }
}

impl<T> Subscribers<T> {
  pub(crate) fn add(&mut self, observer: BoxedObserver<T>) -> Subscription {
    let sub = Subscription::new();
    self.entries.push(Entry { sub: sub.clone(), observer });
    sub
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize { self.entries.len() }
}

/// Shared handle to a subscriber list.
pub(crate) type SubscriberList<T> = Rc<RefCell<Subscribers<T>>>;

pub(crate) fn subscriber_list<T>() -> SubscriberList<T> {
  Rc::new(RefCell::new(Subscribers::default()))
}

/// Deliver `value` to every live observer in the list.
///
/// Entries are moved out for the duration of the delivery, so callbacks may
/// subscribe or unsubscribe freely: an observer added during delivery does
/// not receive the in-progress value, and an observer that closes itself
/// (keyed termination) has its subscription handle closed and is dropped.
/// A re-entrant broadcast (a write issued from inside a callback) queues
/// its value; the outermost frame drains the queue in order once the
/// in-progress value has reached every observer, so no emission is lost.
pub(crate) fn broadcast<T: Clone>(list: &SubscriberList<T>, value: &T) {
  {
    let mut subs = list.borrow_mut();
    if subs.delivering {
      subs.pending.push_back(value.clone());
      return;
    }
    subs.delivering = true;
  }
  deliver(list, value);
  loop {
    let queued = {
      let mut subs = list.borrow_mut();
      let next = subs.pending.pop_front();
      if next.is_none() {
        subs.delivering = false;
      }
      next
    };
    match queued {
      Some(v) => deliver(list, &v),
      None => break,
    }
  }
}

fn deliver<T: Clone>(list: &SubscriberList<T>, value: &T) {
  let mut active = std::mem::take(&mut list.borrow_mut().entries);
  let mut survivors: SmallVec<[Entry<T>; 1]> = SmallVec::new();
  for mut entry in active.drain(..) {
    if entry.sub.is_closed() || entry.observer.is_closed() {
      entry.sub.unsubscribe();
      continue;
    }
    entry.observer.next(value.clone());
    if entry.observer.is_closed() {
      entry.sub.unsubscribe();
    } else if !entry.sub.is_closed() {
      survivors.push(entry);
    }
  }
  // Merge back anything subscribed while we were delivering.
  let mut subs = list.borrow_mut();
  let added = std::mem::take(&mut subs.entries);
  subs.entries = survivors;
  subs.entries.extend(added);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn broadcast_reaches_every_observer() {
    let list = subscriber_list::<i32>();
    let seen = Rc::new(RefCell::new(vec![]));

    for _ in 0..2 {
      let c = seen.clone();
      list
        .borrow_mut()
        .add(Box::new(FnObserver::new(move |v| c.borrow_mut().push(v))));
    }

    broadcast(&list, &7);
    assert_eq!(*seen.borrow(), vec![7, 7]);
  }

  #[test]
  fn unsubscribed_entry_is_skipped_and_pruned() {
    let list = subscriber_list::<i32>();
    let seen = Rc::new(RefCell::new(vec![]));
    let c = seen.clone();
    let sub = list
      .borrow_mut()
      .add(Box::new(FnObserver::new(move |v| c.borrow_mut().push(v))));

    broadcast(&list, &1);
    sub.unsubscribe();
    broadcast(&list, &2);

    assert_eq!(*seen.borrow(), vec![1]);
    assert_eq!(list.borrow().len(), 0);
  }

  #[test]
  fn observer_added_during_delivery_misses_current_value() {
    let list = subscriber_list::<i32>();
    let seen = Rc::new(RefCell::new(vec![]));

    let inner_list = list.clone();
    let inner_seen = seen.clone();
    list.borrow_mut().add(Box::new(FnObserver::new(move |v: i32| {
      if v == 1 {
        let c = inner_seen.clone();
        inner_list
          .borrow_mut()
          .add(Box::new(FnObserver::new(move |v| c.borrow_mut().push(v * 10))));
      }
    })));

    broadcast(&list, &1);
    assert!(seen.borrow().is_empty());
    broadcast(&list, &2);
    assert_eq!(*seen.borrow(), vec![20]);
  }

  #[test]
  fn reentrant_broadcast_is_queued_until_the_outer_one_finishes() {
    let list = subscriber_list::<i32>();
    let seen = Rc::new(RefCell::new(vec![]));
    let c = seen.clone();
    list
      .borrow_mut()
      .add(Box::new(FnObserver::new(move |v| c.borrow_mut().push(v))));

    let inner = list.clone();
    list.borrow_mut().add(Box::new(FnObserver::new(move |v: i32| {
      if v == 1 {
        broadcast(&inner, &2);
      }
    })));

    broadcast(&list, &1);
    assert_eq!(*seen.borrow(), vec![1, 2]);
  }

  #[test]
  fn self_closing_observer_closes_its_handle() {
    let list = subscriber_list::<i32>();
    let c = Rc::new(RefCell::new(0));
    let c2 = c.clone();
    let sub = list
      .borrow_mut()
      .add(Box::new(FnErrObserver::new(move |_| *c2.borrow_mut() += 1, |_| {})));

    // Force the error path through the trait object.
    {
      let mut subs = list.borrow_mut();
      subs.entries[0].observer.error(NotFoundError::new(&"k"));
    }
    broadcast(&list, &1);

    assert_eq!(*c.borrow(), 0);
    assert!(sub.is_closed());
    assert_eq!(list.borrow().len(), 0);
  }
}
