//! Controllers: identity + persistence context + one observable property.
//!
//! A [`Controller`] wraps a [`Property`] together with a stable identity
//! and an opaque persistence context, and keeps a locally cached copy of
//! the last delivered value for consumers that need synchronous,
//! glitch-free reads. Edits go through the transactional
//! [`Controller::apply`]; child controllers over projections of the model
//! are built through an explicitly passed [`InstanceCache`] so that every
//! identity maps to at most one live controller.
//!
//! # Notification ordering
//!
//! Controller subscribers are notified synchronously while the triggering
//! write is still unwinding through the property chain. For hierarchical
//! updates this means notifications may be observed slightly ahead of
//! committed storage; consumers must not assume write-then-read
//! consistency purely from notification ordering.

use crate::cache::InstanceCache;
use crate::error::{BindError, EditError, NotFoundError};
use crate::observer::{broadcast, subscriber_list, ChangeObserver, FnObserver, SubscriberList};
use crate::property::Property;
use crate::subscription::Subscription;
use std::cell::RefCell;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::{Rc, Weak};

/// Stateful façade over one observable property.
///
/// `Id` is the controller's stable identity, `M` the modeled value, `P`
/// the opaque persistence context the excluded storage layer consumes.
/// The cached value updates strictly via the property's change stream,
/// never by direct external mutation.
pub struct Controller<Id, M, P> {
  id: Id,
  persistence: P,
  property: Property<M>,
  state: Rc<State<M>>,
  watch: Subscription,
}

/// Mutable interior shared with the watch observer. Held behind `Weak`
/// there so the property chain never keeps a dropped controller alive.
struct State<M> {
  current: RefCell<M>,
  subscribers: SubscriberList<M>,
}

impl<Id, M, P> Controller<Id, M, P>
where
  M: Clone + PartialEq + 'static,
{
  /// `initial` is explicit because a keyed-derived property may have no
  /// safe initial value; root-backed callers can use
  /// [`from_current`](Controller::from_current) instead.
  pub fn new(id: Id, property: Property<M>, initial: M, persistence: P) -> Self {
    let state = Rc::new(State {
      current: RefCell::new(initial),
      subscribers: subscriber_list(),
    });
    let watch = property.observe(Box::new(Watch {
      state: Rc::downgrade(&state),
      done: false,
    }));
    Self { id, persistence, property, state, watch }
  }

  /// Controller seeded with the property's own current value. Safe for
  /// root and field-derived properties, whose reads always succeed.
  pub fn from_current(id: Id, property: Property<M>, persistence: P) -> Self {
    let initial = property.get();
    Self::new(id, property, initial, persistence)
  }

  pub fn id(&self) -> &Id { &self.id }

  pub fn persistence(&self) -> &P { &self.persistence }

  pub fn property(&self) -> &Property<M> { &self.property }

  /// Last value the property delivered, or the construction-time initial.
  /// Synchronous and glitch-free.
  pub fn current(&self) -> M { self.state.current.borrow().clone() }

  /// Subscribe to cached-value updates. No replay of the current value;
  /// see the module docs for the ordering caveat.
  pub fn subscribe(&self, on_change: impl FnMut(M) + 'static) -> Subscription {
    self
      .state
      .subscribers
      .borrow_mut()
      .add(Box::new(FnObserver::new(on_change)))
  }

  /// Transactional edit: reads the property's authoritative value (not
  /// the cached snapshot), applies `edit`, and writes the result back on
  /// success. On failure nothing is written and the controller's state is
  /// untouched, all or nothing.
  pub fn apply<E>(&self, edit: impl FnOnce(M) -> Result<M, E>) -> Result<(), BindError>
  where
    E: std::error::Error + 'static,
  {
    let authoritative = self.property.get();
    let updated = edit(authoritative).map_err(EditError::new)?;
    self.property.set(updated)
  }
}

impl<Id, M, P> Controller<Id, M, P>
where
  Id: Clone + Eq + Hash,
  M: Clone + PartialEq + 'static,
  P: Clone,
{
  /// Look up or build the child controller over a field projection. The
  /// child inherits this controller's identity and persistence context;
  /// `cache` deduplicates instances per identity.
  pub fn child<U>(
    &self,
    cache: &InstanceCache<Id, Controller<Id, U, P>>,
    project: impl Fn(&M) -> U + 'static,
    merge: impl Fn(M, U) -> M + 'static,
  ) -> Result<Rc<Controller<Id, U, P>>, BindError>
  where
    U: Clone + PartialEq + 'static,
  {
    cache.get_or_create(self.id.clone(), || {
      let property = self.property.field(project, merge);
      let initial = property.get();
      Ok(Controller::new(self.id.clone(), property, initial, self.persistence.clone()))
    })
  }

  /// Look up or build the child controller over a keyed projection. The
  /// child's identity is the container key; building fails with
  /// [`NotFoundError`] if the key is absent right now.
  pub fn keyed_child<K, U>(
    &self,
    cache: &InstanceCache<K, Controller<K, U, P>>,
    key: K,
    entry: impl Fn(&M, &K) -> Option<U> + 'static,
    store: impl Fn(M, &K, U) -> Option<M> + 'static,
  ) -> Result<Rc<Controller<K, U, P>>, BindError>
  where
    K: Clone + Eq + Hash + Debug + 'static,
    U: Clone + PartialEq + 'static,
  {
    cache.get_or_create(key.clone(), || {
      let property = self.property.keyed(key.clone(), entry, store)?;
      let initial = property.get();
      Ok(Controller::new(key, property, initial, self.persistence.clone()))
    })
  }
}

impl<Id, M, P> Drop for Controller<Id, M, P> {
  fn drop(&mut self) { self.watch.unsubscribe(); }
}

impl<Id: Debug, M, P> Debug for Controller<Id, M, P> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Controller").field("id", &self.id).finish()
  }
}

/// Observer keeping the cached value in sync with the property.
///
/// Holds the controller state weakly: the property chain must never own
/// its controllers. A stream error cannot be represented in the cached
/// value, so it is logged best-effort and the controller stops updating
/// without crashing.
struct Watch<M> {
  state: Weak<State<M>>,
  done: bool,
}

impl<M: Clone> ChangeObserver<M> for Watch<M> {
  fn next(&mut self, value: M) {
    match self.state.upgrade() {
      Some(state) => {
        *state.current.borrow_mut() = value.clone();
        broadcast(&state.subscribers, &value);
      }
      None => self.done = true,
    }
  }

  fn error(&mut self, err: NotFoundError) {
    self.done = true;
    tracing::warn!(error = %err, "controller change stream failed; no further updates");
  }

  fn is_closed(&self) -> bool { self.done || self.state.strong_count() == 0 }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  #[derive(Clone, PartialEq, Debug)]
  struct Counter {
    count: i32,
  }

  #[derive(Debug, thiserror::Error)]
  #[error("edit declined")]
  struct Declined;

  #[test]
  fn current_tracks_property_changes() {
    let property = Property::root(Counter { count: 1 });
    let controller = Controller::from_current("c", property.clone(), ());

    assert_eq!(controller.current().count, 1);
    property.set(Counter { count: 5 }).unwrap();
    assert_eq!(controller.current().count, 5);
  }

  #[test]
  fn apply_writes_back_on_success() {
    let property = Property::root(Counter { count: 1 });
    let controller = Controller::from_current("c", property.clone(), ());

    controller
      .apply(|mut m| -> Result<_, Declined> {
        m.count += 1;
        Ok(m)
      })
      .unwrap();

    assert_eq!(controller.current().count, 2);
    assert_eq!(property.get().count, 2);
  }

  #[test]
  fn failed_apply_leaves_state_untouched() {
    let property = Property::root(Counter { count: 1 });
    let controller = Controller::from_current("c", property.clone(), ());

    let err = controller
      .apply(|_| -> Result<Counter, Declined> { Err(Declined) })
      .unwrap_err();

    assert!(matches!(err, BindError::Edit(_)));
    assert_eq!(controller.current().count, 1);
    assert_eq!(property.get().count, 1);
  }

  #[test]
  fn apply_reads_authoritative_value_not_snapshot() {
    let property = Property::root(Counter { count: 1 });
    let controller = Controller::new("c", property.clone(), Counter { count: 0 }, ());

    // The cached snapshot is stale (0); apply must act on the property.
    controller
      .apply(|mut m| -> Result<_, Declined> {
        m.count += 1;
        Ok(m)
      })
      .unwrap();
    assert_eq!(property.get().count, 2);
  }

  #[test]
  fn subscribers_see_distinct_updates() {
    let property = Property::root(Counter { count: 0 });
    let controller = Controller::from_current("c", property.clone(), ());
    let seen = Rc::new(RefCell::new(vec![]));
    let c = seen.clone();
    let _sub = controller.subscribe(move |m: Counter| c.borrow_mut().push(m.count));

    property.set(Counter { count: 1 }).unwrap();
    property.set(Counter { count: 1 }).unwrap();
    property.set(Counter { count: 2 }).unwrap();
    assert_eq!(*seen.borrow(), vec![1, 2]);
  }

  #[test]
  fn dropped_controller_stops_watching() {
    let property = Property::root(Counter { count: 0 });
    let controller = Controller::from_current("c", property.clone(), ());
    drop(controller);
    // Must not panic or leak deliveries into freed state.
    property.set(Counter { count: 1 }).unwrap();
  }

  #[test]
  fn stream_error_stops_updates_without_crashing() {
    #[derive(Clone, PartialEq, Debug)]
    struct Doc {
      rows: BTreeMap<String, i32>,
    }

    let mut rows = BTreeMap::new();
    rows.insert("r".to_string(), 1);
    let root = Property::root(Doc { rows });

    let row = root
      .keyed(
        "r".to_string(),
        |d: &Doc, k: &String| d.rows.get(k).copied(),
        |mut d: Doc, k: &String, v| match d.rows.get_mut(k) {
          Some(slot) => {
            *slot = v;
            Some(d)
          }
          None => None,
        },
      )
      .unwrap();
    let controller = Controller::from_current("r", row, ());

    root.set(Doc { rows: BTreeMap::new() }).unwrap();
    assert_eq!(controller.current(), 1);

    // Key returns; the terminated watch must not resume.
    let mut rows = BTreeMap::new();
    rows.insert("r".to_string(), 9);
    root.set(Doc { rows }).unwrap();
    assert_eq!(controller.current(), 1);
  }

  #[test]
  fn field_child_is_cached_per_identity() {
    let property = Property::root(Counter { count: 3 });
    let controller = Controller::from_current("c", property, ());
    let cache = InstanceCache::new();

    let first = controller
      .child(&cache, |m| m.count, |mut m, count| {
        m.count = count;
        m
      })
      .unwrap();
    let second = controller
      .child(&cache, |m| m.count, |mut m, count| {
        m.count = count;
        m
      })
      .unwrap();

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(first.current(), 3);

    first.apply(|c| -> Result<_, Declined> { Ok(c + 1) }).unwrap();
    assert_eq!(controller.current().count, 4);
  }
}
