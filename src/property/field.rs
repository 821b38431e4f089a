//! Field projection.
//!
//! Derives a child property from a parent through a pure `project` /
//! `merge` pair. The mapped value always exists, so `get` and `set` never
//! fail and the child stream never terminates. A child write is a
//! read-modify-write of the whole parent value; avoiding a race with a
//! concurrent external parent mutation is the caller's single-threaded
//! discipline.

use super::{Property, PropertySource};
use crate::error::{BindError, NotFoundError, ValidationError};
use crate::observer::{BoxedObserver, ChangeObserver};
use crate::subscription::Subscription;
use std::rc::Rc;

struct FieldSource<T, U> {
  parent: Property<T>,
  project: Rc<dyn Fn(&T) -> U>,
  merge: Rc<dyn Fn(T, U) -> T>,
}

impl<T, U> PropertySource<U> for FieldSource<T, U>
where
  T: Clone + PartialEq + 'static,
  U: Clone + PartialEq + 'static,
{
  fn get(&self) -> U { (self.project)(&self.parent.get()) }

  fn validate(&self, value: &U) -> Result<(), ValidationError> {
    // A child value is valid iff the parent it would produce is valid.
    let merged = (self.merge)(self.parent.get(), value.clone());
    self.parent.validate(&merged)
  }

  fn set(&self, value: U) -> Result<(), BindError> {
    let merged = (self.merge)(self.parent.get(), value);
    self.parent.set(merged)
  }

  fn observe(&self, observer: BoxedObserver<U>) -> Subscription {
    let project = self.project.clone();
    // Seed the dedup with the current projection so a parent change that
    // leaves this field untouched emits nothing.
    let last = project(&self.parent.get());
    self
      .parent
      .observe(Box::new(ProjectedObserver { project, last, inner: observer }))
  }
}

pub(super) fn derive<T, U>(
  parent: Property<T>,
  project: impl Fn(&T) -> U + 'static,
  merge: impl Fn(T, U) -> T + 'static,
) -> Property<U>
where
  T: Clone + PartialEq + 'static,
  U: Clone + PartialEq + 'static,
{
  Property::from_source(Rc::new(FieldSource {
    parent,
    project: Rc::new(project),
    merge: Rc::new(merge),
  }))
}

/// Maps parent values through the projection and suppresses consecutive
/// duplicates before they reach the child observer.
struct ProjectedObserver<T, U> {
  project: Rc<dyn Fn(&T) -> U>,
  last: U,
  inner: BoxedObserver<U>,
}

impl<T, U> ChangeObserver<T> for ProjectedObserver<T, U>
where
  U: Clone + PartialEq,
{
  fn next(&mut self, value: T) {
    let projected = (self.project)(&value);
    if projected != self.last {
      self.last = projected.clone();
      self.inner.next(projected);
    }
  }

  fn error(&mut self, err: NotFoundError) { self.inner.error(err); }

  #[inline]
  fn is_closed(&self) -> bool { self.inner.is_closed() }
}
