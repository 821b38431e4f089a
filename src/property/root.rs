//! Root value store.
//!
//! The root source privately owns the backing value for a property tree.
//! Roots are typically created once at session start and live for the
//! session; everything else derives from them.

use super::{Property, PropertySource};
use crate::error::{BindError, ValidationError};
use crate::observer::{broadcast, subscriber_list, BoxedObserver, SubscriberList};
use crate::subscription::Subscription;
use crate::validate::Validate;
use std::cell::RefCell;
use std::rc::Rc;

type Validator<T> = Box<dyn Fn(&T) -> Result<(), ValidationError>>;

struct RootSource<T> {
  value: RefCell<T>,
  validator: Validator<T>,
  subscribers: SubscriberList<T>,
}

impl<T> PropertySource<T> for RootSource<T>
where
  T: Clone + PartialEq + 'static,
{
  fn get(&self) -> T { self.value.borrow().clone() }

  fn validate(&self, value: &T) -> Result<(), ValidationError> { (self.validator)(value) }

  fn set(&self, value: T) -> Result<(), BindError> {
    {
      let current = self.value.borrow();
      // Equality gate: an equal write is a silent no-op.
      if *current == value {
        return Ok(());
      }
    }
    *self.value.borrow_mut() = value.clone();
    broadcast(&self.subscribers, &value);
    Ok(())
  }

  fn observe(&self, observer: BoxedObserver<T>) -> Subscription {
    self.subscribers.borrow_mut().add(observer)
  }
}

impl<T> Property<T>
where
  T: Clone + PartialEq + 'static,
{
  /// Root property with the accept-everything validator.
  pub fn root(value: T) -> Self { Self::root_with(value, |_| Ok(())) }

  /// Root property with an explicit validator.
  pub fn root_with(
    value: T,
    validator: impl Fn(&T) -> Result<(), ValidationError> + 'static,
  ) -> Self {
    Self::from_source(Rc::new(RootSource {
      value: RefCell::new(value),
      validator: Box::new(validator),
      subscribers: subscriber_list(),
    }))
  }

  /// Root property whose validator delegates to the value's own
  /// [`Validate`] implementation.
  pub fn root_validated(value: T) -> Self
  where
    T: Validate,
  {
    Self::root_with(value, T::validate)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::rc::Rc;

  #[test]
  fn get_returns_current_value() {
    let prop = Property::root(3);
    assert_eq!(prop.get(), 3);
    prop.set(4).unwrap();
    assert_eq!(prop.get(), 4);
  }

  #[test]
  fn equal_write_emits_nothing() {
    let prop = Property::root(1);
    let seen = Rc::new(RefCell::new(vec![]));
    let c = seen.clone();
    let _sub = prop.subscribe(move |v| c.borrow_mut().push(v));

    prop.set(1).unwrap();
    assert!(seen.borrow().is_empty());

    prop.set(2).unwrap();
    prop.set(2).unwrap();
    assert_eq!(*seen.borrow(), vec![2]);
  }

  #[test]
  fn subscribe_does_not_replay() {
    let prop = Property::root(9);
    let seen = Rc::new(RefCell::new(vec![]));
    let c = seen.clone();
    let _sub = prop.subscribe(move |v| c.borrow_mut().push(v));
    assert!(seen.borrow().is_empty());
  }

  #[test]
  fn unsubscribe_stops_delivery() {
    let prop = Property::root(0);
    let seen = Rc::new(RefCell::new(vec![]));
    let c = seen.clone();
    let sub = prop.subscribe(move |v| c.borrow_mut().push(v));

    prop.set(1).unwrap();
    sub.unsubscribe();
    prop.set(2).unwrap();
    assert_eq!(*seen.borrow(), vec![1]);
  }

  #[test]
  fn write_from_callback_reaches_subscribers() {
    let prop = Property::root(0);
    let seen = Rc::new(RefCell::new(vec![]));
    let c = seen.clone();
    let _log = prop.subscribe(move |v| c.borrow_mut().push(v));

    // A clamp that rewrites 1 to 2 from inside its own callback.
    let clamp = prop.clone();
    let _clamp = prop.subscribe(move |v: i32| {
      if v == 1 {
        clamp.set(2).unwrap();
      }
    });

    prop.set(1).unwrap();
    assert_eq!(prop.get(), 2);
    assert_eq!(*seen.borrow(), vec![1, 2]);

    // Writing 1 again re-triggers the clamp; no emission is lost and no
    // consecutive duplicate reaches a subscriber.
    prop.set(1).unwrap();
    assert_eq!(prop.get(), 2);
    assert_eq!(*seen.borrow(), vec![1, 2, 1, 2]);
  }

  #[test]
  fn default_validator_accepts_everything() {
    let prop = Property::root(-5);
    assert!(prop.validate(&i32::MIN).is_ok());
  }

  #[test]
  fn explicit_validator_rejects() {
    let prop = Property::root_with(1, |v: &i32| {
      if *v > 0 {
        Ok(())
      } else {
        Err(ValidationError::with_reason(v, "must be positive"))
      }
    });
    assert!(prop.validate(&1).is_ok());
    let err = prop.validate(&0).unwrap_err();
    assert_eq!(err.reason.as_deref(), Some("must be positive"));
  }

  #[test]
  fn self_validating_value_is_wired_in() {
    #[derive(Clone, PartialEq, Debug)]
    struct Name(String);

    impl Validate for Name {
      fn validate(&self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
          Err(ValidationError::with_reason(&self.0, "empty name"))
        } else {
          Ok(())
        }
      }
    }

    let prop = Property::root_validated(Name("a".into()));
    assert!(prop.validate(&Name("b".into())).is_ok());
    assert!(prop.validate(&Name(String::new())).is_err());
  }

  #[test]
  fn validate_does_not_gate_set() {
    // Validation is a separate caller-invoked step; set never runs it.
    let prop = Property::root_with(1, |v: &i32| {
      if *v > 0 {
        Ok(())
      } else {
        Err(ValidationError::new(v))
      }
    });
    prop.set(-1).unwrap();
    assert_eq!(prop.get(), -1);
  }
}
