//! Error taxonomy for the binding core.
//!
//! Three concrete failures exist: a value rejected by validation, a keyed
//! lookup whose key is absent, and an edit closure that declined to produce
//! a new value. [`BindError`] is the umbrella type returned by fallible
//! operations; every error is reported synchronously to the immediate
//! caller, never swallowed by the core.

use std::fmt::Debug;

/// A proposed value failed validation.
///
/// Carries a debug rendering of the rejected value and an optional reason.
/// `Property::set` never raises this itself; validation is a separate,
/// caller-invoked step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("value rejected{}: {value}", .reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
pub struct ValidationError {
  /// Debug rendering of the rejected value.
  pub value: String,
  /// Optional human-readable reason supplied by the validator.
  pub reason: Option<String>,
}

impl ValidationError {
  pub fn new(value: &impl Debug) -> Self {
    Self { value: format!("{value:?}"), reason: None }
  }

  pub fn with_reason(value: &impl Debug, reason: impl Into<String>) -> Self {
    Self { value: format!("{value:?}"), reason: Some(reason.into()) }
  }
}

/// A keyed-derived property's key is absent from its parent container.
///
/// Raised by `set` on a keyed property while the key is missing, and
/// delivered as the terminal event of a keyed change stream when the key
/// disappears.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no entry for key `{key}`")]
pub struct NotFoundError {
  /// Debug rendering of the missing key.
  pub key: String,
}

impl NotFoundError {
  pub fn new(key: &impl Debug) -> Self { Self { key: format!("{key:?}") } }
}

/// An `apply` edit closure declined to produce a new value.
#[derive(Debug, thiserror::Error)]
#[error("edit failed: {source}")]
pub struct EditError {
  #[source]
  source: Box<dyn std::error::Error + 'static>,
}

impl EditError {
  pub fn new(source: impl std::error::Error + 'static) -> Self {
    Self { source: Box::new(source) }
  }

  /// The underlying cause reported by the edit closure.
  pub fn cause(&self) -> &(dyn std::error::Error + 'static) { &*self.source }
}

/// Umbrella error for every fallible binding operation.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
  #[error(transparent)]
  Validation(#[from] ValidationError),
  #[error(transparent)]
  NotFound(#[from] NotFoundError),
  #[error(transparent)]
  Edit(#[from] EditError),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validation_error_renders_value_and_reason() {
    let plain = ValidationError::new(&42);
    assert_eq!(plain.to_string(), "value rejected: 42");

    let reasoned = ValidationError::with_reason(&"abc", "too short");
    assert_eq!(reasoned.to_string(), "value rejected (too short): \"abc\"");
  }

  #[test]
  fn not_found_error_carries_key() {
    let err = NotFoundError::new(&"entry-7");
    assert_eq!(err.key, "\"entry-7\"");
    assert_eq!(err.to_string(), "no entry for key `\"entry-7\"`");
  }

  #[test]
  fn bind_error_converts_from_variants() {
    let err: BindError = NotFoundError::new(&1).into();
    assert!(matches!(err, BindError::NotFound(_)));

    let err: BindError = ValidationError::new(&1).into();
    assert!(matches!(err, BindError::Validation(_)));
  }
}
