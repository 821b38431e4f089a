//! Self-validation capability for model types.

use crate::error::ValidationError;

/// A value that can check itself.
///
/// Model types may implement this to expose their own invariants;
/// [`Property::root_validated`](crate::property::Property::root_validated)
/// wires the check in as the property's default validator.
pub trait Validate {
  fn validate(&self) -> Result<(), ValidationError>;
}
