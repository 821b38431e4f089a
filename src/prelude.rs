//! Everything a binding consumer needs in one import.

pub use crate::cache::InstanceCache;
pub use crate::controller::Controller;
pub use crate::error::{BindError, EditError, NotFoundError, ValidationError};
pub use crate::observer::{BoxedObserver, ChangeObserver, FnErrObserver, FnObserver};
pub use crate::property::{Property, PropertySource};
pub use crate::subscription::{Subscription, SubscriptionGuard};
pub use crate::validate::Validate;
