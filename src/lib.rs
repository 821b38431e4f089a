//! # tether: reactive data binding for single-threaded apps
//!
//! A small data-binding core: observable properties, bidirectional
//! derivation combinators, transactional controllers, and a weak
//! singleton cache that guarantees at most one live controller per
//! identity.
//!
//! ## Quick Start
//!
//! ```rust
//! use tether::prelude::*;
//!
//! #[derive(Clone, PartialEq, Debug)]
//! struct Settings {
//!   volume: u8,
//! }
//!
//! let root = Property::root(Settings { volume: 3 });
//! let volume = root.field(
//!   |s| s.volume,
//!   |mut s, v| {
//!     s.volume = v;
//!     s
//!   },
//! );
//!
//! let _sub = volume.subscribe(|v| println!("volume is now {v}"));
//! volume.set(7).unwrap();
//! assert_eq!(root.get().volume, 7);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Property`] | Value slot with synchronous read/write and a deduplicated change stream |
//! | [`Controller`] | Identity + persistence context + one property, with transactional edits |
//! | [`InstanceCache`] | Get-or-create table handing out at most one live instance per identity |
//! | [`Subscription`] | Handle to cancel an active change subscription |
//!
//! Everything is single-threaded by design (`Rc`, no locks); the only
//! asynchronous boundary is that change notifications are callbacks
//! dispatched synchronously on the writing thread.
//!
//! [`Property`]: prelude::Property
//! [`Controller`]: prelude::Controller
//! [`InstanceCache`]: prelude::InstanceCache
//! [`Subscription`]: prelude::Subscription

pub mod cache;
pub mod controller;
pub mod error;
pub mod observer;
pub mod prelude;
pub mod property;
pub mod subscription;
pub mod validate;

pub use prelude::*;
