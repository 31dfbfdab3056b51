//! # Object Bus
//!
//! An in-process notification bus that propagates state changes of
//! identifiable objects to interested observers, so they never have to poll
//! a store.
//!
//! ## Core Concepts
//!
//! - **Key subscriptions**: interest in one object, by type name and ID
//! - **Type subscriptions**: interest in every object of a type
//! - **Announcements**: delivery of an object's current value
//! - **Eviction**: a subscriber that cannot keep up is closed, never waited on
//!
//! ## Example
//!
//! ```ignore
//! use object_bus::{Bus, BusEvent, CloseReason};
//!
//! let bus: Bus<Arc<User>> = Bus::new();
//!
//! // Watch one user, seeded with the state we just read
//! let watch = bus.subscribe_key("user", "u1", current);
//!
//! bus.announce("user", renamed);
//! bus.delete("user", "u1");
//!
//! assert!(matches!(watch.recv(), BusEvent::Value(_)));  // current
//! assert!(matches!(watch.recv(), BusEvent::Value(_)));  // renamed
//! assert_eq!(watch.recv(), BusEvent::Closed(CloseReason::Deleted));
//! ```

pub mod bus;
pub mod error;
pub mod types;

// Re-exports
pub use bus::{
    Bus, BusConfig, BusEvent, CloseReason, Events, SubscriptionHandle, DEFAULT_QUEUE_CAPACITY,
};
pub use error::{BusError, Result};
pub use types::*;
