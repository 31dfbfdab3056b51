//! Publish/subscribe bus for object state changes.
//!
//! Observers subscribe at one of two granularities:
//! - a single object, by type name and ID
//! - every object of a type
//!
//! Every subscription is seeded with a caller-supplied initial value, so a
//! reader can fetch current state and subscribe without missing an update
//! in between. Queues are bounded; a subscriber that falls behind is
//! evicted instead of slowing down publishers.
//!
//! # Example
//!
//! ```ignore
//! let bus: Bus<Arc<Doc>> = Bus::new();
//!
//! let handle = bus.subscribe_key("doc", "d1", current.clone());
//! bus.announce("doc", updated);
//!
//! for event in handle.iter() {
//!     match event {
//!         BusEvent::Value(doc) => println!("doc is now {:?}", doc),
//!         BusEvent::Deleted(id) => println!("{} deleted", id),
//!         BusEvent::Closed(reason) => println!("closed: {}", reason),
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::Bus;
pub use types::{
    BusConfig, BusEvent, CloseReason, Events, SubscriptionHandle, DEFAULT_QUEUE_CAPACITY,
};
