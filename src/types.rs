//! Core types for the notification bus.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Extracts the unique ID of a published object.
///
/// The bus assumes this is pure and stable for the lifetime of the object.
pub trait Identify {
    fn id(&self) -> &str;
}

impl<T: Identify + ?Sized> Identify for &T {
    fn id(&self) -> &str {
        (**self).id()
    }
}

impl<T: Identify + ?Sized> Identify for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

impl<T: Identify + ?Sized> Identify for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

/// Composite key of a single object: its type name and ID.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub type_name: String,
    pub id: String,
}

impl ObjectKey {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// Build the key of an object from its type name and extracted ID.
    pub fn of<O: Identify + ?Sized>(type_name: &str, object: &O) -> Self {
        Self::new(type_name, object.id())
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({}:{})", self.type_name, self.id)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.id)
    }
}

/// String form of an object key, `type:id`.
///
/// Only for display and logging; the bus indexes on [`ObjectKey`] so type
/// names containing `:` cannot collide.
pub fn key_string(type_name: &str, id: &str) -> String {
    format!("{}:{}", type_name, id)
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time view of the bus indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Number of object keys with at least one subscriber.
    pub key_entries: usize,
    /// Number of type names with at least one subscriber.
    pub type_entries: usize,
    /// Live subscriptions across both indices.
    pub subscriptions: usize,
}
