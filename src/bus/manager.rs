//! The bus: subscription indices and broadcast with slow-subscriber eviction.

use crate::error::{BusError, Result};
use crate::types::{key_string, BusStats, Identify, ObjectKey, SubscriptionId};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace, warn};

use super::types::{BusConfig, BusEvent, CloseReason, SubscriptionHandle};

/// Write side of one subscription.
struct Subscriber<T> {
    sender: Sender<BusEvent<T>>,
    close_reason: Arc<OnceLock<CloseReason>>,
}

impl<T> Subscriber<T> {
    /// Record why the subscription ends, then release the sender. The
    /// reader only sees disconnection after the reason is set.
    fn close(self, reason: CloseReason) {
        let _ = self.close_reason.set(reason);
        drop(self.sender);
    }
}

/// Process-wide counter for subscription IDs, so handles from one bus
/// never match a subscription on another.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SubscriberSet<T> = HashMap<SubscriptionId, Subscriber<T>>;

/// Both indices live behind one lock.
struct Indices<T> {
    keys: HashMap<ObjectKey, SubscriberSet<T>>,
    types: HashMap<String, SubscriberSet<T>>,
}

/// In-process notification bus for identifiable objects.
///
/// Observers subscribe either to one object (`type`, `id`) or to every
/// object of a type. Publishers announce new object states and deletions.
/// Delivery is best effort: a subscriber whose queue is full is evicted
/// rather than ever blocking a publisher.
pub struct Bus<T> {
    indices: Mutex<Indices<T>>,
    config: BusConfig,
}

impl<T: Clone> Bus<T> {
    /// Create a bus with the default configuration.
    pub fn new() -> Self {
        Self::from_valid_config(BusConfig::default())
    }

    /// Create a bus with a custom configuration.
    pub fn with_config(config: BusConfig) -> Result<Self> {
        if config.queue_capacity == 0 {
            return Err(BusError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: BusConfig) -> Self {
        Self {
            indices: Mutex::new(Indices {
                keys: HashMap::new(),
                types: HashMap::new(),
            }),
            config,
        }
    }

    /// Get the bus configuration.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // --- Publishing ---

    /// Deliver `object` to subscribers of its key and of its type.
    ///
    /// The key is derived from `type_name` and the object's own ID.
    pub fn announce(&self, type_name: &str, object: T)
    where
        T: Identify,
    {
        let key = ObjectKey::of(type_name, &object);
        self.publish(key, object);
    }

    /// Deliver `object` under an explicitly supplied ID.
    pub fn announce_id(&self, type_name: &str, id: &str, object: T) {
        self.publish(ObjectKey::new(type_name, id), object);
    }

    fn publish(&self, key: ObjectKey, object: T) {
        let event = BusEvent::Value(object);

        let mut indices = self.indices.lock();
        let Indices { keys, types } = &mut *indices;

        let key_fanout = broadcast_into(keys, &key, &event);
        let type_fanout = broadcast_into(types, key.type_name.as_str(), &event);

        trace!(key = %key, key_fanout, type_fanout, "announced object");
    }

    /// Close every subscription to (`type_name`, `id`) and tell type
    /// subscribers which ID went away.
    pub fn delete(&self, type_name: &str, id: &str) {
        let key = ObjectKey::new(type_name, id);

        let mut indices = self.indices.lock();
        let Indices { keys, types } = &mut *indices;

        let closed = match keys.remove(&key) {
            Some(subs) => {
                let count = subs.len();
                for sub in subs.into_values() {
                    sub.close(CloseReason::Deleted);
                }
                count
            }
            None => 0,
        };

        let type_fanout = broadcast_into(types, type_name, &BusEvent::Deleted(id.to_string()));

        debug!(key = %key, closed, type_fanout, "deleted object");
    }

    // --- Subscriptions ---

    /// Subscribe to one object. The first event on the handle is always
    /// `Value(initial)`.
    pub fn subscribe_key(&self, type_name: &str, id: &str, initial: T) -> SubscriptionHandle<T> {
        let key = ObjectKey::new(type_name, id);
        let (subscriber, handle) = self.open(initial);

        let mut indices = self.indices.lock();
        indices
            .keys
            .entry(key)
            .or_default()
            .insert(handle.id(), subscriber);

        debug!(key = %key_string(type_name, id), subscription = %handle.id(), "subscribed to key");
        handle
    }

    /// Subscribe to every object of a type. The first event on the handle
    /// is always `Value(initial)`.
    pub fn subscribe_type(&self, type_name: &str, initial: T) -> SubscriptionHandle<T> {
        let (subscriber, handle) = self.open(initial);

        let mut indices = self.indices.lock();
        indices
            .types
            .entry(type_name.to_string())
            .or_default()
            .insert(handle.id(), subscriber);

        debug!(type_name, subscription = %handle.id(), "subscribed to type");
        handle
    }

    /// Remove and close a key subscription. No-op if it is already gone.
    pub fn unsubscribe_key(&self, type_name: &str, id: &str, handle: &SubscriptionHandle<T>) {
        let key = ObjectKey::new(type_name, id);

        let mut indices = self.indices.lock();
        if let Some(sub) = take_subscriber(&mut indices.keys, &key, handle.id()) {
            sub.close(CloseReason::Unsubscribed);
            debug!(key = %key, subscription = %handle.id(), "unsubscribed from key");
        }
    }

    /// Remove and close a type subscription. No-op if it is already gone.
    pub fn unsubscribe_type(&self, type_name: &str, handle: &SubscriptionHandle<T>) {
        let mut indices = self.indices.lock();
        if let Some(sub) = take_subscriber(&mut indices.types, type_name, handle.id()) {
            sub.close(CloseReason::Unsubscribed);
            debug!(type_name, subscription = %handle.id(), "unsubscribed from type");
        }
    }

    /// Create a queue pre-seeded with the initial value.
    fn open(&self, initial: T) -> (Subscriber<T>, SubscriptionHandle<T>) {
        let id = SubscriptionId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = bounded(self.config.queue_capacity);

        // Fresh queue with capacity >= 1: cannot fail.
        let seeded = sender.try_send(BusEvent::Value(initial));
        debug_assert!(seeded.is_ok());

        let close_reason = Arc::new(OnceLock::new());
        let subscriber = Subscriber {
            sender,
            close_reason: close_reason.clone(),
        };
        (subscriber, SubscriptionHandle::new(id, receiver, close_reason))
    }
}

impl<T> Bus<T> {
    // --- Introspection ---

    /// Get entry and subscription counts for both indices.
    pub fn stats(&self) -> BusStats {
        let indices = self.indices.lock();
        let key_subs: usize = indices.keys.values().map(HashMap::len).sum();
        let type_subs: usize = indices.types.values().map(HashMap::len).sum();
        BusStats {
            key_entries: indices.keys.len(),
            type_entries: indices.types.len(),
            subscriptions: key_subs + type_subs,
        }
    }

    /// Live subscriptions across both indices.
    pub fn subscription_count(&self) -> usize {
        self.stats().subscriptions
    }

    /// Get the number of subscriptions to one object.
    pub fn key_subscriber_count(&self, type_name: &str, id: &str) -> usize {
        let key = ObjectKey::new(type_name, id);
        self.indices.lock().keys.get(&key).map_or(0, HashMap::len)
    }

    /// Get the number of subscriptions to a type.
    pub fn type_subscriber_count(&self, type_name: &str) -> usize {
        self.indices.lock().types.get(type_name).map_or(0, HashMap::len)
    }
}

impl<T: Clone> Default for Bus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Bus<T> {
    fn drop(&mut self) {
        let indices = self.indices.get_mut();
        let sets = indices
            .keys
            .drain()
            .map(|(_, subs)| subs)
            .chain(indices.types.drain().map(|(_, subs)| subs));
        for subs in sets {
            for sub in subs.into_values() {
                sub.close(CloseReason::BusDropped);
            }
        }
    }
}

/// Broadcast to the set under `key`, dropping the entry if eviction empties
/// it. Returns how many subscribers received the event.
fn broadcast_into<K, Q, T>(
    index: &mut HashMap<K, SubscriberSet<T>>,
    key: &Q,
    event: &BusEvent<T>,
) -> usize
where
    K: Borrow<Q> + Hash + Eq,
    Q: Hash + Eq + ?Sized,
    T: Clone,
{
    let Some(subs) = index.get_mut(key) else {
        return 0;
    };
    let delivered = broadcast(subs, event);
    if subs.is_empty() {
        index.remove(key);
    }
    delivered
}

/// Non-blocking send to every subscriber. Full queues are evicted on the
/// spot; disconnected ones (handle dropped) are pruned.
fn broadcast<T: Clone>(subs: &mut SubscriberSet<T>, event: &BusEvent<T>) -> usize {
    let mut delivered = 0;
    let mut evicted = Vec::new();
    let mut dropped = Vec::new();

    for (id, sub) in subs.iter() {
        match sub.sender.try_send(event.clone()) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => evicted.push(*id),
            Err(TrySendError::Disconnected(_)) => dropped.push(*id),
        }
    }

    for id in evicted {
        if let Some(sub) = subs.remove(&id) {
            warn!(subscription = %id, "evicting slow subscriber");
            sub.close(CloseReason::Evicted);
        }
    }
    for id in dropped {
        // Nobody is left to read a close reason.
        subs.remove(&id);
        debug!(subscription = %id, "pruning dropped subscriber");
    }

    delivered
}

/// Remove one subscriber, dropping the entry if it becomes empty.
fn take_subscriber<K, Q, T>(
    index: &mut HashMap<K, SubscriberSet<T>>,
    key: &Q,
    id: SubscriptionId,
) -> Option<Subscriber<T>>
where
    K: Borrow<Q> + Hash + Eq,
    Q: Hash + Eq + ?Sized,
{
    let subs = index.get_mut(key)?;
    let taken = subs.remove(&id);
    if subs.is_empty() {
        index.remove(key);
    }
    taken
}
