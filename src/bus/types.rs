//! Subscription types for the notification bus.

use crate::types::SubscriptionId;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Default number of events a subscriber may leave unread before it is
/// evicted. The seeded initial value counts toward it.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Configuration for a bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// Bounded queue size per subscription. Must be at least 1 so the
    /// initial value always fits.
    /// Default: 100
    pub queue_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Events delivered to a subscription, in enqueue order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BusEvent<T> {
    /// The seeded initial value, or an announced object.
    Value(T),

    /// An object of the subscribed type was deleted. Only type
    /// subscriptions receive this; they stay subscribed.
    Deleted(String),

    /// Terminal. Nothing follows it.
    Closed(CloseReason),
}

impl<T> BusEvent<T> {
    /// Whether this is the terminal `Closed` event.
    pub fn is_closed(&self) -> bool {
        matches!(self, BusEvent::Closed(_))
    }
}

/// Why a subscription was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The subscribed object was deleted (key subscriptions only).
    Deleted,
    /// Queue overflowed (slow consumer).
    Evicted,
    /// The bus itself was dropped.
    BusDropped,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::Unsubscribed => "unsubscribed",
            CloseReason::Deleted => "deleted",
            CloseReason::Evicted => "evicted",
            CloseReason::BusDropped => "bus dropped",
        };
        f.write_str(reason)
    }
}

/// Read side of one subscription.
///
/// The bus owns the write side. Once it is closed, events that were
/// already queued are still delivered, followed by `Closed` for every
/// subsequent receive.
pub struct SubscriptionHandle<T> {
    id: SubscriptionId,
    receiver: Receiver<BusEvent<T>>,
    close_reason: Arc<OnceLock<CloseReason>>,
}

impl<T> SubscriptionHandle<T> {
    pub(crate) fn new(
        id: SubscriptionId,
        receiver: Receiver<BusEvent<T>>,
        close_reason: Arc<OnceLock<CloseReason>>,
    ) -> Self {
        Self {
            id,
            receiver,
            close_reason,
        }
    }

    /// Get the subscription ID, unique across all buses in the process.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> BusEvent<T> {
        match self.receiver.recv() {
            Ok(event) => event,
            Err(RecvError) => self.closed(),
        }
    }

    /// Try to receive an event (non-blocking). `None` means the
    /// subscription is open but nothing is queued.
    pub fn try_recv(&self) -> Option<BusEvent<T>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.closed()),
        }
    }

    /// Receive with timeout. `None` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BusEvent<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(self.closed()),
        }
    }

    /// Whether the bus has stopped writing to this subscription. Queued
    /// events may still be pending.
    pub fn is_closed(&self) -> bool {
        self.close_reason.get().is_some()
    }

    /// Why the bus stopped writing, if it has.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Number of queued, unread events.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Blocking iterator over events, ending after the `Closed` event.
    pub fn iter(&self) -> Events<'_, T> {
        Events {
            handle: self,
            done: false,
        }
    }

    fn closed(&self) -> BusEvent<T> {
        // The bus records a reason before releasing the sender; a missing
        // one means the sender went away with the bus.
        BusEvent::Closed(self.close_reason().unwrap_or(CloseReason::BusDropped))
    }
}

impl<T> fmt::Debug for SubscriptionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("pending", &self.receiver.len())
            .field("close_reason", &self.close_reason())
            .finish()
    }
}

impl<'a, T> IntoIterator for &'a SubscriptionHandle<T> {
    type Item = BusEvent<T>;
    type IntoIter = Events<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by [`SubscriptionHandle::iter`].
pub struct Events<'a, T> {
    handle: &'a SubscriptionHandle<T>,
    done: bool,
}

impl<T> Iterator for Events<'_, T> {
    type Item = BusEvent<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let event = self.handle.recv();
        self.done = event.is_closed();
        Some(event)
    }
}
