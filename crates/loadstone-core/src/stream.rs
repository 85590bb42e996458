// crates/loadstone-core/src/stream.rs
// ============================================================================
// Module: Loadstone Metric Stream
// Description: In-process broadcast of live metric events to subscribers.
// Purpose: Fan samples out without letting a slow subscriber stall the engine.
// Dependencies: serde, crate::{identifiers, run}
// ============================================================================

//! ## Overview
//! [`MetricHub`] is a single-producer, multi-subscriber broadcast. Each
//! subscriber owns an unbounded mailbox plus a shared depth counter. Metric
//! events are best-effort: a subscriber whose mailbox depth has reached the
//! lossy capacity simply misses the event. Terminal events always enqueue.
//! Invariants:
//! - Publishing never blocks; a departed subscriber is reaped on the next
//!   publish that touches it.
//! - Events observed by one subscriber arrive in publish order.
//! - No replay: subscribers only see events published after they attach.
//!
//! The wire names of [`StreamEvent`] variants are external contracts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::RunToken;
use crate::identifiers::SubscriberId;
use crate::run::MetricSample;
use crate::run::RunAggregate;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of undelivered metric events a subscriber may buffer
/// before further metric events are dropped for it.
pub const DEFAULT_LOSSY_CAPACITY: usize = 1_024;

// ============================================================================
// SECTION: Stream Events
// ============================================================================

/// Events delivered over the metric stream.
///
/// # Invariants
/// - Variant names are observable wire names and must not be renamed.
/// - `MetricReceived` is best-effort; the remaining events are reliable for
///   subscribers attached at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum StreamEvent {
    /// Delivered once to a subscriber on attach.
    #[serde(rename_all = "camelCase")]
    Connected {
        /// Identifier assigned to the subscriber.
        subscriber_id: SubscriberId,
    },
    /// Live per-response metric sample.
    #[serde(rename_all = "camelCase")]
    MetricReceived {
        /// The sample payload.
        sample: MetricSample,
    },
    /// Run finished naturally; carries the terminal aggregate.
    #[serde(rename_all = "camelCase")]
    TestCompleted {
        /// The terminal aggregate.
        aggregate: RunAggregate,
    },
    /// Run aborted on an engine or persistence failure.
    #[serde(rename_all = "camelCase")]
    TestError {
        /// Run token the error belongs to.
        run_token: RunToken,
        /// Error description.
        error: String,
    },
    /// Token-fetch preflight started.
    #[serde(rename_all = "camelCase")]
    AuthenticationStarted {
        /// Run token the preflight belongs to.
        run_token: RunToken,
    },
    /// Token-fetch preflight succeeded.
    #[serde(rename_all = "camelCase")]
    AuthenticationSuccess {
        /// Run token the preflight belongs to.
        run_token: RunToken,
    },
    /// Token-fetch preflight failed; the run will not start.
    #[serde(rename_all = "camelCase")]
    AuthenticationFailed {
        /// Run token the preflight belongs to.
        run_token: RunToken,
        /// Failure description.
        error: String,
    },
}

// ============================================================================
// SECTION: Hub
// ============================================================================

/// Per-subscriber delivery slot held by the hub.
struct SubscriberSlot {
    /// Subscriber identifier.
    id: SubscriberId,
    /// Mailbox sender.
    sender: Sender<StreamEvent>,
    /// Undelivered event count, shared with the subscription.
    depth: Arc<AtomicUsize>,
}

/// Process-wide metric broadcast hub.
///
/// # Invariants
/// - Subscriber ids are unique for the lifetime of the hub.
/// - Publish holds the subscriber list lock, which serializes event order
///   across producers.
pub struct MetricHub {
    /// Active subscriber slots.
    subscribers: Mutex<Vec<SubscriberSlot>>,
    /// Monotonic subscriber id counter.
    next_id: AtomicU64,
    /// Mailbox depth at which metric events are dropped.
    lossy_capacity: usize,
}

impl Default for MetricHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricHub {
    /// Creates a hub with the default lossy capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lossy_capacity(DEFAULT_LOSSY_CAPACITY)
    }

    /// Creates a hub that drops metric events for subscribers holding more
    /// than `lossy_capacity` undelivered events.
    #[must_use]
    pub fn with_lossy_capacity(lossy_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            lossy_capacity: lossy_capacity.max(1),
        }
    }

    /// Attaches a new subscriber and delivers its `Connected` event.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (sender, receiver) = mpsc::channel();
        let depth = Arc::new(AtomicUsize::new(0));
        depth.fetch_add(1, Ordering::Relaxed);
        // The receiver is still local, so this send cannot fail.
        let _ = sender.send(StreamEvent::Connected {
            subscriber_id: id,
        });
        let mut subscribers =
            self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.push(SubscriberSlot {
            id,
            sender,
            depth: Arc::clone(&depth),
        });
        drop(subscribers);
        Subscription {
            id,
            receiver,
            depth,
        }
    }

    /// Publishes a best-effort metric event.
    ///
    /// Subscribers at or above the lossy capacity miss the event; departed
    /// subscribers are removed.
    pub fn publish_metric(&self, event: &StreamEvent) {
        self.fan_out(event, true);
    }

    /// Publishes a reliable event to every active subscriber.
    pub fn publish_reliable(&self, event: &StreamEvent) {
        self.fan_out(event, false);
    }

    /// Returns the number of attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Delivers an event to all slots, dropping for saturated mailboxes when
    /// `lossy` and reaping slots whose receiver is gone.
    fn fan_out(&self, event: &StreamEvent, lossy: bool) {
        let mut subscribers =
            self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|slot| {
            if lossy && slot.depth.load(Ordering::Relaxed) >= self.lossy_capacity {
                return true;
            }
            slot.depth.fetch_add(1, Ordering::Relaxed);
            slot.sender.send(event.clone()).is_ok()
        });
    }
}

// ============================================================================
// SECTION: Subscription
// ============================================================================

/// Receiving half of a hub subscription.
///
/// Dropping the subscription detaches it; the hub reaps the slot on the next
/// publish that reaches it.
pub struct Subscription {
    /// Subscriber identifier.
    id: SubscriberId,
    /// Mailbox receiver.
    receiver: Receiver<StreamEvent>,
    /// Undelivered event count, shared with the hub slot.
    depth: Arc<AtomicUsize>,
}

impl Subscription {
    /// Returns the subscriber identifier.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Blocks until the next event or until all senders are gone.
    #[must_use]
    pub fn recv(&self) -> Option<StreamEvent> {
        let event = self.receiver.recv().ok();
        if event.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        event
    }

    /// Waits up to `timeout` for the next event.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StreamEvent> {
        let event = self.receiver.recv_timeout(timeout).ok();
        if event.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        event
    }

    /// Returns the next event without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<StreamEvent> {
        let event = self.receiver.try_recv().ok();
        if event.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        event
    }
}
