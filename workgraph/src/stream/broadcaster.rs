//! Topic-keyed fan-out of execution events.
//!
//! Each subscriber owns a bounded queue. Publishing never waits: a full queue loses
//! that one event for that one subscriber, a closed queue drops the subscriber.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio_stream::Stream;

use super::ExecutionEvent;

/// Default per-subscriber queue capacity.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// What a subscriber listens to: every run of a graph, or one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Graph(String),
    Run(String),
}

impl Topic {
    pub fn matches(&self, event: &ExecutionEvent) -> bool {
        match self {
            Topic::Graph(id) => *id == event.graph_id,
            Topic::Run(id) => *id == event.run_id,
        }
    }
}

struct Subscriber {
    topic: Topic,
    tx: mpsc::Sender<ExecutionEvent>,
}

struct Inner {
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
    dropped: AtomicU64,
    capacity: usize,
}

/// Cheap to clone; clones share subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<Inner>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                dropped: AtomicU64::new(0),
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(subscriber = id, ?topic, "subscribed");
        self.inner.subscribers.insert(
            id,
            Subscriber {
                topic: topic.clone(),
                tx,
            },
        );
        Subscription {
            id,
            topic,
            rx,
            broadcaster: Arc::downgrade(&self.inner),
        }
    }

    /// Removes the subscription; equivalent to dropping it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Delivers `event` to every subscriber of its graph or its run.
    ///
    /// Run subscribers are released after the run's terminal event, which ends their stream.
    pub fn publish(&self, event: &ExecutionEvent) {
        self.inner.subscribers.retain(|id, sub| {
            if !sub.topic.matches(event) {
                return true;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        subscriber = *id,
                        run_id = %event.run_id,
                        event = event.kind.as_str(),
                        "subscriber queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = *id, "subscriber gone, removing");
                    return false;
                }
            }
            !(event.kind.is_terminal() && matches!(sub.topic, Topic::Run(_)))
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Total events lost to full subscriber queues.
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

/// Receiving end of a subscription. Events arrive in publication order.
///
/// Dropping it unsubscribes; this is safe even after the broadcaster is gone.
pub struct Subscription {
    id: u64,
    topic: Topic,
    rx: mpsc::Receiver<ExecutionEvent>,
    broadcaster: Weak<Inner>,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Next event; `None` once the subscription has been released.
    pub async fn recv(&mut self) -> Option<ExecutionEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<ExecutionEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl Stream for Subscription {
    type Item = ExecutionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.broadcaster.upgrade() {
            inner.subscribers.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}
