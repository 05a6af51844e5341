//! Per-task event distribution
//!
//! An [`EventHub`] keeps a bounded FIFO history and a set of subscriber
//! queues. A single mutex guards both, so publish, subscribe-with-replay and
//! unsubscribe are serialized: a replaying subscriber sees the whole history
//! before any event published after it joined, with nothing lost or
//! duplicated in between.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::types::Event;
use crate::core::HubConfig;

/// Handle id for one subscription
pub type SubscriberId = u64;

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Event>,
}

struct HubInner {
    history: VecDeque<Event>,
    subscribers: Vec<Subscriber>,
    next_id: SubscriberId,
    closed: bool,
}

/// Bounded-history fan-out for one task's events
pub struct EventHub {
    inner: Mutex<HubInner>,
    history_capacity: usize,
    subscriber_capacity: usize,
}

impl EventHub {
    /// Create a hub; capacities below 1 are raised to 1
    pub fn new(history_capacity: usize, subscriber_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HubInner {
                history: VecDeque::with_capacity(history_capacity.clamp(1, 1024)),
                subscribers: Vec::new(),
                next_id: 0,
                closed: false,
            }),
            history_capacity: history_capacity.max(1),
            subscriber_capacity: subscriber_capacity.max(1),
        }
    }

    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(config.history_capacity, config.subscriber_capacity)
    }

    /// Record an event and deliver it to every live subscriber
    ///
    /// Never blocks: a subscriber whose queue is full or whose receiver is
    /// gone is removed.
    pub fn publish(&self, event: Event) {
        let mut inner = self.inner.lock();
        if inner.closed {
            warn!(kind = %event.kind(), "Dropping event published after hub close");
            return;
        }

        if inner.history.len() == self.history_capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(event.clone());

        inner.subscribers.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = sub.id, "Subscriber fell behind; dropping it");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = sub.id, "Subscriber went away");
                false
            }
        });
    }

    /// Open a new subscription, optionally replaying retained history first
    pub fn subscribe(&self, replay: bool) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let backlog = if replay { inner.history.len() } else { 0 };
        let (tx, rx) = mpsc::channel(self.subscriber_capacity + backlog);

        if replay {
            for event in inner.history.iter() {
                // Capacity covers the whole backlog, so this cannot fail.
                let _ = tx.try_send(event.clone());
            }
        }

        // A closed hub keeps no subscribers; dropping `tx` ends the stream
        // once the replayed backlog is drained.
        if !inner.closed {
            inner.subscribers.push(Subscriber { id, tx });
        }
        debug!(subscriber = id, replay, backlog, "Subscriber added");

        Subscription {
            id,
            rx,
            finished: false,
        }
    }

    /// Remove a subscription; unknown ids are ignored
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|sub| sub.id != id);
    }

    /// Tear down: drop every subscriber queue and refuse further events
    ///
    /// Subscribers still drain whatever was queued before the close.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        let dropped = inner.subscribers.len();
        inner.subscribers.clear();
        debug!(dropped, "Event hub closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Snapshot of retained events, oldest first
    pub fn history(&self) -> Vec<Event> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Retained events as a JSON array
    pub fn history_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.history())
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::from_config(&HubConfig::default())
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventHub")
            .field("history", &inner.history.len())
            .field("subscribers", &inner.subscribers.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

/// Ordered stream of events from one hub
///
/// Ends after a terminal event, after the hub closes, or once the hub drops
/// this subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Event>,
    finished: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` when the stream has ended
    pub async fn recv(&mut self) -> Option<Event> {
        if self.finished {
            return None;
        }
        let event = self.rx.recv().await;
        self.observe(event)
    }

    /// Collect everything up to and including the terminal event
    pub async fn collect_all(mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }

    fn observe(&mut self, event: Option<Event>) -> Option<Event> {
        match event {
            Some(event) => {
                if event.is_terminal() {
                    self.finished = true;
                    self.rx.close();
                }
                Some(event)
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(event) => Poll::Ready(self.observe(event)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPayload;
    use tokio_test::{assert_pending, assert_ready};

    fn thought(n: usize) -> Event {
        Event::think(n, format!("thought {}", n))
    }

    fn step_of(event: &Event) -> usize {
        event.step
    }

    #[test]
    fn history_is_capped_fifo() {
        let hub = EventHub::new(100, 8);
        for n in 0..150 {
            hub.publish(thought(n));
        }
        let history = hub.history();
        assert_eq!(history.len(), 100);
        let steps: Vec<usize> = history.iter().map(step_of).collect();
        assert_eq!(steps, (50..150).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn replay_precedes_live_events() {
        let hub = EventHub::new(10, 8);
        hub.publish(thought(1));
        hub.publish(thought(2));

        let mut sub = hub.subscribe(true);
        hub.publish(thought(3));

        for expected in 1..=3 {
            assert_eq!(sub.recv().await.map(|e| e.step), Some(expected));
        }
    }

    #[tokio::test]
    async fn no_replay_sees_only_live_events() {
        let hub = EventHub::new(10, 8);
        hub.publish(thought(1));
        let mut sub = hub.subscribe(false);
        hub.publish(thought(2));
        assert_eq!(sub.recv().await.map(|e| e.step), Some(2));
    }

    #[test]
    fn stream_is_pending_until_publish() {
        let hub = EventHub::new(10, 8);
        let mut sub = tokio_test::task::spawn(hub.subscribe(false));

        assert_pending!(sub.poll_next());
        hub.publish(thought(7));
        assert!(sub.is_woken());
        let event = assert_ready!(sub.poll_next());
        assert_eq!(event.map(|e| e.step), Some(7));
    }

    #[test]
    fn stream_ends_after_terminal_event() {
        let hub = EventHub::new(10, 8);
        let mut sub = tokio_test::task::spawn(hub.subscribe(false));

        hub.publish(Event::complete(1, "done"));
        hub.publish(thought(2));

        let event = assert_ready!(sub.poll_next());
        assert!(matches!(
            event.map(|e| e.payload),
            Some(EventPayload::Complete { .. })
        ));
        assert!(assert_ready!(sub.poll_next()).is_none());
    }

    #[test]
    fn slow_subscriber_is_dropped() {
        let hub = EventHub::new(10, 2);
        let _slow = hub.subscribe(false);
        let mut fast = hub.subscribe(false);

        hub.publish(thought(1));
        assert_eq!(fast.rx.try_recv().map(|e| e.step).ok(), Some(1));
        hub.publish(thought(2));
        assert_eq!(fast.rx.try_recv().map(|e| e.step).ok(), Some(2));
        hub.publish(thought(3));

        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(fast.rx.try_recv().map(|e| e.step).ok(), Some(3));
    }

    #[test]
    fn dropped_receiver_is_pruned_on_publish() {
        let hub = EventHub::new(10, 8);
        let sub = hub.subscribe(false);
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        hub.publish(thought(1));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = EventHub::new(10, 8);
        let sub = hub.subscribe(false);
        hub.unsubscribe(sub.id());
        hub.unsubscribe(sub.id());
        hub.unsubscribe(999);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn close_lets_queued_events_drain() {
        let hub = EventHub::new(10, 8);
        let mut sub = hub.subscribe(false);
        hub.publish(thought(1));
        hub.close();
        hub.publish(thought(2));

        assert_eq!(sub.recv().await.map(|e| e.step), Some(1));
        assert!(sub.recv().await.is_none());
        assert_eq!(hub.history().len(), 1);
    }

    #[tokio::test]
    async fn replay_after_close_returns_history_then_ends() {
        let hub = EventHub::new(10, 8);
        hub.publish(thought(1));
        hub.publish(thought(2));
        hub.close();

        let events = hub.subscribe(true).collect_all().await;
        assert_eq!(events.len(), 2);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn history_json_is_an_array() {
        let hub = EventHub::new(10, 8);
        hub.publish(thought(1));
        let json: serde_json::Value = serde_json::from_str(&hub.history_json().unwrap()).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(1));
        assert_eq!(json[0]["type"], "think");
    }
}
