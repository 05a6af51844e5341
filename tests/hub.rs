//! Event hub delivery under concurrent publishing

use std::collections::HashSet;
use std::sync::Arc;

use ergon::events::{Event, EventHub};
use futures::StreamExt;
use tokio::sync::Notify;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn replay_then_live_matches_publish_order() {
    for _ in 0..50 {
        let hub = Arc::new(EventHub::new(1000, 512));
        let started = Arc::new(Notify::new());

        let publisher = {
            let hub = Arc::clone(&hub);
            let started = Arc::clone(&started);
            tokio::spawn(async move {
                for step in 1..=300 {
                    hub.publish(Event::think(step, format!("thought {}", step)));
                    if step == 20 {
                        started.notify_one();
                    }
                    if step % 10 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                hub.publish(Event::complete(301, "done"));
            })
        };

        // Subscribe while the publisher is mid-stream
        started.notified().await;
        let subscription = hub.subscribe(true);
        let received: Vec<Event> = subscription.collect().await;
        publisher.await.unwrap();

        let mut seen = HashSet::new();
        let deduped: Vec<Event> = received
            .into_iter()
            .filter(|e| seen.insert(e.id))
            .collect();
        assert_eq!(deduped, hub.history());
        assert_eq!(deduped.len(), 301);
        assert!(deduped.last().unwrap().is_terminal());
    }
}

#[tokio::test]
async fn independent_subscribers_see_the_same_stream() {
    let hub = EventHub::new(100, 16);
    let a = hub.subscribe(false);
    let b = hub.subscribe(false);

    hub.publish(Event::think(1, "one"));
    hub.publish(Event::tool_select(1, "planning"));
    hub.publish(Event::complete(1, "ok"));

    let a = a.collect_all().await;
    let b = b.collect_all().await;
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
}

#[tokio::test]
async fn closing_the_hub_ends_open_streams() {
    let hub = EventHub::new(100, 16);
    let sub = hub.subscribe(false);
    hub.publish(Event::think(1, "partial"));
    hub.close();
    hub.publish(Event::think(2, "dropped"));

    let events = sub.collect_all().await;
    assert_eq!(events.len(), 1);
    assert_eq!(hub.history().len(), 1);
    assert_eq!(hub.subscriber_count(), 0);
}
