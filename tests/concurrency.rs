//! Concurrent publish/subscribe tests.

use object_bus::{Bus, BusConfig, BusEvent, CloseReason, Identify};
use std::sync::Arc;
use std::thread;

#[derive(Clone, Debug, PartialEq)]
struct Tick {
    id: String,
    publisher: usize,
    seq: u64,
}

impl Identify for Tick {
    fn id(&self) -> &str {
        &self.id
    }
}

fn tick(id: &str, publisher: usize, seq: u64) -> Tick {
    Tick {
        id: id.to_string(),
        publisher,
        seq,
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[test]
fn test_per_publisher_order_is_preserved() {
    init_tracing();

    const PUBLISHERS: usize = 4;
    const PER_PUBLISHER: u64 = 200;

    let bus: Arc<Bus<Tick>> = Arc::new(
        Bus::with_config(BusConfig {
            queue_capacity: PUBLISHERS * PER_PUBLISHER as usize + 1,
        })
        .unwrap(),
    );
    let handle = bus.subscribe_type("tick", tick("baseline", usize::MAX, 0));

    thread::scope(|s| {
        for publisher in 0..PUBLISHERS {
            let bus = Arc::clone(&bus);
            s.spawn(move || {
                for seq in 1..=PER_PUBLISHER {
                    bus.announce("tick", tick("t", publisher, seq));
                }
            });
        }
    });

    assert_eq!(handle.recv(), BusEvent::Value(tick("baseline", usize::MAX, 0)));

    let mut last_seq = [0u64; PUBLISHERS];
    for _ in 0..(PUBLISHERS as u64 * PER_PUBLISHER) {
        match handle.recv() {
            BusEvent::Value(t) => {
                assert_eq!(t.seq, last_seq[t.publisher] + 1);
                last_seq[t.publisher] = t.seq;
            }
            other => panic!("Expected Value event, got {:?}", other),
        }
    }
    assert_eq!(last_seq, [PER_PUBLISHER; PUBLISHERS]);
    assert!(handle.try_recv().is_none());
}

#[test]
fn test_subscribe_churn_during_announces() {
    init_tracing();

    let bus: Arc<Bus<Tick>> = Arc::new(Bus::new());

    thread::scope(|s| {
        let publisher = Arc::clone(&bus);
        s.spawn(move || {
            for seq in 0..2_000 {
                publisher.announce("tick", tick("t1", 0, seq));
                if seq % 100 == 0 {
                    publisher.delete("tick", "t2");
                }
            }
        });

        for worker in 0..4 {
            let bus = Arc::clone(&bus);
            s.spawn(move || {
                for round in 0..200 {
                    let baseline = tick("baseline", worker, round);
                    let key = bus.subscribe_key("tick", "t1", baseline.clone());
                    let ty = bus.subscribe_type("tick", baseline.clone());

                    // Seeded value always comes first, whatever else is racing.
                    assert_eq!(key.recv(), BusEvent::Value(baseline.clone()));
                    assert_eq!(ty.recv(), BusEvent::Value(baseline));

                    bus.unsubscribe_key("tick", "t1", &key);
                    bus.unsubscribe_type("tick", &ty);

                    // Drain: values may precede closure, never follow it.
                    for handle in [&key, &ty] {
                        let last = handle.iter().last();
                        assert!(matches!(
                            last,
                            Some(BusEvent::Closed(CloseReason::Unsubscribed))
                                | Some(BusEvent::Closed(CloseReason::Evicted))
                        ));
                    }
                }
            });
        }
    });

    let stats = bus.stats();
    assert_eq!(stats.subscriptions, 0);
    assert_eq!(stats.key_entries, 0);
    assert_eq!(stats.type_entries, 0);
}

#[test]
fn test_slow_subscriber_never_blocks_publisher() {
    let bus: Bus<Tick> = Bus::with_config(BusConfig { queue_capacity: 8 }).unwrap();
    let stuck = bus.subscribe_key("tick", "t1", tick("baseline", 0, 0));
    let reader = bus.subscribe_key("tick", "t1", tick("baseline", 0, 0));
    assert!(matches!(reader.recv(), BusEvent::Value(_)));

    // Far more announcements than the stuck queue can hold; the reader keeps up.
    for seq in 1..=1_000 {
        bus.announce("tick", tick("t1", 0, seq));
        assert_eq!(reader.recv(), BusEvent::Value(tick("t1", 0, seq)));
    }

    assert_eq!(stuck.close_reason(), Some(CloseReason::Evicted));
    assert_eq!(stuck.pending(), 8);
    assert_eq!(bus.key_subscriber_count("tick", "t1"), 1);
}
