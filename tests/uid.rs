use dmxp_dispatch::{Message, UidGenerator};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn uids_strictly_increase_and_respect_floor() {
    let uids = Arc::new(UidGenerator::with_floor(100));

    let mut last = None;
    for _ in 0..1000 {
        let message = Message::builder(7)
            .uid_generator(Arc::clone(&uids))
            .build()
            .unwrap();
        assert!(message.uid() >= 100);
        if let Some(prev) = last {
            assert!(message.uid() > prev, "uid {} not after {}", message.uid(), prev);
        }
        last = Some(message.uid());
    }
    assert_eq!(last, Some(1099));
}

#[test]
fn uid_wraps_to_floor_at_overflow() {
    let uids = UidGenerator::starting_at(5, i64::MAX - 1);

    assert_eq!(uids.next_uid(), i64::MAX - 1);
    assert_eq!(uids.next_uid(), i64::MAX);
    assert_eq!(uids.next_uid(), 5);
    assert_eq!(uids.next_uid(), 6);
}

#[test]
fn start_below_floor_is_raised() {
    let uids = UidGenerator::starting_at(10, -3);
    assert_eq!(uids.peek(), 10);
    assert_eq!(uids.next_uid(), 10);
}

#[test]
fn global_generator_is_monotonic_per_thread() {
    let first = Message::new(1).uid();
    let second = Message::new(1).uid();
    let third = Message::builder(1).build().unwrap().uid();

    assert!(first >= UidGenerator::global().floor());
    assert!(second > first);
    assert!(third > second);
}

#[test]
fn concurrent_generation_yields_unique_uids() {
    let uids = Arc::new(UidGenerator::new());
    let threads = 8;
    let per_thread = 500;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let uids = Arc::clone(&uids);
            thread::spawn(move || {
                let mut mine = Vec::with_capacity(per_thread);
                for _ in 0..per_thread {
                    mine.push(uids.next_uid());
                }
                // Each thread still sees its own uids in increasing order.
                assert!(mine.windows(2).all(|w| w[0] < w[1]));
                mine
            })
        })
        .collect();

    let mut all = HashSet::new();
    for h in handles {
        for uid in h.join().unwrap() {
            assert!(all.insert(uid), "duplicate uid {}", uid);
        }
    }
    assert_eq!(all.len(), threads * per_thread);
}
