//! Callback dispatch (mode B) through the public API.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use washer::bus::{CallbackBus, EventBus, Mailbox};
use washer::config::WORK_SLAB_CAPACITY;
use washer::error::BusError;
use washer::events::{EVENT_ID_COUNT, Event, EventId, Payload};

use crate::mock_sink::{DELIVERY, fast_bus_config};

fn start() -> CallbackBus {
    CallbackBus::start(fast_bus_config()).unwrap()
}

fn eventually(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + DELIVERY;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn handlers_run_in_submission_order() {
    let bus = start();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    bus.register_handler(
        move |ev: &Event| s.lock().unwrap().push((ev.id, ev.payload.as_u32())),
        &[EventId::TimerExpired, EventId::DrumEmpty],
    )
    .unwrap();

    for i in 0..10 {
        let id = if i % 2 == 0 { EventId::TimerExpired } else { EventId::DrumEmpty };
        bus.publish(Event::new(id, Payload::from_u32(i))).unwrap();
    }
    assert!(eventually(|| seen.lock().unwrap().len() == 10));

    let seen = seen.lock().unwrap();
    for (i, (id, v)) in seen.iter().enumerate() {
        assert_eq!(*v, i as u32);
        let want = if i % 2 == 0 { EventId::TimerExpired } else { EventId::DrumEmpty };
        assert_eq!(*id, want);
    }
}

#[test]
fn duplicate_interests_across_handlers_each_fire() {
    let bus = start();
    let hits = Arc::new(AtomicU32::new(0));
    for _ in 0..3 {
        let h = hits.clone();
        bus.register_handler(
            move |_: &Event| {
                h.fetch_add(1, Ordering::SeqCst);
            },
            &[EventId::TempReached],
        )
        .unwrap();
    }
    bus.publish(Event::signal(EventId::TempReached)).unwrap();
    assert!(eventually(|| hits.load(Ordering::SeqCst) == 3));
    assert_eq!(bus.handler_count(), 3);
}

#[test]
fn invalid_raw_id_is_rejected() {
    let bus = start();
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    bus.register_handler(
        move |_: &Event| {
            h.fetch_add(1, Ordering::SeqCst);
        },
        &EventId::ALL[..24],
    )
    .unwrap();

    assert!(matches!(
        bus.publish_raw(EVENT_ID_COUNT as u16, Payload::EMPTY),
        Err(BusError::InvalidArgument(_))
    ));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn attached_mailbox_is_fed_without_blocking_the_worker() {
    let bus = start();
    let small = Arc::new(Mailbox::<2>::new());
    bus.attach(small.clone(), &[EventId::MotorStopped]).unwrap();

    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    bus.register_handler(
        move |_: &Event| {
            h.fetch_add(1, Ordering::SeqCst);
        },
        &[EventId::MotorStopped],
    )
    .unwrap();

    for _ in 0..5 {
        bus.publish(Event::signal(EventId::MotorStopped)).unwrap();
    }
    // The worker keeps going even though the mailbox overflowed.
    assert!(eventually(|| hits.load(Ordering::SeqCst) == 5));
    assert_eq!(small.len(), 2);
}

#[test]
fn one_free_slot_serves_the_first_handler_and_drops_the_second() {
    let bus = start();

    // Worker parks in this handler, so its slots stay claimed.
    let gate = Arc::new(AtomicBool::new(false));
    let g = gate.clone();
    bus.register_handler(
        move |_: &Event| {
            while !g.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
        },
        &[EventId::SteamReady],
    )
    .unwrap();

    let first = Arc::new(AtomicU32::new(0));
    let second = Arc::new(AtomicU32::new(0));
    for counter in [first.clone(), second.clone()] {
        bus.register_handler(
            move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            &[EventId::TempReached],
        )
        .unwrap();
    }

    for _ in 0..WORK_SLAB_CAPACITY - 1 {
        bus.publish(Event::signal(EventId::SteamReady)).unwrap();
    }
    assert_eq!(bus.in_flight(), WORK_SLAB_CAPACITY - 1);

    assert_eq!(
        bus.publish(Event::signal(EventId::TempReached)),
        Err(BusError::CapacityExceeded("work item slab"))
    );
    assert_eq!(bus.dropped_deliveries(), 1);
    assert_eq!(bus.in_flight(), WORK_SLAB_CAPACITY);

    gate.store(true, Ordering::SeqCst);
    assert!(eventually(|| first.load(Ordering::SeqCst) == 1));
    assert!(eventually(|| bus.in_flight() == 0));
    assert_eq!(second.load(Ordering::SeqCst), 0);

    // With the slab free again both handlers are served.
    bus.publish(Event::signal(EventId::TempReached)).unwrap();
    assert!(eventually(|| first.load(Ordering::SeqCst) == 2 && second.load(Ordering::SeqCst) == 1));
}
