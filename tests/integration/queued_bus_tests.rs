//! Queued dispatch (mode A) through the public API.

use std::sync::Arc;
use std::time::Duration;

use washer::bus::{DeliveryTarget, EventBus, Mailbox, QueuedBus};
use washer::config::MAX_SUBSCRIPTIONS;
use washer::error::BusError;
use washer::events::{EVENT_ID_COUNT, Event, EventId, Payload};

use crate::mock_sink::{DELIVERY, fast_bus_config};

fn start() -> QueuedBus {
    QueuedBus::start(fast_bus_config()).unwrap()
}

#[test]
fn every_matching_subscriber_gets_one_bit_identical_copy() {
    let bus = start();
    let a = Arc::new(Mailbox::<8>::new());
    let b = Arc::new(Mailbox::<8>::new());
    let other = Arc::new(Mailbox::<8>::new());
    bus.subscribe(a.clone(), &[EventId::HeaterSetTemp]).unwrap();
    bus.subscribe(b.clone(), &[EventId::MotorSetSpeed, EventId::HeaterSetTemp])
        .unwrap();
    bus.subscribe(other.clone(), &[EventId::MotorSetSpeed]).unwrap();

    let payload = Payload::from_f32(-12.625);
    bus.publish(Event::new(EventId::HeaterSetTemp, payload)).unwrap();

    for mb in [&a, &b] {
        let ev = mb.recv_timeout(DELIVERY).expect("missing delivery");
        assert_eq!(ev.id, EventId::HeaterSetTemp);
        assert_eq!(ev.payload, payload);
        assert_eq!(ev.payload.as_f32().to_bits(), (-12.625f32).to_bits());
        assert!(mb.recv_timeout(Duration::from_millis(50)).is_none(), "duplicate delivery");
    }
    assert!(other.try_recv().is_none());
}

#[test]
fn out_of_range_raw_id_is_rejected_and_never_delivered() {
    let bus = start();
    let mb = Arc::new(Mailbox::<8>::new());
    bus.subscribe(mb.clone(), &EventId::ALL[..24]).unwrap();

    let err = bus.publish_raw(EVENT_ID_COUNT as u16, Payload::from_u32(1));
    assert!(matches!(err, Err(BusError::InvalidArgument(_))));
    assert!(mb.recv_timeout(Duration::from_millis(100)).is_none());

    bus.publish_raw(EventId::DoorSetLock.ordinal(), Payload::from_bool(true))
        .unwrap();
    assert_eq!(mb.recv_timeout(DELIVERY).unwrap().id, EventId::DoorSetLock);
}

#[test]
fn nothing_arrives_after_unsubscribe() {
    let bus = start();
    let mb = Arc::new(Mailbox::<8>::new());
    let handle = bus.subscribe(mb.clone(), &[EventId::DrumEmpty]).unwrap();

    bus.publish(Event::signal(EventId::DrumEmpty)).unwrap();
    assert!(mb.recv_timeout(DELIVERY).is_some());

    bus.unsubscribe(handle).unwrap();
    bus.publish(Event::signal(EventId::DrumEmpty)).unwrap();
    assert!(mb.recv_timeout(Duration::from_millis(150)).is_none());

    assert!(matches!(bus.unsubscribe(handle), Err(BusError::InvalidArgument(_))));
}

#[test]
fn pool_rejects_one_past_capacity_and_recovers() {
    let bus = start();
    let mut handles = Vec::new();
    for _ in 0..MAX_SUBSCRIPTIONS {
        let mb: Arc<dyn DeliveryTarget> = Arc::new(Mailbox::<2>::new());
        handles.push(bus.subscribe(mb, &[EventId::TimerExpired]).unwrap());
    }
    assert_eq!(bus.subscription_count(), Some(MAX_SUBSCRIPTIONS));

    let extra = Arc::new(Mailbox::<2>::new());
    assert_eq!(
        bus.subscribe(extra.clone(), &[EventId::TimerExpired]),
        Err(BusError::CapacityExceeded("subscription pool"))
    );

    bus.unsubscribe(handles[3]).unwrap();
    let reused = bus.subscribe(extra, &[EventId::TimerExpired]).unwrap();
    assert_eq!(reused.slot(), handles[3].slot());
    assert_ne!(reused, handles[3]);
}

#[test]
fn backpressure_delivers_everything_in_order() {
    const K: u32 = 200;
    let bus = start();
    let mb = Arc::new(Mailbox::<4>::new());
    bus.subscribe(mb.clone(), &[EventId::MotorSpeedReport]).unwrap();

    let consumer = {
        let mb = mb.clone();
        std::thread::spawn(move || {
            let mut got = Vec::new();
            while got.len() < K as usize {
                let ev = mb.recv_timeout(Duration::from_secs(5)).expect("stalled");
                got.push(ev.payload.as_u32());
                if got.len() % 16 == 0 {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
            got
        })
    };

    for i in 0..K {
        let event = Event::new(EventId::MotorSpeedReport, Payload::from_u32(i));
        loop {
            match bus.publish(event) {
                Ok(()) => break,
                Err(BusError::QueueFull) => continue,
                Err(e) => panic!("unexpected publish error: {e}"),
            }
        }
    }

    let got = consumer.join().unwrap();
    assert_eq!(got, (0..K).collect::<Vec<_>>());
}

#[test]
fn per_publisher_order_survives_concurrent_producers() {
    const PER_PRODUCER: u32 = 50;
    let bus = Arc::new(start());
    let mb = Arc::new(Mailbox::<64>::new());
    bus.subscribe(mb.clone(), &[EventId::WeightCalculated]).unwrap();

    let producers: Vec<_> = (0..3u32)
        .map(|p| {
            let bus = bus.clone();
            std::thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let ev = Event::new(EventId::WeightCalculated, Payload::from_u32(p << 16 | i));
                    while bus.publish(ev) == Err(BusError::QueueFull) {}
                }
            })
        })
        .collect();

    let mut next = [0u32; 3];
    for _ in 0..3 * PER_PRODUCER {
        let ev = mb.recv_timeout(DELIVERY).expect("missing event");
        let v = ev.payload.as_u32();
        let (p, i) = ((v >> 16) as usize, v & 0xffff);
        assert_eq!(i, next[p], "producer {p} reordered");
        next[p] += 1;
    }
    for p in producers {
        p.join().unwrap();
    }
}

#[test]
fn full_mailbox_stalls_dispatch_but_not_publishers() {
    let bus = start();
    let slow = Arc::new(Mailbox::<1>::new());
    bus.subscribe(slow.clone(), &[EventId::SteamComplete]).unwrap();

    // 1 in the mailbox, 1 held by the blocked dispatcher, the rest queued.
    for _ in 0..10 {
        bus.publish(Event::signal(EventId::SteamComplete)).unwrap();
    }
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(slow.len(), 1);
    assert!(bus.pending() >= 8);

    for _ in 0..10 {
        assert!(slow.recv_timeout(DELIVERY).is_some());
    }
}
