//! The FSM controller driven end to end through both dispatchers, plus
//! the door sensor feeding the door monitor.

use std::sync::Arc;
use std::time::Duration;

use washer::app::controller::{self, ControllerHandle};
use washer::app::events::AppEvent;
use washer::bus::{Attachment, CallbackBus, EventBus, Mailbox, QueuedBus};
use washer::config::DeviceConfig;
use washer::events::{Event, EventId, Payload};
use washer::fsm::{SystemState, WashCycleState, WashProgram};
use washer::sensors::door::{DoorMonitor, DoorSensor, DoorState};
use washer::sensors::sim::SimInput;

use crate::mock_sink::{DELIVERY, RecordingSink, fast_bus_config};

fn config() -> DeviceConfig {
    DeviceConfig {
        bus: fast_bus_config(),
        ..DeviceConfig::default()
    }
}

/// Publish `id` and wait until the controller has consumed it, so a
/// callback-mode mailbox never overflows.
fn step(bus: &impl EventBus, ctl: &ControllerHandle, id: EventId, payload: u32) {
    let before = ctl.snapshot().events_processed;
    bus.publish(Event::new(id, Payload::from_u32(payload))).unwrap();
    ctl.wait_for(DELIVERY, |s| s.events_processed > before)
        .unwrap_or_else(|| panic!("controller never processed {id}"));
}

/// Power on, pick Quick, start and walk the wash cycle to the end.
/// Quick has no optional phases, so every branch state resolves to its
/// mandatory successor on the next event.
fn run_quick_cycle(bus: &impl EventBus, ctl: &ControllerHandle, sink: &RecordingSink) {
    step(bus, ctl, EventId::PowerButtonPressed, 0);
    step(bus, ctl, EventId::CycleSelected, WashProgram::Quick.id());
    step(bus, ctl, EventId::StartButtonPressed, 0);
    let snap = ctl.snapshot();
    assert_eq!(snap.system_state, SystemState::Running);
    assert_eq!(snap.wash_cycle_state, WashCycleState::LoadSensing);
    assert_eq!(snap.selected, Some(WashProgram::Quick));

    let cycle = [
        (EventId::WeightCalculated, WashCycleState::Dosing),
        (EventId::DosingComplete, WashCycleState::PrewashCheck),
        (EventId::TimerExpired, WashCycleState::Filling),
        (EventId::WaterLevelReached, WashCycleState::HeatingCheck),
        (EventId::TimerExpired, WashCycleState::Washing),
        (EventId::TimerExpired, WashCycleState::DrainingWash),
        (EventId::DrumEmpty, WashCycleState::Rinsing),
        (EventId::TimerExpired, WashCycleState::DrainingRinse),
        (EventId::DrumEmpty, WashCycleState::Spinning),
        (EventId::TimerExpired, WashCycleState::SteamCheck),
        (EventId::TimerExpired, WashCycleState::Complete),
    ];
    for (id, want) in cycle {
        step(bus, ctl, id, 0);
        assert_eq!(ctl.snapshot().wash_cycle_state, want, "after {id}");
    }

    let snap = ctl.snapshot();
    assert_eq!(snap.system_state, SystemState::End);
    assert!(sink.contains(&AppEvent::CycleFinished));
    assert!(sink.contains(&AppEvent::ProgramSelected(WashProgram::Quick)));
    assert!(sink.contains(&AppEvent::SystemStateChanged {
        from: SystemState::Running,
        to: SystemState::End,
    }));

    let visited: Vec<_> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AppEvent::WashStateChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert!(!visited.contains(&WashCycleState::Prewash));
    assert!(!visited.contains(&WashCycleState::Heating));
    assert!(!visited.contains(&WashCycleState::Steaming));
}

#[test]
fn quick_cycle_completes_over_the_queued_bus() {
    let bus = Arc::new(QueuedBus::start(fast_bus_config()).unwrap());
    let sink = RecordingSink::new();
    let ctl = controller::spawn(bus.clone(), sink.clone(), &config()).unwrap();
    assert!(matches!(ctl.attachment(), Attachment::Subscription(_)));
    assert!(sink.wait_for(
        &AppEvent::Started {
            system: SystemState::PowerOff,
            wash: WashCycleState::Idle,
        },
        DELIVERY
    ));

    run_quick_cycle(&*bus, &ctl, &sink);
}

#[test]
fn quick_cycle_completes_over_the_callback_bus() {
    let bus = Arc::new(CallbackBus::start(fast_bus_config()).unwrap());
    let sink = RecordingSink::new();
    let ctl = controller::spawn(bus.clone(), sink.clone(), &config()).unwrap();
    assert!(matches!(ctl.attachment(), Attachment::Handler(_)));

    run_quick_cycle(&*bus, &ctl, &sink);
}

#[test]
fn pause_keeps_the_wash_position_and_cancel_resets_it() {
    let bus = Arc::new(QueuedBus::start(fast_bus_config()).unwrap());
    let sink = RecordingSink::new();
    let ctl = controller::spawn(bus.clone(), sink.clone(), &config()).unwrap();

    step(&*bus, &ctl, EventId::PowerButtonPressed, 0);
    step(&*bus, &ctl, EventId::CycleSelected, WashProgram::Cotton.id());
    step(&*bus, &ctl, EventId::StartButtonPressed, 0);
    step(&*bus, &ctl, EventId::WeightCalculated, 0);
    assert_eq!(ctl.snapshot().wash_cycle_state, WashCycleState::Dosing);

    step(&*bus, &ctl, EventId::PauseButtonPressed, 0);
    let snap = ctl.snapshot();
    assert_eq!(snap.system_state, SystemState::Paused);
    assert_eq!(snap.wash_cycle_state, WashCycleState::Dosing);

    // Cycle events are ignored while paused.
    step(&*bus, &ctl, EventId::DosingComplete, 0);
    assert_eq!(ctl.snapshot().wash_cycle_state, WashCycleState::Dosing);

    step(&*bus, &ctl, EventId::CancelButtonPressed, 0);
    let snap = ctl.snapshot();
    assert_eq!(snap.system_state, SystemState::Selection);
    assert_eq!(snap.wash_cycle_state, WashCycleState::Idle);
    assert!(sink.contains(&AppEvent::WashStateChanged {
        from: WashCycleState::Dosing,
        to: WashCycleState::Idle,
    }));
}

#[test]
fn unknown_program_id_is_ignored_but_selection_proceeds() {
    let bus = Arc::new(QueuedBus::start(fast_bus_config()).unwrap());
    let sink = RecordingSink::new();
    let ctl = controller::spawn(bus.clone(), sink.clone(), &config()).unwrap();

    step(&*bus, &ctl, EventId::PowerButtonPressed, 0);
    step(&*bus, &ctl, EventId::CycleSelected, 99);
    let snap = ctl.snapshot();
    assert_eq!(snap.system_state, SystemState::Selection);
    assert_eq!(snap.selected, None);
    assert!(
        !sink
            .events()
            .iter()
            .any(|e| matches!(e, AppEvent::ProgramSelected(_)))
    );
}

#[test]
fn door_sensor_changes_reach_the_monitor() {
    let bus = QueuedBus::start(fast_bus_config()).unwrap();
    let monitor = DoorMonitor::attach(&bus).unwrap();
    assert_eq!(monitor.last_event(), EventId::Unknown);

    let pin = SimInput::new(true);
    let mut door = DoorSensor::new(pin.clone());
    assert_eq!(door.state(), DoorState::Closed);
    assert_eq!(door.poll(&bus, 10), None);

    pin.set(false);
    assert_eq!(door.poll(&bus, 20), Some(DoorState::Open));
    assert_eq!(door.poll(&bus, 30), None);

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(monitor.drain(), 1);
    assert_eq!(monitor.last_event(), EventId::DoorOpened);

    pin.set(true);
    assert_eq!(door.poll(&bus, 40), Some(DoorState::Closed));
    bus.publish(Event::signal(EventId::TestDoorInput)).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(monitor.drain(), 2);
    assert_eq!(monitor.last_event(), EventId::TestDoorInput);

    bus.detach(monitor.attachment()).unwrap();
    assert_eq!(bus.subscription_count(), Some(0));
}

#[test]
fn queued_bus_keeps_serving_after_controller_shutdown() {
    let bus = Arc::new(QueuedBus::start(fast_bus_config()).unwrap());
    let sink = RecordingSink::new();
    let mut ctl = controller::spawn(bus.clone(), sink.clone(), &config()).unwrap();
    step(&*bus, &ctl, EventId::PowerButtonPressed, 0);

    ctl.shutdown();
    assert_eq!(bus.subscription_count(), Some(0));

    // More than the controller mailbox holds; nobody is left to take them.
    for _ in 0..20 {
        bus.publish(Event::signal(EventId::TimerExpired)).unwrap();
    }

    let late = Arc::new(Mailbox::<4>::new());
    bus.attach(late.clone(), &[EventId::DoorOpened]).unwrap();
    bus.publish(Event::signal(EventId::DoorOpened)).unwrap();
    let got = late.recv_timeout(DELIVERY).expect("dispatcher stalled");
    assert_eq!(got.id, EventId::DoorOpened);
}

#[test]
fn callback_bus_stops_feeding_a_shut_down_controller() {
    let bus = Arc::new(CallbackBus::start(fast_bus_config()).unwrap());
    let sink = RecordingSink::new();
    let mut ctl = controller::spawn(bus.clone(), sink.clone(), &config()).unwrap();
    step(&*bus, &ctl, EventId::PowerButtonPressed, 0);
    let processed = ctl.snapshot().events_processed;

    ctl.shutdown();
    assert_eq!(ctl.backlog(), 0);
    bus.publish(Event::signal(EventId::CycleSelected)).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(ctl.backlog(), 0);
    assert_eq!(ctl.snapshot().events_processed, processed);
}

#[test]
fn wait_for_returns_as_soon_as_the_state_changes() {
    let bus = Arc::new(QueuedBus::start(fast_bus_config()).unwrap());
    let ctl = controller::spawn(bus.clone(), RecordingSink::new(), &config()).unwrap();

    let publisher = bus.clone();
    let late = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        publisher
            .publish(Event::signal(EventId::PowerButtonPressed))
            .unwrap();
    });

    let start = std::time::Instant::now();
    let snap = ctl
        .wait_for(Duration::from_secs(5), |s| s.system_state == SystemState::Standby)
        .expect("controller never left PowerOff");
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(snap.events_processed, 1);
    late.join().unwrap();

    let start = std::time::Instant::now();
    assert!(ctl
        .wait_for(Duration::from_millis(60), |s| s.system_state == SystemState::Running)
        .is_none());
    assert!(start.elapsed() >= Duration::from_millis(55));
}
