//! Washer simulator: the control core wired to simulated inputs.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  stdin console ──▶ SimInput (door, water)   publish <EVENT>       │
//! │                        │                          │               │
//! │  sensor thread (edge-executor)                    │               │
//! │    DoorSensor · WaterLevelSensor · DoorMonitor    │               │
//! │                        │                          ▼               │
//! │                        └────────────▶  DefaultBus (queued|callback)│
//! │                                                   │               │
//! │                          FSM controller thread ◀──┘               │
//! │                            └─▶ LogEventSink                       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{error, info, warn};

use washer::adapters::log_sink::LogEventSink;
use washer::app::controller;
use washer::bus::{DefaultBus, EventBus};
use washer::config::DeviceConfig;
use washer::console::{self, Command};
use washer::drivers::task_pin::{self, Core, TaskHandle};
use washer::events::Event;
use washer::sensors::door::{DoorMonitor, DoorSensor};
use washer::sensors::sim::SimInput;
use washer::sensors::water_level::WaterLevelSensor;
use washer::wait::millis;

// ── Logging ───────────────────────────────────────────────────

#[cfg(feature = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(all(not(feature = "espidf"), feature = "sim"))]
fn init_logging() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    // `init` also routes `log` records into the subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logger init failed: {e}"))
}

#[cfg(all(not(feature = "espidf"), not(feature = "sim")))]
fn init_logging() -> Result<()> {
    Ok(())
}

// ── Config ────────────────────────────────────────────────────

/// First argument, if any, is a JSON config file.
fn load_config() -> Result<DeviceConfig> {
    let Some(path) = std::env::args().nth(1) else {
        info!("No config file given, using defaults");
        return Ok(DeviceConfig::default());
    };
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("reading config file {path}"))?;
    let config = DeviceConfig::from_json(&text).with_context(|| format!("loading {path}"))?;
    info!("Config loaded from {}", path);
    Ok(config)
}

// ── Sensor thread ─────────────────────────────────────────────

struct SimInputs {
    door: SimInput,
    water: SimInput,
}

fn spawn_sensors(
    bus: Arc<DefaultBus>,
    inputs: &SimInputs,
    monitor: Arc<DoorMonitor>,
    config: &DeviceConfig,
    stop: Arc<AtomicBool>,
) -> Result<TaskHandle> {
    let mut door = DoorSensor::new(inputs.door.clone());
    let mut water = WaterLevelSensor::new(inputs.water.clone());
    let door_every = millis(config.door_poll_interval_ms);
    let water_every = millis(config.water_poll_interval_ms);
    let poll = millis(config.bus.dispatcher_poll_ms);
    let boot = Instant::now();

    let handle = task_pin::spawn_on_core(Core::Pro, 5, 8, "sensors\0", move || {
        let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

        executor
            .spawn(door.run(&*bus, door_every, boot, &stop))
            .detach();
        executor
            .spawn(water.run(&*bus, water_every, &stop))
            .detach();
        executor.spawn(monitor.run(poll, &stop)).detach();

        info!("Sensor tasks started");
        futures_lite::future::block_on(executor.run(async {
            while !stop.load(Ordering::Acquire) {
                async_io_mini::Timer::after(Duration::from_millis(50)).await;
            }
        }));
        info!("Sensor tasks stopped");
    })?;
    Ok(handle)
}

// ── Console ───────────────────────────────────────────────────

fn execute(
    command: Command,
    bus: &DefaultBus,
    inputs: &SimInputs,
    monitor: &DoorMonitor,
    controller: &controller::ControllerHandle,
) -> bool {
    match command {
        Command::Nothing => {}
        Command::Door { closed } => {
            inputs.door.set(closed);
            println!("Door state: {}", if closed { "close" } else { "open" });
        }
        Command::Water { full } => {
            inputs.water.set(full);
            println!("Water level: {}", if full { "full" } else { "empty" });
        }
        Command::DoorState => {
            let closed = inputs.door.get();
            println!(
                "Door is currently: {} (last event {})",
                if closed { "closed" } else { "open" },
                monitor.last_event()
            );
        }
        Command::WaterState => {
            let full = inputs.water.get();
            println!("Water level is currently: {}", if full { "full" } else { "empty" });
        }
        Command::Publish { id, payload } => match bus.publish(Event::new(id, payload)) {
            Ok(()) => println!("published {id}"),
            Err(e) => println!("publish {id} failed: {e}"),
        },
        Command::PublishRaw { raw, payload } => match bus.publish_raw(raw, payload) {
            Ok(()) => println!("published #{raw}"),
            Err(e) => println!("publish #{raw} failed: {e}"),
        },
        Command::State => {
            let s = controller.snapshot();
            println!(
                "system={} wash={} program={} events={} backlog={}",
                s.system_state,
                s.wash_cycle_state,
                s.selected.map_or("(default)", |p| p.name()),
                s.events_processed,
                controller.backlog()
            );
        }
        Command::Help => println!("{}", console::HELP),
        Command::Quit => return false,
    }
    true
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_logging()?;
    info!("Washer simulator v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    let bus = Arc::new(DefaultBus::start(config.bus.clone()).context("starting event bus")?);
    let mut fsm = controller::spawn(bus.clone(), LogEventSink::new(), &config)
        .context("starting FSM controller")?;
    let monitor = DoorMonitor::attach(&*bus).context("attaching door monitor")?;

    // Door starts open, drum empty.
    let inputs = SimInputs {
        door: SimInput::new(false),
        water: SimInput::new(false),
    };
    let stop = Arc::new(AtomicBool::new(false));
    let sensors = spawn_sensors(bus.clone(), &inputs, monitor.clone(), &config, stop.clone())?;

    println!("{}", console::HELP);
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        match console::parse(&line) {
            Ok(command) => {
                if !execute(command, &bus, &inputs, &monitor, &fsm) {
                    break;
                }
            }
            Err(e) => println!("{e}"),
        }
    }

    info!("Shutting down");
    stop.store(true, Ordering::Release);
    if !task_pin::join_bounded(sensors, millis(config.bus.shutdown_join_ms)) {
        warn!("Sensor thread did not stop in time");
    }
    if let Err(e) = bus.detach(monitor.attachment()) {
        warn!("Failed to detach door monitor: {}", e);
    }
    fsm.shutdown();
    match Arc::try_unwrap(bus) {
        Ok(mut bus) => bus.shutdown(),
        Err(_) => error!("Event bus still shared at exit; dispatcher left running"),
    }
    Ok(())
}
