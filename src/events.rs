//! Event model shared by every producer and consumer.
//!
//! An [`Event`] is a small `Copy` envelope: an [`EventId`], the thread
//! that published it, and a 32-bit [`Payload`] word.  Events are copied
//! on publish and again on every delivery; nothing downstream can mutate
//! what a producer sent.
//!
//! ```text
//! ┌──────────────┐  publish   ┌────────────┐  copy per match  ┌──────────────┐
//! │ Sensor / UI  │──────────▶│  EventBus  │────────────────▶│  Consumers   │
//! │ Timers       │            │ (A or B)   │                  │  (FSM, ...)  │
//! └──────────────┘            └────────────┘                  └──────────────┘
//! ```
//!
//! Ordinals of [`EventId`] are only meaningful inside one build.  Anything
//! that crosses a build boundary (console input, logs) uses
//! [`EventId::name`].

use core::fmt;
use std::thread::ThreadId;

use crate::error::BusError;

/// Number of valid event identifiers.  Raw ids `>= EVENT_ID_COUNT` are
/// rejected by [`EventId::try_from`].
pub const EVENT_ID_COUNT: usize = 35;

/// Every event the device knows about.  Append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum EventId {
    // ── Actuator commands ─────────────────────────────────
    /// Payload: `bool` (true = lock).
    DoorSetLock = 0,
    /// Payload: target temperature, `f32` °C.
    HeaterSetTemp = 1,
    /// Payload: target drum speed, `u32` rpm.
    MotorSetSpeed = 2,

    // ── Notifications ─────────────────────────────────────
    AnyKeyPressed = 3,
    /// Payload: message id, `i32`.
    AppMessageSent = 4,
    CancelButtonPressed = 5,
    CycleFinished = 6,
    /// Payload: wash program id, `u32`.
    CycleSelected = 7,
    /// Payload: uptime in ms, `u32`.
    DoorClosed = 8,
    DoorLocked = 9,
    /// Payload: uptime in ms, `u32`.
    DoorOpened = 10,
    DoorUnlocked = 11,
    DrumEmpty = 12,
    DosingComplete = 13,
    FatalFaultDetected = 14,
    /// Payload: current temperature, `f32` °C.
    HeaterTempChanged = 15,
    /// Payload: current drum speed, `u32` rpm.
    MotorSpeedReport = 16,
    MotorStopped = 17,
    PauseButtonPressed = 18,
    PowerButtonPressed = 19,
    PowerLossDetected = 20,
    PowerRestored = 21,
    StartButtonPressed = 22,
    SteamComplete = 23,
    SteamReady = 24,
    TempReached = 25,
    TestDoorInput = 26,
    TimerExpired = 27,
    UiButtonPausePressed = 28,
    UiButtonStartPressed = 29,
    /// Payload: wash program id, `u32`.
    UiCycleSelected = 30,
    Unknown = 31,
    /// Payload: `bool` (true = drum full).
    WaterLevelChanged = 32,
    WaterLevelReached = 33,
    WeightCalculated = 34,
}

impl EventId {
    /// All ids in ordinal order.
    pub const ALL: [EventId; EVENT_ID_COUNT] = [
        Self::DoorSetLock,
        Self::HeaterSetTemp,
        Self::MotorSetSpeed,
        Self::AnyKeyPressed,
        Self::AppMessageSent,
        Self::CancelButtonPressed,
        Self::CycleFinished,
        Self::CycleSelected,
        Self::DoorClosed,
        Self::DoorLocked,
        Self::DoorOpened,
        Self::DoorUnlocked,
        Self::DrumEmpty,
        Self::DosingComplete,
        Self::FatalFaultDetected,
        Self::HeaterTempChanged,
        Self::MotorSpeedReport,
        Self::MotorStopped,
        Self::PauseButtonPressed,
        Self::PowerButtonPressed,
        Self::PowerLossDetected,
        Self::PowerRestored,
        Self::StartButtonPressed,
        Self::SteamComplete,
        Self::SteamReady,
        Self::TempReached,
        Self::TestDoorInput,
        Self::TimerExpired,
        Self::UiButtonPausePressed,
        Self::UiButtonStartPressed,
        Self::UiCycleSelected,
        Self::Unknown,
        Self::WaterLevelChanged,
        Self::WaterLevelReached,
        Self::WeightCalculated,
    ];

    /// Ordinal of this id within the current build.
    pub const fn ordinal(self) -> u16 {
        self as u16
    }

    /// Stable symbolic name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::DoorSetLock => "DOOR_SET_LOCK",
            Self::HeaterSetTemp => "HEATER_SET_TEMP",
            Self::MotorSetSpeed => "MOTOR_SET_SPEED",
            Self::AnyKeyPressed => "ANY_KEY_PRESSED",
            Self::AppMessageSent => "APP_MESSAGE_SENT",
            Self::CancelButtonPressed => "CANCEL_BUTTON_PRESSED",
            Self::CycleFinished => "CYCLE_FINISHED",
            Self::CycleSelected => "CYCLE_SELECTED",
            Self::DoorClosed => "DOOR_CLOSED",
            Self::DoorLocked => "DOOR_LOCKED",
            Self::DoorOpened => "DOOR_OPENED",
            Self::DoorUnlocked => "DOOR_UNLOCKED",
            Self::DrumEmpty => "DRUM_EMPTY",
            Self::DosingComplete => "DOSING_COMPLETE",
            Self::FatalFaultDetected => "FATAL_FAULT_DETECTED",
            Self::HeaterTempChanged => "HEATER_TEMP_CHANGED",
            Self::MotorSpeedReport => "MOTOR_SPEED_REPORT",
            Self::MotorStopped => "MOTOR_STOPPED",
            Self::PauseButtonPressed => "PAUSE_BUTTON_PRESSED",
            Self::PowerButtonPressed => "POWER_BUTTON_PRESSED",
            Self::PowerLossDetected => "POWER_LOSS_DETECTED",
            Self::PowerRestored => "POWER_RESTORED",
            Self::StartButtonPressed => "START_BUTTON_PRESSED",
            Self::SteamComplete => "STEAM_COMPLETE",
            Self::SteamReady => "STEAM_READY",
            Self::TempReached => "TEMP_REACHED",
            Self::TestDoorInput => "TEST_DOOR_INPUT",
            Self::TimerExpired => "TIMER_EXPIRED",
            Self::UiButtonPausePressed => "UI_BUTTON_PAUSE_PRESSED",
            Self::UiButtonStartPressed => "UI_BUTTON_START_PRESSED",
            Self::UiCycleSelected => "UI_CYCLE_SELECTED",
            Self::Unknown => "UNKNOWN",
            Self::WaterLevelChanged => "WATER_LEVEL_CHANGED",
            Self::WaterLevelReached => "WATER_LEVEL_REACHED",
            Self::WeightCalculated => "WEIGHT_CALCULATED",
        }
    }

    /// Look up an id by its symbolic name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(name))
    }
}

impl TryFrom<u16> for EventId {
    type Error = BusError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .get(raw as usize)
            .copied()
            .ok_or(BusError::InvalidArgument("event id out of range"))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// One 32-bit word, read as `u32`, `i32`, `bool` or `f32` depending on
/// the event id.  The payload never records which view was written.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Payload(u32);

impl Payload {
    pub const EMPTY: Self = Self(0);

    pub const fn from_u32(v: u32) -> Self {
        Self(v)
    }

    pub const fn from_i32(v: i32) -> Self {
        Self(v as u32)
    }

    pub const fn from_bool(v: bool) -> Self {
        Self(v as u32)
    }

    pub fn from_f32(v: f32) -> Self {
        Self(v.to_bits())
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    pub const fn as_bool(self) -> bool {
        self.0 != 0
    }

    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload(0x{:08x})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Event envelope
// ---------------------------------------------------------------------------

/// Immutable event envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    /// Publishing thread, stamped by the bus.  `None` until published.
    pub sender: Option<ThreadId>,
    pub payload: Payload,
}

impl Event {
    pub const fn new(id: EventId, payload: Payload) -> Self {
        Self {
            id,
            sender: None,
            payload,
        }
    }

    /// An event whose payload carries no meaning.
    pub const fn signal(id: EventId) -> Self {
        Self::new(id, Payload::EMPTY)
    }

    /// Copy of `self` stamped with the calling thread as sender.
    pub fn stamped(self) -> Self {
        Self {
            sender: Some(std::thread::current().id()),
            ..self
        }
    }
}
