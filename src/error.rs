//! Unified error types for the washer control core.
//!
//! Every fallible bus operation returns [`BusError`].  All variants are
//! `Copy` so they can be logged, compared in tests and handed back to the
//! publishing thread without allocation.  The FSM has no error path: an
//! event with no matching transition is a no-op, not a failure.

use core::fmt;

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

/// Errors returned by the event bus (both dispatch modes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Empty target, empty or oversized interest set, out-of-range event
    /// id, or a stale subscription handle.  Never worth retrying.
    InvalidArgument(&'static str),
    /// A fixed-capacity pool is full (subscription pool, handler table or
    /// work-item slab).  The caller decides whether to retry.
    CapacityExceeded(&'static str),
    /// The central queue stayed full for the whole publish wait.
    /// Backpressure; safe to retry.
    QueueFull,
    /// The registry lock could not be acquired within the bounded wait.
    LockTimeout,
    /// A bus thread could not be created during start-up.
    Spawn,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::CapacityExceeded(what) => write!(f, "capacity exceeded: {what}"),
            Self::QueueFull => write!(f, "central queue full"),
            Self::LockTimeout => write!(f, "registry lock timed out"),
            Self::Spawn => write!(f, "failed to spawn bus thread"),
        }
    }
}

impl std::error::Error for BusError {}

impl BusError {
    /// Whether the failed call may succeed if simply repeated later.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::QueueFull | Self::LockTimeout | Self::CapacityExceeded(_))
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from loading or validating [`DeviceConfig`](crate::config::DeviceConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.
    /// The `&'static str` names the field and the rule.
    ValidationFailed(&'static str),
    /// The stored config could not be parsed.
    Corrupted,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Corrupted => write!(f, "config corrupted"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Console errors
// ---------------------------------------------------------------------------

/// Errors from parsing a simulator console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// First word is not a known command.
    UnknownCommand,
    /// A required argument is missing.  Carries the usage line.
    MissingArgument(&'static str),
    /// An argument is present but not acceptable.  Carries the usage line.
    BadArgument(&'static str),
    /// `publish` named an event that does not exist.
    UnknownEvent,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "unknown command (try `help`)"),
            Self::MissingArgument(usage) => write!(f, "missing argument, usage: {usage}"),
            Self::BadArgument(usage) => write!(f, "bad argument, usage: {usage}"),
            Self::UnknownEvent => write!(f, "unknown event name"),
        }
    }
}

impl std::error::Error for CommandError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Bus-wide `Result` alias.
pub type Result<T> = core::result::Result<T, BusError>;
