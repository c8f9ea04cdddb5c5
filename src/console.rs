//! Simulator console commands.
//!
//! One command per line, whitespace separated, case-insensitive:
//!
//! ```text
//!   door open|close            set the simulated door switch
//!   water empty|full           set the simulated drum level switch
//!   door_state | water_state   print a simulated input
//!   publish <EVENT> [value]    publish by name (or raw ordinal)
//!   state                      print the FSM snapshot
//!   help | quit
//! ```
//!
//! Parsing is pure; the binary executes the resulting [`Command`].

use crate::error::CommandError;
use crate::events::{EventId, Payload};

pub const HELP: &str = "\
commands:
  door open|close            set the simulated door switch
  water empty|full           set the simulated drum level switch
  door_state                 show the simulated door switch
  water_state                show the simulated drum level switch
  publish <EVENT> [value]    publish an event (name or ordinal); value is
                             true|false, u32 (dec or 0x hex), i32 or f32
  state                      show the FSM state
  help                       this text
  quit                       shut down and exit";

const DOOR_USAGE: &str = "door open|close";
const WATER_USAGE: &str = "water empty|full";
const PUBLISH_USAGE: &str = "publish <EVENT> [value]";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Blank line.
    Nothing,
    Door { closed: bool },
    Water { full: bool },
    DoorState,
    WaterState,
    Publish { id: EventId, payload: Payload },
    /// Ordinal given instead of a name; range is checked by the bus.
    PublishRaw { raw: u16, payload: Payload },
    State,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(Command::Nothing);
    };

    let command = match cmd.to_ascii_lowercase().as_str() {
        "door" => {
            let closed = match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("close" | "closed") => true,
                Some("open") => false,
                Some(_) => return Err(CommandError::BadArgument(DOOR_USAGE)),
                None => return Err(CommandError::MissingArgument(DOOR_USAGE)),
            };
            Command::Door { closed }
        }
        "water" => {
            let full = match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("full") => true,
                Some("empty") => false,
                Some(_) => return Err(CommandError::BadArgument(WATER_USAGE)),
                None => return Err(CommandError::MissingArgument(WATER_USAGE)),
            };
            Command::Water { full }
        }
        "door_state" => Command::DoorState,
        "water_state" => Command::WaterState,
        "publish" | "pub" => {
            let target = words
                .next()
                .ok_or(CommandError::MissingArgument(PUBLISH_USAGE))?;
            let payload = match words.next() {
                Some(v) => parse_payload(v).ok_or(CommandError::BadArgument(PUBLISH_USAGE))?,
                None => Payload::EMPTY,
            };
            if let Ok(raw) = target.parse::<u16>() {
                Command::PublishRaw { raw, payload }
            } else {
                let id = EventId::from_name(target).ok_or(CommandError::UnknownEvent)?;
                Command::Publish { id, payload }
            }
        }
        "state" => Command::State,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => return Err(CommandError::UnknownCommand),
    };

    if words.next().is_some() {
        return Err(CommandError::BadArgument(usage(&command)));
    }
    Ok(command)
}

fn usage(command: &Command) -> &'static str {
    match command {
        Command::Door { .. } => DOOR_USAGE,
        Command::Water { .. } => WATER_USAGE,
        Command::Publish { .. } | Command::PublishRaw { .. } => PUBLISH_USAGE,
        _ => "command takes no arguments",
    }
}

/// `true`/`false`, then unsigned (decimal or `0x` hex), signed, float.
fn parse_payload(s: &str) -> Option<Payload> {
    match s.to_ascii_lowercase().as_str() {
        "true" => return Some(Payload::from_bool(true)),
        "false" => return Some(Payload::from_bool(false)),
        _ => {}
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok().map(Payload::from_u32);
    }
    if let Ok(v) = s.parse::<u32>() {
        return Some(Payload::from_u32(v));
    }
    if let Ok(v) = s.parse::<i32>() {
        return Some(Payload::from_i32(v));
    }
    s.parse::<f32>().ok().map(Payload::from_f32)
}
