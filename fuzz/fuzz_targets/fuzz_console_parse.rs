//! Fuzz target: simulator console parser
//!
//! Feeds arbitrary UTF-8 lines to `console::parse` and checks:
//! - No panics
//! - A raw ordinal is only accepted when it fits in `u16`
//! - Named publishes always resolve to a known id
//!
//! cargo fuzz run fuzz_console_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use washer::console::{self, Command};
use washer::events::EventId;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = core::str::from_utf8(data) else {
        return;
    };
    match console::parse(line) {
        Ok(Command::Publish { id, .. }) => {
            assert_eq!(EventId::try_from(id.ordinal()).ok(), Some(id));
        }
        Ok(Command::PublishRaw { raw, .. }) => {
            let word = line.split_whitespace().nth(1).unwrap_or_default();
            assert_eq!(word.parse::<u16>().ok(), Some(raw));
        }
        _ => {}
    }
});
