//! Wash program presets.
//!
//! A `CycleSelected` event carries the program id in its `u32` payload.
//! Each preset fixes the three optional phases the branch states consult.

use core::fmt;

use super::Program;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WashProgram {
    /// Cold, no options.
    Quick = 0,
    /// Heated main wash.
    Cotton = 1,
    /// Prewash, heating and a steam finish.
    Intensive = 2,
    /// Unheated wash with a steam finish.
    Refresh = 3,
}

impl WashProgram {
    pub const ALL: [WashProgram; 4] = [Self::Quick, Self::Cotton, Self::Intensive, Self::Refresh];

    pub const fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Quick),
            1 => Some(Self::Cotton),
            2 => Some(Self::Intensive),
            3 => Some(Self::Refresh),
            _ => None,
        }
    }

    pub const fn id(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Quick => "Quick",
            Self::Cotton => "Cotton",
            Self::Intensive => "Intensive",
            Self::Refresh => "Refresh",
        }
    }

    pub const fn program(self) -> Program {
        let (has_prewash, has_heating, has_steam) = match self {
            Self::Quick => (false, false, false),
            Self::Cotton => (false, true, false),
            Self::Intensive => (true, true, true),
            Self::Refresh => (false, false, true),
        };
        Program {
            has_prewash,
            has_heating,
            has_steam,
        }
    }
}

impl fmt::Display for WashProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
