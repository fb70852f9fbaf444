//! Boot ROM selection.
//!
//! The core never embeds Nintendo's boot ROM images; a frontend that owns a
//! legally obtained dump loads the bytes and hands them to [`crate::gb::GameBoy::load_boot`].
//! This type only tags *which* boot sequence a loaded buffer represents, which
//! determines how `GameBoy` reconciles the CPU's post-boot register state.

use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootRom {
    /// No boot ROM: the machine starts from the documented post-boot
    /// register snapshot directly (the default, and the only path
    /// exercised by the test suite, since it requires no external file).
    #[default]
    None,
    /// The original 256-byte DMG boot ROM.
    Dmg,
    /// A boot ROM supplied by the caller that isn't one of the known,
    /// fixed-size images above.
    Custom,
}

impl BootRom {
    pub fn description(&self) -> &'static str {
        match self {
            BootRom::None => "None",
            BootRom::Dmg => "DMG",
            BootRom::Custom => "Custom",
        }
    }
}

impl Display for BootRom {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
