//! Error related data structures.

use std::fmt::{self, Display, Formatter};

/// Top level enum for error handling within the emulator core.
///
/// Most of the time, you will want to use the `CustomError` variant
/// to provide a more detailed error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The ROM header declares a size that does not match the
    /// actual byte length of the loaded data, or declares an
    /// MBC variant that is not supported.
    RomFormat(String),
    /// The CPU fetched one of the undefined SM83 opcodes
    /// (`D3`, `DB`, `DD`, `E3`, `E4`, `EB`, `EC`, `ED`, `F4`, `FC`, `FD`).
    /// The machine halts in place; the opcode is kept for reporting.
    IllegalOpcode(u8),
    /// A save-file (battery RAM or state snapshot) read/write failed.
    IoFailure(String),
    /// The frontend disconnected (e.g. dropped its audio/video sink)
    /// while the core still expected to hand off a frame or sample.
    FrontendDisconnect,
    /// A serialized blob does not have the expected shape.
    InvalidData,
    /// A ROM size does not correspond to any known `RomSize` variant.
    RomSize,
    /// A caller-supplied parameter was out of the accepted domain.
    InvalidParameter(String),
    /// Catch-all for error conditions not worth a dedicated variant.
    CustomError(String),
}

impl Error {
    pub fn description(&self) -> String {
        match self {
            Error::RomFormat(message) => format!("Invalid ROM format: {}", message),
            Error::IllegalOpcode(opcode) => format!("Illegal opcode 0x{:02x}", opcode),
            Error::IoFailure(message) => format!("I/O failure: {}", message),
            Error::FrontendDisconnect => String::from("Frontend disconnected"),
            Error::InvalidData => String::from("Invalid data format"),
            Error::RomSize => String::from("Invalid ROM size"),
            Error::InvalidParameter(message) => format!("Invalid parameter: {}", message),
            Error::CustomError(message) => message.clone(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::IoFailure(value.to_string())
    }
}
