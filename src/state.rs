//! Flat, deterministic save-state serialization.
//!
//! Every stateful component implements [`StateComponent`] by writing its
//! fields in declaration order to a byte cursor and reading them back the
//! same way. There is no framing beyond simple concatenation: a snapshot of
//! the whole machine is just each component's bytes one after another, which
//! keeps restores deterministic and easy to reason about. This intentionally
//! does not attempt to be compatible with any other emulator's save-state
//! format.

use crate::error::Error;

/// Reserved for future on-disk format variants; a single component only
/// ever needs one encoding today so this carries no data yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFormat {
    Flat,
}

pub trait StateComponent {
    /// Serializes the component into a flat byte buffer.
    fn state(&self, format: Option<StateFormat>) -> Result<Vec<u8>, Error>;

    /// Restores the component from a buffer produced by [`Self::state`].
    fn set_state(&mut self, data: &[u8], format: Option<StateFormat>) -> Result<(), Error>;
}
