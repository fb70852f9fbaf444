//! Constants that define the current build and execution environment.
//!
//! `build.rs` writes [`build`] and [`_build`] at compile time from
//! `Cargo.toml`/`Cargo.lock`, so the values below always reflect the
//! binary actually running, not whatever was true when this file was
//! last edited.

use std::collections::HashMap;

#[rustfmt::skip]
pub mod build;
pub use self::build::*;

#[rustfmt::skip]
pub mod _build;
pub use self::_build::{DEPENDENCIES, DEPENDENCIES_STR, FEATURES, FEATURES_STR};

pub fn dependencies_map() -> HashMap<&'static str, &'static str> {
    HashMap::from(DEPENDENCIES)
}
