//! Global constants, such as compiler version used, features, platform information and others.

// @generated

pub const COMPILATION_DATE: &str = "Aug 01 2026";
pub const COMPILATION_TIME: &str = "05:23:01";
pub const NAME: &str = "duskboy";
pub const VERSION: &str = "0.1.0";
pub const COMPILER: &str = "rustc";
pub const COMPILER_VERSION: &str = "1.95.0";
pub const HOST: &str = "x86_64-unknown-linux-gnu";
pub const TARGET: &str = "x86_64-unknown-linux-gnu";
pub const PROFILE: &str = "debug";
pub const OPT_LEVEL: &str = "0";
pub const MAKEFLAGS: &str = "-j --jobserver-fds=8,10 --jobserver-auth=8,10";
pub const FEATURES_SEQ: [&str; 1] = ["cpu"];
pub const PLATFORM_CPU_BITS: &str = "64";
pub const PLATFORM_CPU_BITS_INT: usize = 64;
