//! Low-level diagnostic utilities for debugging purposes.
//!
//! A single global pointer to the running emulator is kept here so that
//! panic handlers elsewhere in the crate can dump its state without
//! threading a reference through every call site.

use std::{
    ptr,
    sync::atomic::{AtomicBool, AtomicPtr, Ordering},
};

use crate::gb::GameBoy;

/// Pointer to the `GameBoy` instance currently registered for panic-time
/// diagnostics, `null` when none is registered. Stored as an `AtomicPtr`
/// rather than a bare `static mut` so reads and writes are well-defined
/// without an explicit `unsafe` block at every access site.
static GLOBAL_INSTANCE: AtomicPtr<GameBoy> = AtomicPtr::new(ptr::null_mut());

/// Enables or disables the pedantic assertion macros at runtime.
#[cfg(feature = "pedantic")]
pub static PEDANTIC: AtomicBool = AtomicBool::new(true);

impl GameBoy {
    /// Registers `self` as the instance used for panic diagnostics.
    pub fn set_diag(&self) {
        GLOBAL_INSTANCE.store(self as *const Self as *mut Self, Ordering::SeqCst);
    }

    /// Clears the diagnostics registration, if `self` is the instance
    /// currently registered.
    pub fn unset_diag(&self) {
        let current = self as *const Self as *mut Self;
        let _ = GLOBAL_INSTANCE.compare_exchange(
            current,
            ptr::null_mut(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Dumps a textual summary of the registered instance to stdout, a
    /// no-op when no instance has called [`GameBoy::set_diag`].
    pub fn dump_diagnostics() {
        if let Some(gb) = Self::global() {
            gb.dump_diagnostics_s();
        }
    }

    /// Returns the globally registered instance, if any is set.
    fn global() -> Option<&'static Self> {
        let ptr = GLOBAL_INSTANCE.load(Ordering::SeqCst);
        if ptr.is_null() {
            None
        } else {
            // SAFETY: the pointer only ever comes from `set_diag`, called
            // with a still-live `&GameBoy`, and is cleared by `unset_diag`
            // before that reference can go out of scope.
            Some(unsafe { &*ptr })
        }
    }

    fn dump_diagnostics_s(&self) {
        println!("Dumping emulator diagnostics:");
        println!("{}", self.description_debug());
    }
}

#[cfg(feature = "pedantic")]
#[macro_export]
macro_rules! enable_pedantic {
    () => {
        $crate::diag::PEDANTIC.store(true, std::sync::atomic::Ordering::SeqCst);
    };
}

#[cfg(not(feature = "pedantic"))]
#[macro_export]
macro_rules! enable_pedantic {
    () => {};
}

#[cfg(feature = "pedantic")]
#[macro_export]
macro_rules! disable_pedantic {
    () => {
        $crate::diag::PEDANTIC.store(false, std::sync::atomic::Ordering::SeqCst);
    };
}

#[cfg(not(feature = "pedantic"))]
#[macro_export]
macro_rules! disable_pedantic {
    () => {};
}

/// Panics with a formatted message, dumping the registered diagnostics
/// instance first so the panic output carries emulator state.
#[macro_export]
macro_rules! panic_gb {
    ($msg:expr) => {
        {
            $crate::gb::GameBoy::dump_diagnostics();
            panic!($msg);
        }
    };
    ($fmt:expr, $($arg:tt)*) => {
        {
            $crate::gb::GameBoy::dump_diagnostics();
            panic!($fmt, $($arg)*);
        }
    };
}

/// Like [`assert!`], but dumps diagnostics before panicking.
#[macro_export]
macro_rules! assert_gb {
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::gb::GameBoy::dump_diagnostics();
            panic!($fmt, $($arg)*);
        }
    };
    ($cond:expr) => {
        assert_gb!($cond, stringify!($cond));
    };
}

#[cfg(feature = "pedantic")]
#[macro_export]
macro_rules! assert_pedantic_gb {
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if $crate::diag::PEDANTIC.load(std::sync::atomic::Ordering::SeqCst) {
            $crate::assert_gb!($cond, $fmt, $($arg)*);
        }
    };
    ($cond:expr) => {
        if $crate::diag::PEDANTIC.load(std::sync::atomic::Ordering::SeqCst) {
            $crate::assert_gb!($cond);
        }
    };
}

#[cfg(not(feature = "pedantic"))]
#[macro_export]
macro_rules! assert_pedantic_gb {
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        ()
    };
    ($cond:expr) => {
        ()
    };
}
