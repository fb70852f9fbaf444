use std::{
    any::Any,
    io::{stdout, Write},
};

use crate::serial::SerialDevice;

/// Serial device that streams every received byte straight to the
/// terminal, unmodified. Useful for watching a test ROM's serial
/// output live instead of collecting it into a [`super::buffer::BufferDevice`].
pub struct StdoutDevice {
    flush: bool,
}

impl StdoutDevice {
    pub fn new(flush: bool) -> Self {
        Self { flush }
    }
}

impl SerialDevice for StdoutDevice {
    fn send(&mut self) -> u8 {
        0xff
    }

    fn receive(&mut self, byte: u8) {
        print!("{}", byte as char);
        if self.flush {
            let _ = stdout().flush();
        }
    }

    fn description(&self) -> String {
        String::from("Stdout")
    }

    fn state(&self) -> String {
        String::new()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Default for StdoutDevice {
    fn default() -> Self {
        Self::new(true)
    }
}
