use crate::serial::SerialDevice;

use std::fmt::{self, Display, Formatter};

pub struct BufferDevice {
    buffer: Vec<u8>,
    callback: fn(image_buffer: &Vec<u8>),
}

impl BufferDevice {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            callback: |_| {},
        }
    }

    pub fn set_callback(&mut self, callback: fn(image_buffer: &Vec<u8>)) {
        self.callback = callback;
    }

    pub fn buffer(&self) -> &Vec<u8> {
        &self.buffer
    }
}

impl SerialDevice for BufferDevice {
    fn send(&mut self) -> u8 {
        0xff
    }

    fn receive(&mut self, byte: u8) {
        self.buffer.push(byte);
        let data = vec![byte];
        (self.callback)(&data);
    }

    fn description(&self) -> String {
        String::from("Buffer")
    }

    fn state(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Default for BufferDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for BufferDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer")
    }
}
