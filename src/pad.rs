//! Joypad input handling.

use std::io::Cursor;

use crate::{
    error::Error,
    mmu::BusComponent,
    serialize::{read_u8, write_u8},
    state::{StateComponent, StateFormat},
    warnln,
};

pub struct Pad {
    down: bool,
    up: bool,
    left: bool,
    right: bool,
    start: bool,
    select: bool,
    b: bool,
    a: bool,
    selection: PadSelection,

    /// Output nibble from the previous read/mutation, used to detect
    /// the high-to-low transitions that raise the JoyPad interrupt.
    prev_lines: u8,

    int_pad: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PadSelection {
    Action,
    Direction,
    Both,
    Neither,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PadKey {
    Up,
    Down,
    Left,
    Right,
    Start,
    Select,
    A,
    B,
}

impl Pad {
    pub fn new() -> Self {
        Self {
            down: false,
            up: false,
            left: false,
            right: false,
            start: false,
            select: false,
            b: false,
            a: false,
            selection: PadSelection::Neither,
            prev_lines: 0x0f,
            int_pad: false,
        }
    }

    pub fn reset(&mut self) {
        self.down = false;
        self.up = false;
        self.left = false;
        self.right = false;
        self.start = false;
        self.select = false;
        self.b = false;
        self.a = false;
        self.selection = PadSelection::Neither;
        self.prev_lines = 0x0f;
        self.int_pad = false;
    }

    /// Lower nibble of the P1 register: the state of the four output
    /// lines for whichever group (action/direction) is selected, with
    /// unselected groups reading as released (high).
    fn lines(&self) -> u8 {
        let mut action = 0x0f;
        let mut direction = 0x0f;
        if self.selection == PadSelection::Action || self.selection == PadSelection::Both {
            action = if self.a { 0x00 } else { 0x01 }
                | if self.b { 0x00 } else { 0x02 }
                | if self.select { 0x00 } else { 0x04 }
                | if self.start { 0x00 } else { 0x08 };
        }
        if self.selection == PadSelection::Direction || self.selection == PadSelection::Both {
            direction = if self.right { 0x00 } else { 0x01 }
                | if self.left { 0x00 } else { 0x02 }
                | if self.up { 0x00 } else { 0x04 }
                | if self.down { 0x00 } else { 0x08 };
        }
        action & direction
    }

    /// Re-derives the output lines and raises the JoyPad interrupt on
    /// any bit that has fallen from released (1) to pressed (0).
    fn update_lines(&mut self) {
        let lines = self.lines();
        if self.prev_lines & !lines != 0 {
            self.int_pad = true;
        }
        self.prev_lines = lines;
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr & 0x00ff {
            0x0000 => {
                let selection_bits = match self.selection {
                    PadSelection::Direction => 0x10,
                    PadSelection::Action => 0x20,
                    PadSelection::Both => 0x00,
                    PadSelection::Neither => 0x30,
                };
                0xc0 | selection_bits | self.lines()
            }
            addr => {
                warnln!("Reading from unknown Pad location 0x{:04x}", addr);
                0xff
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr & 0x00ff {
            0x0000 => {
                self.selection = match value & 0x30 {
                    0x00 => PadSelection::Both,
                    0x10 => PadSelection::Action,
                    0x20 => PadSelection::Direction,
                    _ => PadSelection::Neither,
                };
                self.update_lines();
            }
            addr => warnln!("Writing to unknown Pad location 0x{:04x}", addr),
        }
    }

    pub fn key_press(&mut self, key: PadKey) {
        match key {
            PadKey::Up => self.up = true,
            PadKey::Down => self.down = true,
            PadKey::Left => self.left = true,
            PadKey::Right => self.right = true,
            PadKey::Start => self.start = true,
            PadKey::Select => self.select = true,
            PadKey::A => self.a = true,
            PadKey::B => self.b = true,
        }
        self.update_lines();
    }

    pub fn key_lift(&mut self, key: PadKey) {
        match key {
            PadKey::Up => self.up = false,
            PadKey::Down => self.down = false,
            PadKey::Left => self.left = false,
            PadKey::Right => self.right = false,
            PadKey::Start => self.start = false,
            PadKey::Select => self.select = false,
            PadKey::A => self.a = false,
            PadKey::B => self.b = false,
        }
        self.update_lines();
    }

    #[inline(always)]
    pub fn int_pad(&self) -> bool {
        self.int_pad
    }

    #[inline(always)]
    pub fn set_int_pad(&mut self, value: bool) {
        self.int_pad = value;
    }

    #[inline(always)]
    pub fn ack_pad(&mut self) {
        self.set_int_pad(false);
    }
}

impl BusComponent for Pad {
    fn read(&self, addr: u16) -> u8 {
        self.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.write(addr, value);
    }
}

impl Default for Pad {
    fn default() -> Self {
        Self::new()
    }
}

impl StateComponent for Pad {
    fn state(&self, _format: Option<StateFormat>) -> Result<Vec<u8>, Error> {
        let mut cursor = Cursor::new(vec![]);
        let pressed = if self.a { 0x01 } else { 0x00 }
            | if self.b { 0x02 } else { 0x00 }
            | if self.select { 0x04 } else { 0x00 }
            | if self.start { 0x08 } else { 0x00 }
            | if self.right { 0x10 } else { 0x00 }
            | if self.left { 0x20 } else { 0x00 }
            | if self.up { 0x40 } else { 0x00 }
            | if self.down { 0x80 } else { 0x00 };
        write_u8(&mut cursor, pressed)?;
        let selection = match self.selection {
            PadSelection::Both => 0,
            PadSelection::Action => 1,
            PadSelection::Direction => 2,
            PadSelection::Neither => 3,
        };
        write_u8(&mut cursor, selection)?;
        write_u8(&mut cursor, self.prev_lines)?;
        write_u8(&mut cursor, self.int_pad as u8)?;
        Ok(cursor.into_inner())
    }

    fn set_state(&mut self, data: &[u8], _format: Option<StateFormat>) -> Result<(), Error> {
        let mut cursor = Cursor::new(data);
        let pressed = read_u8(&mut cursor)?;
        self.a = pressed & 0x01 != 0;
        self.b = pressed & 0x02 != 0;
        self.select = pressed & 0x04 != 0;
        self.start = pressed & 0x08 != 0;
        self.right = pressed & 0x10 != 0;
        self.left = pressed & 0x20 != 0;
        self.up = pressed & 0x40 != 0;
        self.down = pressed & 0x80 != 0;
        self.selection = match read_u8(&mut cursor)? {
            1 => PadSelection::Action,
            2 => PadSelection::Direction,
            3 => PadSelection::Neither,
            _ => PadSelection::Both,
        };
        self.prev_lines = read_u8(&mut cursor)?;
        self.int_pad = read_u8(&mut cursor)? != 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Pad, PadKey};

    #[test]
    fn test_key_press_raises_interrupt() {
        let mut pad = Pad::new();
        pad.write(0xff00, 0x10); // select action keys
        assert!(!pad.int_pad());
        pad.key_press(PadKey::A);
        assert!(pad.int_pad());
    }

    #[test]
    fn test_key_press_unselected_group_no_interrupt() {
        let mut pad = Pad::new();
        pad.write(0xff00, 0x10); // select action keys
        pad.ack_pad();
        pad.key_press(PadKey::Up); // direction key, not selected
        assert!(!pad.int_pad());
    }

    #[test]
    fn test_read_reflects_pressed_bit_low() {
        let mut pad = Pad::new();
        pad.write(0xff00, 0x20); // select direction keys
        pad.key_press(PadKey::Up);
        assert_eq!(pad.read(0xff00) & 0x04, 0x00);
    }
}
