//! PPU (Picture Processing Unit) functions and structures.

use core::fmt;
use std::{
    borrow::BorrowMut,
    collections::VecDeque,
    fmt::{Display, Formatter},
    io::Cursor,
    sync::Mutex,
};

use crate::{
    consts::{
        BGP_ADDR, LCDC_ADDR, LYC_ADDR, LY_ADDR, OBP0_ADDR, OBP1_ADDR, SCX_ADDR, SCY_ADDR,
        STAT_ADDR, WX_ADDR, WY_ADDR,
    },
    error::Error,
    gb::{GameBoyConfig, GameBoyMode},
    mmu::BusComponent,
    serialize::{read_bytes, read_u16, read_u8, write_bytes, write_u16, write_u8},
    state::{StateComponent, StateFormat},
    util::SharedThread,
    warnln,
};

pub const VRAM_SIZE: usize = 8192;
pub const HRAM_SIZE: usize = 128;
pub const OAM_SIZE: usize = 160;
pub const PALETTE_SIZE: usize = 4;
pub const TILE_WIDTH: usize = 8;
pub const TILE_HEIGHT: usize = 8;
pub const TILE_WIDTH_I: usize = 7;
pub const TILE_DOUBLE_HEIGHT: usize = 16;

/// The number of tiles that can be stored in the Game Boy's
/// VRAM memory according to specifications.
pub const TILE_COUNT: usize = 384;

/// The number of objects/sprites that can be handled at
/// the same time by the Game Boy.
pub const OBJ_COUNT: usize = 40;

/// The maximum number of sprites that may be selected for a
/// single scanline by the OAM scan.
pub const MAX_SPRITES_LINE: usize = 10;

/// The width of the Game Boy screen in pixels.
pub const DISPLAY_WIDTH: usize = 160;

/// The height of the Game Boy screen in pixels.
pub const DISPLAY_HEIGHT: usize = 144;

/// The size in pixels of the display.
pub const DISPLAY_SIZE: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT;

/// The size to be used by the buffer of shade indices (0 to 3,
/// already mapped through BGP/OBP0/OBP1) for the Game Boy screen.
pub const COLOR_BUFFER_SIZE: usize = DISPLAY_SIZE;

/// Total T-cycles in a single scanline, visible or VBlank.
const DOTS_PER_LINE: u16 = 456;

/// Duration of the OAM scan (mode 2) in T-cycles.
const OAM_SCAN_DOTS: u16 = 80;

/// Base T-cycle cost of a single sprite fetch, paused into the BG fifo
/// exactly when the fetcher's X position reaches that sprite; a further
/// 0-7 cycles are added per fetch depending on the SCX/X alignment of
/// the BG fetch it interrupts, see `tick_mode3`.
const SPRITE_FETCH_PENALTY: u16 = 6;

/// T-cycle cost of restarting the fetcher against the window tile map
/// when the window is activated mid-scanline.
const WINDOW_FETCH_PENALTY: u16 = 6;

/// Represents a tile within the Game Boy context, always 8x8 pixels,
/// storing one shade index (0-3) per pixel.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    buffer: [u8; 64],
}

impl Tile {
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.buffer[y * TILE_WIDTH + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.buffer[y * TILE_WIDTH + x] = value;
    }

    pub fn get_row(&self, y: usize) -> &[u8] {
        &self.buffer[y * TILE_WIDTH..(y + 1) * TILE_WIDTH]
    }
}

impl Display for Tile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut buffer = String::new();
        for y in 0..8 {
            for x in 0..8 {
                buffer.push_str(format!("{}", self.get(x, y)).as_str());
            }
            buffer.push('\n');
        }
        write!(f, "{}", buffer)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectData {
    x: i16,
    y: i16,
    tile: u8,
    palette: u8,
    xflip: bool,
    yflip: bool,
    bg_over: bool,
    index: u8,
}

impl Display for ObjectData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Index: {}, X: {}, Y: {}, Tile: {}",
            self.index, self.x, self.y, self.tile
        )
    }
}

/// Result of an OAM-priority scanline composition for a single screen
/// column; `filled` distinguishes "no opaque sprite pixel here" from
/// "an opaque sprite pixel of color 0 would be a contradiction" (color
/// 0 is always transparent, so `filled` is redundant with `color != 0`
/// but kept explicit for clarity at the call site).
#[derive(Clone, Copy, Default)]
struct SpriteHit {
    filled: bool,
    color: u8,
    palette: u8,
    priority: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FetcherState {
    GetTile,
    GetDataLo,
    GetDataHi,
    Push,
}

pub struct PpuRegisters {
    pub scy: u8,
    pub scx: u8,
    pub wy: u8,
    pub wx: u8,
    pub ly: u8,
    pub lyc: u8,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PpuMode {
    HBlank = 0,
    VBlank = 1,
    OamRead = 2,
    VramRead = 3,
}

/// Represents the Game Boy PPU (Pixel Processing Unit). Drives a
/// dot-stepped fetcher and background/sprite compositing pipeline and
/// outputs, once per frame, a 160x144 buffer of 2-bit shade indices
/// already mapped through the `BGP`/`OBP0`/`OBP1` palette registers;
/// converting those shades to RGB is left to the frontend.
///
/// # Basic usage
///
/// ```rust
/// use duskboy::ppu::Ppu;
/// let mut ppu = Ppu::default();
/// ppu.clock(8);
/// ```
pub struct Ppu {
    /// The shade buffer holding the final, palette-mapped 2-bit color
    /// for every pixel of the previously completed frame.
    pub color_buffer: Box<[u8; COLOR_BUFFER_SIZE]>,

    /// Raw (pre-palette) background/window color index per pixel of
    /// the current frame, kept to resolve sprite-over-background
    /// priority at composition time.
    raw_buffer: Box<[u8; COLOR_BUFFER_SIZE]>,

    vram: [u8; VRAM_SIZE],
    hram: [u8; HRAM_SIZE],
    oam: [u8; OAM_SIZE],

    tiles: [Tile; TILE_COUNT],
    obj_data: [ObjectData; OBJ_COUNT],

    /// Raw BGP/OBP0/OBP1 register bytes.
    palettes: [u8; 3],

    scy: u8,
    scx: u8,
    wy: u8,
    wx: u8,
    ly: u8,
    lyc: u8,

    mode: PpuMode,

    /// T-cycle position within the current scanline, 0..DOTS_PER_LINE.
    line_dot: u16,

    switch_bg: bool,
    switch_obj: bool,
    obj_size: bool,
    bg_map: bool,
    bg_tile: bool,
    switch_window: bool,
    window_map: bool,
    switch_lcd: bool,

    /// Internal window line counter, incremented once per scanline in
    /// which the window was actually drawn.
    window_counter: u8,

    /// Whether WY has equalled LY at some point during the current frame.
    window_triggered: bool,

    /// Whether the fetcher is currently pulling from the window map.
    window_active: bool,

    /// Whether the window was drawn at all on the current scanline,
    /// used to decide whether to advance `window_counter` at line end.
    window_used_line: bool,

    /// Fetcher state machine, stepping every 2 T-cycles per state.
    fetcher_state: FetcherState,
    fetcher_substep: u8,
    fetcher_tile_x: u8,
    fetcher_tile_index: usize,
    fetcher_data_lo: u8,
    fetcher_data_hi: u8,

    /// Background/window FIFO, holding raw (pre-palette) 2-bit colors.
    bg_fifo: VecDeque<u8>,

    /// Remaining pixels to discard from the FIFO output to account for
    /// the fine X scroll (`SCX & 7`).
    x_discard: u8,

    /// Number of pixels already emitted to the screen on this line.
    x_counter: u8,

    /// Sprites selected by the OAM scan for the current line, in OAM order.
    selected_sprites: Vec<u8>,

    /// Indices into `obj_data` of the sprites selected for the current
    /// line, ordered by screen X (ties broken by OAM index) the same way
    /// the hardware's priority encoder resolves overlaps. Consumed one
    /// at a time as the fetcher's X position reaches each sprite.
    pending_sprites: Vec<u8>,

    /// Cursor into `pending_sprites` of the next sprite still waiting to
    /// be fetched on the current line.
    sprite_cursor: usize,

    /// Opaque sprite pixel, if any, for each screen column of the
    /// current line. Filled in lazily, one sprite at a time, as the
    /// fetcher's X position reaches it during mode 3 - not precomputed
    /// up front for the whole line.
    sprite_pixels: Box<[SpriteHit; DISPLAY_WIDTH]>,

    /// Extra T-cycles the pixel shifter must wait out, modelling sprite
    /// fetch and window re-fetch penalties.
    stall: u16,

    /// Prevents pixel output on the first frame after the LCD is
    /// switched on, matching real hardware's garbage first frame.
    first_frame: bool,

    /// Identifier of the last fully rendered frame, wraps on u16 edges.
    frame_index: u16,

    stat_hblank: bool,
    stat_vblank: bool,
    stat_oam: bool,
    stat_lyc: bool,

    /// Level of the combined STAT interrupt sources as of the last
    /// check, used to detect the 0->1 edge that actually raises `IF.LCD`.
    stat_level_prev: bool,

    int_vblank: bool,
    int_stat: bool,

    gb_mode: GameBoyMode,
    gbc: SharedThread<GameBoyConfig>,
}

impl Ppu {
    pub fn new(mode: GameBoyMode, gbc: SharedThread<GameBoyConfig>) -> Self {
        Self {
            color_buffer: Box::new([0u8; COLOR_BUFFER_SIZE]),
            raw_buffer: Box::new([0u8; COLOR_BUFFER_SIZE]),
            vram: [0u8; VRAM_SIZE],
            hram: [0u8; HRAM_SIZE],
            oam: [0u8; OAM_SIZE],
            tiles: [Tile { buffer: [0u8; 64] }; TILE_COUNT],
            obj_data: [ObjectData::default(); OBJ_COUNT],
            palettes: [0u8; 3],
            scy: 0x0,
            scx: 0x0,
            wy: 0x0,
            wx: 0x0,
            ly: 0x0,
            lyc: 0x0,
            mode: PpuMode::OamRead,
            line_dot: 0,
            switch_bg: false,
            switch_obj: false,
            obj_size: false,
            bg_map: false,
            bg_tile: false,
            switch_window: false,
            window_map: false,
            switch_lcd: false,
            window_counter: 0,
            window_triggered: false,
            window_active: false,
            window_used_line: false,
            fetcher_state: FetcherState::GetTile,
            fetcher_substep: 0,
            fetcher_tile_x: 0,
            fetcher_tile_index: 0,
            fetcher_data_lo: 0,
            fetcher_data_hi: 0,
            bg_fifo: VecDeque::with_capacity(16),
            x_discard: 0,
            x_counter: 0,
            selected_sprites: Vec::with_capacity(MAX_SPRITES_LINE),
            pending_sprites: Vec::with_capacity(MAX_SPRITES_LINE),
            sprite_cursor: 0,
            sprite_pixels: Box::new([SpriteHit::default(); DISPLAY_WIDTH]),
            stall: 0,
            first_frame: false,
            frame_index: 0,
            stat_hblank: false,
            stat_vblank: false,
            stat_oam: false,
            stat_lyc: false,
            stat_level_prev: false,
            int_vblank: false,
            int_stat: false,
            gb_mode: mode,
            gbc,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.gb_mode, self.gbc.clone());
    }

    pub fn clock(&mut self, cycles: u16) {
        if !self.switch_lcd {
            return;
        }
        for _ in 0..cycles {
            self.tick();
        }
    }

    fn tick(&mut self) {
        self.line_dot += 1;

        match self.mode {
            PpuMode::OamRead => {
                if self.line_dot >= OAM_SCAN_DOTS {
                    self.enter_mode3();
                }
            }
            PpuMode::VramRead => {
                self.tick_mode3();
                if self.x_counter as usize >= DISPLAY_WIDTH {
                    self.mode = PpuMode::HBlank;
                    self.update_stat();
                }
            }
            PpuMode::HBlank => {
                if self.line_dot >= DOTS_PER_LINE {
                    self.end_line();
                }
            }
            PpuMode::VBlank => {
                if self.line_dot >= DOTS_PER_LINE {
                    self.end_line();
                }
            }
        }
    }

    fn end_line(&mut self) {
        if self.window_used_line {
            self.window_counter = self.window_counter.wrapping_add(1);
            self.window_used_line = false;
        }

        self.line_dot = 0;
        self.ly += 1;

        if self.ly == 144 {
            self.int_vblank = true;
            self.mode = PpuMode::VBlank;
            self.update_stat();
            return;
        }

        if self.ly == 154 {
            self.ly = 0;
            self.window_counter = 0;
            self.window_triggered = false;
            self.first_frame = false;
            self.frame_index = self.frame_index.wrapping_add(1);
        }

        if self.ly == self.wy {
            self.window_triggered = true;
        }

        self.mode = PpuMode::OamRead;
        self.oam_scan();
        self.update_stat();
    }

    fn oam_scan(&mut self) {
        self.selected_sprites.clear();
        let obj_height = if self.obj_size {
            TILE_DOUBLE_HEIGHT as i16
        } else {
            TILE_HEIGHT as i16
        };
        for (index, obj) in self.obj_data.iter().enumerate() {
            if self.selected_sprites.len() == MAX_SPRITES_LINE {
                break;
            }
            if obj.y <= self.ly as i16 && obj.y + obj_height > self.ly as i16 {
                self.selected_sprites.push(index as u8);
            }
        }
    }

    fn enter_mode3(&mut self) {
        self.mode = PpuMode::VramRead;
        self.fetcher_state = FetcherState::GetTile;
        self.fetcher_substep = 0;
        self.fetcher_tile_x = self.scx >> 3;
        self.bg_fifo.clear();
        self.x_discard = self.scx & 0x07;
        self.x_counter = 0;
        self.window_active = false;
        self.window_used_line = false;
        self.stall = 0;
        *self.sprite_pixels = [SpriteHit::default(); DISPLAY_WIDTH];

        self.pending_sprites.clone_from(&self.selected_sprites);
        self.pending_sprites
            .sort_by_key(|&i| (self.obj_data[i as usize].x, i));
        self.sprite_cursor = 0;

        self.update_stat();
    }

    /// Fetches a single sprite's pixel row and merges it into
    /// `sprite_pixels`, honoring OAM priority by never overwriting a
    /// column an earlier (lower-X or lower-index) sprite already filled.
    /// Called once per sprite, exactly when the pixel fetcher's X
    /// position reaches it, rather than for the whole line up front.
    fn fetch_sprite(&mut self, index: u8) {
        let obj_height = if self.obj_size { 16i16 } else { 8i16 };
        let obj = self.obj_data[index as usize];
        let mut row = self.ly as i16 - obj.y;
        if obj.yflip {
            row = obj_height - row - 1;
        }
        let (tile_index, row_in_tile) = if self.obj_size {
            if row < 8 {
                ((obj.tile as usize) & 0xfe, row)
            } else {
                ((obj.tile as usize) | 0x01, row - 8)
            }
        } else {
            (obj.tile as usize, row)
        };
        let tile = &self.tiles[tile_index];
        let tile_row = tile.get_row(row_in_tile as usize);
        for col in 0..TILE_WIDTH {
            let x = obj.x + col as i16;
            if !(0..DISPLAY_WIDTH as i16).contains(&x) {
                continue;
            }
            let xu = x as usize;
            if self.sprite_pixels[xu].filled {
                continue;
            }
            let pixel = tile_row[if obj.xflip { TILE_WIDTH_I - col } else { col }];
            if pixel != 0 {
                self.sprite_pixels[xu] = SpriteHit {
                    filled: true,
                    color: pixel,
                    palette: obj.palette,
                    priority: obj.bg_over,
                };
            }
        }
    }

    fn tick_mode3(&mut self) {
        self.step_fetcher();

        if !self.window_active
            && self.switch_window
            && self.window_triggered
            && self.wx <= 166
            && self.x_counter as i16 == (self.wx as i16 - 7).max(0)
        {
            self.activate_window();
            return;
        }

        if self.stall > 0 {
            self.stall -= 1;
            return;
        }

        if self.bg_fifo.len() < 8 {
            return;
        }

        if self.x_discard > 0 {
            self.bg_fifo.pop_front();
            self.x_discard -= 1;
            return;
        }

        let x = self.x_counter as usize;
        if x >= DISPLAY_WIDTH {
            return;
        }

        if self.switch_obj && self.sprite_cursor < self.pending_sprites.len() {
            let next = self.pending_sprites[self.sprite_cursor];
            let sprite_x = self.obj_data[next as usize].x.max(0) as usize;
            if sprite_x <= x {
                self.sprite_cursor += 1;
                self.fetch_sprite(next);
                // The fetcher pauses the BG fifo while the sprite's tile
                // row is fetched; sub-tile alignment of the interrupted
                // fetch adds a few extra T-cycles, mirroring the variance
                // real hardware shows depending on where in its 8-dot
                // cycle the BG fetch was interrupted.
                let alignment = (sprite_x.wrapping_add(self.scx as usize)) % 8;
                self.stall += SPRITE_FETCH_PENALTY + alignment as u16;
                return;
            }
        }

        let color = self.bg_fifo.pop_front().unwrap();
        self.emit_pixel(x, color);
    }

    fn activate_window(&mut self) {
        self.window_active = true;
        self.window_used_line = true;
        self.bg_fifo.clear();
        self.fetcher_state = FetcherState::GetTile;
        self.fetcher_substep = 0;
        self.fetcher_tile_x = 0;
        self.stall += WINDOW_FETCH_PENALTY;
    }

    fn emit_pixel(&mut self, x: usize, bg_color: u8) {
        let bg_color = if self.switch_bg { bg_color } else { 0 };
        let hit = self.sprite_pixels[x];
        let use_sprite = self.switch_obj && hit.filled && (!hit.priority || bg_color == 0);
        let (final_color, palette_reg) = if use_sprite {
            (hit.color, self.palettes[1 + hit.palette as usize])
        } else {
            (bg_color, self.palettes[0])
        };
        let shade = (palette_reg >> (final_color * 2)) & 3;
        let offset = self.ly as usize * DISPLAY_WIDTH + x;
        if !self.first_frame {
            self.raw_buffer[offset] = bg_color;
            self.color_buffer[offset] = shade;
        }
        self.x_counter += 1;
    }

    fn step_fetcher(&mut self) {
        match self.fetcher_state {
            FetcherState::GetTile => {
                self.fetcher_substep += 1;
                if self.fetcher_substep >= 2 {
                    self.fetcher_substep = 0;
                    self.fetch_tile_index();
                    self.fetcher_state = FetcherState::GetDataLo;
                }
            }
            FetcherState::GetDataLo => {
                self.fetcher_substep += 1;
                if self.fetcher_substep >= 2 {
                    self.fetcher_substep = 0;
                    self.fetcher_data_lo = self.fetch_tile_plane(0);
                    self.fetcher_state = FetcherState::GetDataHi;
                }
            }
            FetcherState::GetDataHi => {
                self.fetcher_substep += 1;
                if self.fetcher_substep >= 2 {
                    self.fetcher_substep = 0;
                    self.fetcher_data_hi = self.fetch_tile_plane(1);
                    self.fetcher_state = FetcherState::Push;
                }
            }
            FetcherState::Push => {
                if self.bg_fifo.is_empty() {
                    for bit in 0..TILE_WIDTH {
                        let mask = 1 << (TILE_WIDTH_I - bit);
                        let lo = u8::from(self.fetcher_data_lo & mask != 0);
                        let hi = u8::from(self.fetcher_data_hi & mask != 0);
                        self.bg_fifo.push_back(lo | (hi << 1));
                    }
                    self.fetcher_tile_x = self.fetcher_tile_x.wrapping_add(1) % 32;
                    self.fetcher_state = FetcherState::GetTile;
                }
            }
        }
    }

    /// Current row (0..256) within the background/window map that the
    /// fetcher should pull tile rows from.
    fn fetch_line(&self) -> u8 {
        if self.window_active {
            self.window_counter
        } else {
            self.ly.wrapping_add(self.scy)
        }
    }

    fn fetch_tile_index(&mut self) {
        let map = if self.window_active {
            self.window_map
        } else {
            self.bg_map
        };
        let map_offset: usize = if map { 0x1c00 } else { 0x1800 };
        let line = self.fetch_line();
        let row_offset = ((line as usize) >> 3) * 32;
        let col = self.fetcher_tile_x as usize % 32;
        let mut tile_index = self.vram[map_offset + row_offset + col] as usize;
        if !self.bg_tile && tile_index < 128 {
            tile_index += 256;
        }
        self.fetcher_tile_index = tile_index;
    }

    fn fetch_tile_plane(&self, plane: usize) -> u8 {
        let line = self.fetch_line();
        let row_in_tile = (line & 0x07) as usize;
        let addr = self.fetcher_tile_index * 16 + row_in_tile * 2 + plane;
        self.vram[addr]
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0x9fff => self.vram[(addr & 0x1fff) as usize],
            0xfe00..=0xfe9f => self.oam[(addr & 0x00ff) as usize],
            0xfea0..=0xfeff => 0xff,
            0xff80..=0xfffe => self.hram[(addr & 0x007f) as usize],
            LCDC_ADDR => {
                u8::from(self.switch_bg)
                    | (u8::from(self.switch_obj) << 1)
                    | (u8::from(self.obj_size) << 2)
                    | (u8::from(self.bg_map) << 3)
                    | (u8::from(self.bg_tile) << 4)
                    | (u8::from(self.switch_window) << 5)
                    | (u8::from(self.window_map) << 6)
                    | (u8::from(self.switch_lcd) << 7)
            }
            STAT_ADDR => {
                (u8::from(self.stat_hblank) << 3)
                    | (u8::from(self.stat_vblank) << 4)
                    | (u8::from(self.stat_oam) << 5)
                    | (u8::from(self.stat_lyc) << 6)
                    | (u8::from(self.lyc == self.ly) << 2)
                    | (self.mode as u8 & 0x03)
                    | 0x80
            }
            SCY_ADDR => self.scy,
            SCX_ADDR => self.scx,
            LY_ADDR => self.ly,
            LYC_ADDR => self.lyc,
            BGP_ADDR => self.palettes[0],
            OBP0_ADDR => self.palettes[1],
            OBP1_ADDR => self.palettes[2],
            WX_ADDR => self.wx,
            WY_ADDR => self.wy,
            _ => {
                warnln!("Reading from unknown PPU location 0x{:04x}", addr);
                0xff
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x8000..=0x9fff => {
                self.vram[(addr & 0x1fff) as usize] = value;
                if addr < 0x9800 {
                    self.update_tile(addr);
                }
            }
            0xfe00..=0xfe9f => {
                self.oam[(addr & 0x00ff) as usize] = value;
                self.update_object(addr, value);
            }
            0xfea0..=0xfeff => (),
            0xff80..=0xfffe => self.hram[(addr & 0x007f) as usize] = value,
            LCDC_ADDR => {
                self.switch_bg = value & 0x01 == 0x01;
                self.switch_obj = value & 0x02 == 0x02;
                self.obj_size = value & 0x04 == 0x04;
                self.bg_map = value & 0x08 == 0x08;
                self.bg_tile = value & 0x10 == 0x10;
                self.switch_window = value & 0x20 == 0x20;
                self.window_map = value & 0x40 == 0x40;
                let was_on = self.switch_lcd;
                self.switch_lcd = value & 0x80 == 0x80;

                if !self.switch_lcd {
                    self.mode = PpuMode::HBlank;
                    self.line_dot = 0;
                    self.ly = 0;
                    self.int_vblank = false;
                    self.int_stat = false;
                    self.window_counter = 0;
                    self.window_triggered = false;
                    self.color_buffer.fill(0);
                } else if !was_on {
                    self.first_frame = true;
                    self.line_dot = 0;
                    self.ly = 0;
                    self.mode = PpuMode::OamRead;
                    self.oam_scan();
                }
            }
            STAT_ADDR => {
                self.stat_hblank = value & 0x08 == 0x08;
                self.stat_vblank = value & 0x10 == 0x10;
                self.stat_oam = value & 0x20 == 0x20;
                self.stat_lyc = value & 0x40 == 0x40;
            }
            SCY_ADDR => self.scy = value,
            SCX_ADDR => self.scx = value,
            LYC_ADDR => self.lyc = value,
            BGP_ADDR => self.palettes[0] = value,
            OBP0_ADDR => self.palettes[1] = value,
            OBP1_ADDR => self.palettes[2] = value,
            // 0xFF4A — WY
            WY_ADDR => self.wy = value,
            // 0xFF4B — WX
            WX_ADDR => self.wx = value,
            _ => warnln!("Writing in unknown PPU location 0x{:04x}", addr),
        }
    }

    /// Returns the completed frame as a 160x144 buffer of 2-bit shade
    /// indices, already mapped through the BGP/OBP0/OBP1 registers.
    pub fn frame(&self) -> &[u8; COLOR_BUFFER_SIZE] {
        &self.color_buffer
    }

    pub fn vram(&self) -> &[u8; VRAM_SIZE] {
        &self.vram
    }

    pub fn set_vram(&mut self, value: &[u8]) {
        self.vram[0..value.len()].copy_from_slice(value);
        self.update_vram();
    }

    pub fn hram(&self) -> &[u8; HRAM_SIZE] {
        &self.hram
    }

    pub fn set_hram(&mut self, value: [u8; HRAM_SIZE]) {
        self.hram = value;
    }

    pub fn tiles(&self) -> &[Tile; TILE_COUNT] {
        &self.tiles
    }

    /// Raw `BGP` register byte, the background/window palette mapping.
    pub fn bgp(&self) -> u8 {
        self.palettes[0]
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn mode(&self) -> PpuMode {
        self.mode
    }

    /// Whether the PPU currently blocks CPU reads of VRAM (mode 3).
    pub fn vram_blocked(&self) -> bool {
        self.mode == PpuMode::VramRead
    }

    /// Whether the PPU currently blocks CPU reads of OAM (modes 2 and 3).
    pub fn oam_blocked(&self) -> bool {
        matches!(self.mode, PpuMode::OamRead | PpuMode::VramRead)
    }

    pub fn frame_index(&self) -> u16 {
        self.frame_index
    }

    #[inline(always)]
    pub fn int_vblank(&self) -> bool {
        self.int_vblank
    }

    #[inline(always)]
    pub fn set_int_vblank(&mut self, value: bool) {
        self.int_vblank = value;
    }

    #[inline(always)]
    pub fn ack_vblank(&mut self) {
        self.set_int_vblank(false);
    }

    #[inline(always)]
    pub fn int_stat(&self) -> bool {
        self.int_stat
    }

    #[inline(always)]
    pub fn set_int_stat(&mut self, value: bool) {
        self.int_stat = value;
    }

    #[inline(always)]
    pub fn ack_stat(&mut self) {
        self.set_int_stat(false);
    }

    pub fn gb_mode(&self) -> GameBoyMode {
        self.gb_mode
    }

    pub fn set_gb_mode(&mut self, value: GameBoyMode) {
        self.gb_mode = value;
    }

    pub fn set_gbc(&mut self, value: SharedThread<GameBoyConfig>) {
        self.gbc = value;
    }

    pub fn print_tile_stdout(&self, tile_index: usize) {
        println!("{}", self.tiles[tile_index]);
    }

    /// Recomputes every cached tile from raw VRAM, used after a bulk
    /// VRAM replacement (e.g. loading a save state).
    pub fn update_vram(&mut self) {
        for addr in 0x8000u16..0x9800u16 {
            self.update_tile(addr);
        }
    }

    fn update_tile(&mut self, addr: u16) {
        let addr = (addr & 0x1ffe) as usize;
        let tile_index = (addr >> 4) & 0x01ff;
        let tile = self.tiles[tile_index].borrow_mut();
        let y = (addr >> 1) & 0x0007;
        for x in 0..TILE_WIDTH {
            let mask = 1 << (TILE_WIDTH_I - x);
            let lo = u8::from(self.vram[addr] & mask > 0);
            let hi = u8::from(self.vram[addr + 1] & mask > 0);
            tile.set(x, y, lo | (hi << 1));
        }
    }

    fn update_object(&mut self, addr: u16, value: u8) {
        let addr = (addr & 0x00ff) as usize;
        let obj_index = addr >> 2;
        if obj_index >= OBJ_COUNT {
            return;
        }
        let obj = self.obj_data[obj_index].borrow_mut();
        match addr & 0x03 {
            0x00 => obj.y = value as i16 - 16,
            0x01 => obj.x = value as i16 - 8,
            0x02 => obj.tile = value,
            0x03 => {
                obj.palette = u8::from(value & 0x10 == 0x10);
                obj.xflip = value & 0x20 == 0x20;
                obj.yflip = value & 0x40 == 0x40;
                obj.bg_over = value & 0x80 == 0x80;
                obj.index = obj_index as u8;
            }
            _ => (),
        }
    }

    pub fn registers(&self) -> PpuRegisters {
        PpuRegisters {
            scy: self.scy,
            scx: self.scx,
            wy: self.wy,
            wx: self.wx,
            ly: self.ly,
            lyc: self.lyc,
        }
    }

    /// Runs an update operation on the LCD STAT interrupt, raising it
    /// only on the rising edge of the combined interrupt sources.
    fn update_stat(&mut self) {
        let level = self.stat_level();
        if level && !self.stat_level_prev {
            self.int_stat = true;
        }
        self.stat_level_prev = level;
    }

    fn stat_level(&self) -> bool {
        (self.stat_lyc && self.lyc == self.ly)
            || (self.stat_oam && self.mode == PpuMode::OamRead)
            || (self.stat_vblank && self.mode == PpuMode::VBlank)
            || (self.stat_hblank && self.mode == PpuMode::HBlank)
    }
}

impl BusComponent for Ppu {
    fn read(&self, addr: u16) -> u8 {
        self.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.write(addr, value);
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new(
            GameBoyMode::Dmg,
            SharedThread::new(Mutex::new(GameBoyConfig::default())),
        )
    }
}

impl StateComponent for Ppu {
    fn state(&self, _format: Option<StateFormat>) -> Result<Vec<u8>, Error> {
        let mut cursor = Cursor::new(vec![]);
        write_bytes(&mut cursor, &self.vram)?;
        write_bytes(&mut cursor, &self.hram)?;
        write_bytes(&mut cursor, &self.oam)?;
        write_bytes(&mut cursor, &self.palettes)?;
        write_u8(&mut cursor, self.scy)?;
        write_u8(&mut cursor, self.scx)?;
        write_u8(&mut cursor, self.wy)?;
        write_u8(&mut cursor, self.wx)?;
        write_u8(&mut cursor, self.ly)?;
        write_u8(&mut cursor, self.lyc)?;
        write_u8(&mut cursor, self.mode as u8)?;
        write_u16(&mut cursor, self.line_dot)?;
        write_u8(&mut cursor, self.lcdc())?;
        write_u8(&mut cursor, self.stat_bits())?;
        write_u8(&mut cursor, self.window_counter)?;
        write_u8(&mut cursor, self.window_triggered as u8)?;
        write_u8(&mut cursor, self.int_vblank as u8)?;
        write_u8(&mut cursor, self.int_stat as u8)?;
        Ok(cursor.into_inner())
    }

    fn set_state(&mut self, data: &[u8], _format: Option<StateFormat>) -> Result<(), Error> {
        let mut cursor = Cursor::new(data);
        self.vram = read_bytes(&mut cursor, VRAM_SIZE)?.try_into().unwrap();
        self.hram = read_bytes(&mut cursor, HRAM_SIZE)?.try_into().unwrap();
        self.oam = read_bytes(&mut cursor, OAM_SIZE)?.try_into().unwrap();
        self.palettes = read_bytes(&mut cursor, 3)?.try_into().unwrap();
        self.scy = read_u8(&mut cursor)?;
        self.scx = read_u8(&mut cursor)?;
        self.wy = read_u8(&mut cursor)?;
        self.wx = read_u8(&mut cursor)?;
        self.ly = read_u8(&mut cursor)?;
        self.lyc = read_u8(&mut cursor)?;
        self.mode = match read_u8(&mut cursor)? {
            1 => PpuMode::VBlank,
            2 => PpuMode::OamRead,
            3 => PpuMode::VramRead,
            _ => PpuMode::HBlank,
        };
        self.line_dot = read_u16(&mut cursor)?;
        let lcdc = read_u8(&mut cursor)?;
        self.set_lcdc(lcdc);
        let stat = read_u8(&mut cursor)?;
        self.set_stat_bits(stat);
        self.window_counter = read_u8(&mut cursor)?;
        self.window_triggered = read_u8(&mut cursor)? != 0;
        self.int_vblank = read_u8(&mut cursor)? != 0;
        self.int_stat = read_u8(&mut cursor)? != 0;
        self.update_vram();
        Ok(())
    }
}

impl Ppu {
    fn lcdc(&self) -> u8 {
        u8::from(self.switch_bg)
            | (u8::from(self.switch_obj) << 1)
            | (u8::from(self.obj_size) << 2)
            | (u8::from(self.bg_map) << 3)
            | (u8::from(self.bg_tile) << 4)
            | (u8::from(self.switch_window) << 5)
            | (u8::from(self.window_map) << 6)
            | (u8::from(self.switch_lcd) << 7)
    }

    fn set_lcdc(&mut self, value: u8) {
        self.switch_bg = value & 0x01 != 0;
        self.switch_obj = value & 0x02 != 0;
        self.obj_size = value & 0x04 != 0;
        self.bg_map = value & 0x08 != 0;
        self.bg_tile = value & 0x10 != 0;
        self.switch_window = value & 0x20 != 0;
        self.window_map = value & 0x40 != 0;
        self.switch_lcd = value & 0x80 != 0;
    }

    fn stat_bits(&self) -> u8 {
        (u8::from(self.stat_hblank))
            | (u8::from(self.stat_vblank) << 1)
            | (u8::from(self.stat_oam) << 2)
            | (u8::from(self.stat_lyc) << 3)
    }

    fn set_stat_bits(&mut self, value: u8) {
        self.stat_hblank = value & 0x01 != 0;
        self.stat_vblank = value & 0x02 != 0;
        self.stat_oam = value & 0x04 != 0;
        self.stat_lyc = value & 0x08 != 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{Ppu, PpuMode};

    #[test]
    fn test_update_tile_simple() {
        let mut ppu = Ppu::default();
        ppu.write(0x8000, 0xff);
        ppu.write(0x8001, 0xff);
        let result = ppu.tiles()[0].get(0, 0);
        assert_eq!(result, 3);
    }

    #[test]
    fn test_oam_scan_limits_to_ten_sprites() {
        let mut ppu = Ppu::default();
        for i in 0..16u16 {
            let base = 0xfe00 + i * 4;
            ppu.write(base, 16); // Y=0
            ppu.write(base + 1, 8 + i as u8); // X
            ppu.write(base + 2, 0);
            ppu.write(base + 3, 0);
        }
        ppu.oam_scan();
        assert_eq!(ppu.selected_sprites.len(), 10);
    }

    #[test]
    fn test_mode_sequence_oam_to_drawing() {
        let mut ppu = Ppu::default();
        ppu.write(0xff40, 0x80); // LCD on, everything else off
        assert_eq!(ppu.mode(), PpuMode::OamRead);
        ppu.clock(80);
        assert_eq!(ppu.mode(), PpuMode::VramRead);
    }

    #[test]
    fn test_wx_wy_not_swapped() {
        let mut ppu = Ppu::default();
        ppu.write(0xff4a, 0x10);
        ppu.write(0xff4b, 0x20);
        assert_eq!(ppu.read(0xff4a), 0x10);
        assert_eq!(ppu.read(0xff4b), 0x20);
    }
}
