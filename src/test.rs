//! Test harness helpers shared by the unit test suites of the other modules.
//!
//! Builds fully synthetic, in-memory cartridges instead of depending on
//! external ROM files, so the suite runs the same way in any checkout.

use crate::{
    data::BootRom,
    devices::buffer::BufferDevice,
    error::Error,
    gb::{GameBoy, GameBoyMode},
    ppu::COLOR_BUFFER_SIZE,
};

#[derive(Default)]
pub struct TestOptions {
    pub mode: Option<GameBoyMode>,
    pub ppu_enabled: Option<bool>,
    pub apu_enabled: Option<bool>,
    pub dma_enabled: Option<bool>,
    pub timer_enabled: Option<bool>,
    pub boot_rom: Option<BootRom>,
}

/// Builds a minimal, valid 32 KiB ROM-only cartridge image: a header with
/// a title and a correct header checksum, followed by the given program
/// bytes placed at the entry point (0x0150).
pub fn build_rom(program: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 32 * 1024];
    // 0x0100-0x0103: entry point, `nop; jp 0x0150`
    data[0x0100] = 0x00;
    data[0x0101] = 0xc3;
    data[0x0102] = 0x50;
    data[0x0103] = 0x01;
    // 0x0134-0x0143: title
    let title = b"TESTROM";
    data[0x0134..0x0134 + title.len()].copy_from_slice(title);
    // 0x0147: cartridge type (ROM only), 0x0148: ROM size (32 KiB), 0x0149: RAM size (none)
    data[0x0147] = 0x00;
    data[0x0148] = 0x00;
    data[0x0149] = 0x00;
    // 0x014d: header checksum over 0x0134..=0x014c
    let mut checksum: u8 = 0;
    for byte in &data[0x0134..=0x014c] {
        checksum = checksum.wrapping_sub(*byte).wrapping_sub(1);
    }
    data[0x014d] = checksum;
    data[0x0150..0x0150 + program.len()].copy_from_slice(program);
    data
}

pub fn build_test(options: TestOptions) -> Box<GameBoy> {
    let device = Box::<BufferDevice>::default();
    let mut game_boy = Box::new(GameBoy::new(options.mode));
    game_boy.set_ppu_enabled(options.ppu_enabled.unwrap_or(true));
    game_boy.set_apu_enabled(options.apu_enabled.unwrap_or(true));
    game_boy.set_dma_enabled(options.dma_enabled.unwrap_or(true));
    game_boy.set_timer_enabled(options.timer_enabled.unwrap_or(true));
    game_boy.attach_serial(device);
    let boot = options.boot_rom.unwrap_or_default() != BootRom::None;
    game_boy.load(boot).unwrap();
    game_boy
}

pub fn run_test(program: &[u8], max_cycles: Option<u64>, options: TestOptions) -> Box<GameBoy> {
    let max_cycles = max_cycles.unwrap_or(u64::MAX);
    let mut game_boy = build_test(options);
    game_boy.load_rom(&build_rom(program), None).unwrap();
    game_boy.clocks_cycles(max_cycles as usize);
    game_boy
}

pub fn run_step_test(program: &[u8], addr: u16, options: TestOptions) -> Box<GameBoy> {
    let mut game_boy = build_test(options);
    game_boy.load_rom(&build_rom(program), None).unwrap();
    game_boy.step_to(addr);
    game_boy
}

pub fn run_serial_test(
    program: &[u8],
    max_cycles: Option<u64>,
    options: TestOptions,
) -> (String, Box<GameBoy>) {
    let mut game_boy = run_test(program, max_cycles, options);
    (game_boy.serial().device().state(), game_boy)
}

pub fn run_image_test(
    program: &[u8],
    max_cycles: Option<u64>,
    options: TestOptions,
) -> Result<([u8; COLOR_BUFFER_SIZE], Box<GameBoy>), Error> {
    let mut game_boy = run_test(program, max_cycles, options);
    Ok((*game_boy.frame_buffer(), game_boy))
}

#[cfg(test)]
mod tests {
    use super::{build_rom, run_step_test, TestOptions};
    use crate::consts::{
        BGP_ADDR, DIV_ADDR, DMA_ADDR, IF_ADDR, LCDC_ADDR, LYC_ADDR, LY_ADDR, OBP0_ADDR, OBP1_ADDR,
        SCX_ADDR, SCY_ADDR, STAT_ADDR, TAC_ADDR, TIMA_ADDR, TMA_ADDR, WX_ADDR, WY_ADDR,
    };

    /// Boot ROM disabled start: jumping straight to 0x0100 should land on
    /// the documented post-power-on register and I/O snapshot.
    #[test]
    fn test_boot_state() {
        // infinite loop at the entry point, never reached since the
        // machine jumps straight to the post-boot state at load time
        let program = [0x18, 0xfe]; // jr -2
        let result = run_step_test(&program, 0x0100, TestOptions::default());

        assert_eq!(result.cpu_i().pc(), 0x0100);
        assert_eq!(result.cpu_i().sp(), 0xfffe);
        assert_eq!(result.cpu_i().af(), 0x01b0);
        assert_eq!(result.cpu_i().bc(), 0x0013);
        assert_eq!(result.cpu_i().de(), 0x00d8);
        assert_eq!(result.cpu_i().hl(), 0x014d);
        assert!(!result.cpu_i().ime());

        assert_eq!(result.mmu_i().read(DIV_ADDR), 0xab);
        assert_eq!(result.mmu_i().read(TIMA_ADDR), 0x00);
        assert_eq!(result.mmu_i().read(TMA_ADDR), 0x00);
        assert_eq!(result.mmu_i().read(TAC_ADDR), 0xf8);
        assert_eq!(result.mmu_i().read(IF_ADDR), 0xe1);

        assert_eq!(result.ppu_i().read(LCDC_ADDR), 0x91);
        // mode reads as OAM-scan (2) with the LYC==LY flag set, since the
        // LCDC write that enables the display starts a fresh OAM scan
        // rather than resuming mid-frame as the real boot ROM would
        assert_eq!(result.ppu_i().read(STAT_ADDR) & 0x07, 0x06);
        assert_eq!(result.ppu_i().read(SCY_ADDR), 0x00);
        assert_eq!(result.ppu_i().read(SCX_ADDR), 0x00);
        assert_eq!(result.ppu_i().read(LYC_ADDR), 0x00);
        assert_eq!(result.ppu_i().read(BGP_ADDR), 0xfc);
        assert_eq!(result.ppu_i().read(OBP0_ADDR), 0x00);
        assert_eq!(result.ppu_i().read(OBP1_ADDR), 0x00);
        assert_eq!(result.ppu_i().read(WX_ADDR), 0x00);
        assert_eq!(result.ppu_i().read(WY_ADDR), 0x00);
        assert_eq!(result.ppu_i().read(LY_ADDR), 0x00);

        assert_eq!(result.ppu_i().read(DMA_ADDR), 0x00);
    }

    #[test]
    fn test_rom_checksum_accepted() {
        let program = [0x76]; // halt
        let data = build_rom(&program);
        assert!(crate::rom::Cartridge::from_data(&data).unwrap().valid_checksum());
    }
}
