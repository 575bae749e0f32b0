pub mod hram;
pub mod interrupts;
pub mod io_regs;
pub mod joypad;
pub mod wram;

use crate::cartridge::Cartridge;
use crate::ppu::{self, Ppu};
use crate::timer::Timer;
use hram::Hram;
use interrupts::{InterruptFlags, InterruptKind};
use io_regs::IoRegisters;
use joypad::{Joypad, JoypadFlags};
use wram::Wram;

const P1: u16 = 0xFF00;
const DIV: u16 = 0xFF04;
const TIMA: u16 = 0xFF05;
const TMA: u16 = 0xFF06;
const TAC: u16 = 0xFF07;
const IF: u16 = 0xFF0F;
const LCDC: u16 = 0xFF40;
const STAT: u16 = 0xFF41;
const SCY: u16 = 0xFF42;
const SCX: u16 = 0xFF43;
const LY: u16 = 0xFF44;
const LYC: u16 = 0xFF45;
const DMA: u16 = 0xFF46;
const BGP: u16 = 0xFF47;
const OBP0: u16 = 0xFF48;
const OBP1: u16 = 0xFF49;
const WY: u16 = 0xFF4A;
const WX: u16 = 0xFF4B;
const IE: u16 = 0xFFFF;

/// Address dispatch and the peripherals that don't have their own module:
/// the joypad matrix, the IE/IF interrupt bytes, and raw I/O register
/// passthrough. Owns `Cartridge`, `Ppu` and `Timer` directly; nothing here
/// holds a reference back to the CPU (see `request_interrupt`).
pub struct Bus {
    cartridge: Cartridge,
    wram: Wram,
    hram: Hram,
    io: IoRegisters,
    joypad: Joypad,
    pub ppu: Ppu,
    pub timer: Timer,
    ie: InterruptFlags,
    iflag: InterruptFlags,
}

impl Bus {
    pub fn new(cartridge: Cartridge) -> Self {
        Bus {
            cartridge,
            wram: Wram::default(),
            hram: Hram::default(),
            io: IoRegisters::default(),
            joypad: Joypad::default(),
            ppu: Ppu::default(),
            timer: Timer::default(),
            ie: InterruptFlags::empty(),
            iflag: InterruptFlags::VBLANK,
        }
    }

    pub fn request_interrupt(&mut self, kind: InterruptKind) {
        self.iflag.insert(kind.flag());
    }

    pub fn pending_interrupt(&self) -> Option<InterruptKind> {
        InterruptKind::highest_pending(self.ie, self.iflag)
    }

    pub fn ack_interrupt(&mut self, kind: InterruptKind) {
        self.iflag.remove(kind.flag());
    }

    pub fn any_interrupt_pending(&self) -> bool {
        !(self.ie & self.iflag).is_empty()
    }

    /// Raw IF bit 4, independent of IE. STOP's wake condition checks only
    /// this: unlike HALT, a disabled-in-IE JOYPAD source still wakes STOP,
    /// and an unrelated IE-enabled source pending in IF does not.
    pub fn joypad_requested(&self) -> bool {
        self.iflag.contains(InterruptFlags::JOYPAD)
    }

    pub fn set_keys(&mut self, pressed: JoypadFlags) {
        if self.joypad.set_keys(pressed) {
            self.request_interrupt(InterruptKind::Joypad);
        }
    }

    fn dma_blocks(&self, addr: u16) -> bool {
        self.ppu.dma_active() && !(0xFF80..=0xFFFE).contains(&addr)
    }

    pub fn read(&self, addr: u16) -> u8 {
        if self.dma_blocks(addr) {
            return 0xFF;
        }
        self.read_direct(addr)
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        if self.dma_blocks(addr) {
            return;
        }
        self.write_direct(addr, value);
    }

    fn read_direct(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.cartridge.read_rom(addr),
            0x8000..=0x9FFF => {
                if self.ppu.vram_blocked() {
                    0xFF
                } else {
                    self.ppu.read_vram(addr - 0x8000)
                }
            }
            0xA000..=0xBFFF => self.cartridge.read_ram(addr - 0xA000),
            0xC000..=0xDFFF | 0xE000..=0xFDFF => self.wram.read(addr),
            0xFE00..=0xFE9F => {
                if self.ppu.oam_blocked() {
                    0xFF
                } else {
                    self.ppu.read_oam(addr - 0xFE00)
                }
            }
            0xFEA0..=0xFEFF => 0xFF,
            P1 => self.joypad.read_p1(),
            DIV => self.timer.read_div(),
            TIMA => self.timer.read_tima(),
            TMA => self.timer.read_tma(),
            TAC => self.timer.read_tac(),
            IF => self.iflag.bits() | 0b1110_0000,
            LCDC => self.ppu.read_lcdc(),
            STAT => self.ppu.read_stat(),
            SCY => self.ppu.read_scy(),
            SCX => self.ppu.read_scx(),
            LY => self.ppu.read_ly(),
            LYC => self.ppu.read_lyc(),
            DMA => 0xFF,
            BGP => self.ppu.read_bgp(),
            OBP0 => self.ppu.read_obp0(),
            OBP1 => self.ppu.read_obp1(),
            WY => self.ppu.read_wy(),
            WX => self.ppu.read_wx(),
            0xFF80..=0xFFFE => self.hram.read(addr),
            IE => self.ie.bits(),
            0xFF00..=0xFF7F => self.io.read(addr),
            _ => 0xFF,
        }
    }

    fn write_direct(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x7FFF => self.cartridge.write_rom(addr, value),
            0x8000..=0x9FFF => {
                if !self.ppu.vram_blocked() {
                    self.ppu.write_vram(addr - 0x8000, value);
                }
            }
            0xA000..=0xBFFF => self.cartridge.write_ram(addr - 0xA000, value),
            0xC000..=0xDFFF | 0xE000..=0xFDFF => self.wram.write(addr, value),
            0xFE00..=0xFE9F => {
                if !self.ppu.oam_blocked() {
                    self.ppu.write_oam(addr - 0xFE00, value);
                }
            }
            0xFEA0..=0xFEFF => {}
            P1 => self.joypad.write_p1(value),
            DIV => self.timer.write_div(),
            TIMA => self.timer.write_tima(value),
            TMA => self.timer.write_tma(value),
            TAC => self.timer.write_tac(value),
            IF => self.iflag = InterruptFlags::from_bits_truncate(value),
            LCDC => self.ppu.write_lcdc(value),
            STAT => self.ppu.write_stat(value),
            SCY => self.ppu.write_scy(value),
            SCX => self.ppu.write_scx(value),
            LY => {}
            LYC => self.ppu.write_lyc(value),
            DMA => self.ppu.start_oam_dma(value),
            BGP => self.ppu.write_bgp(value),
            OBP0 => self.ppu.write_obp0(value),
            OBP1 => self.ppu.write_obp1(value),
            WY => self.ppu.write_wy(value),
            WX => self.ppu.write_wx(value),
            0xFF80..=0xFFFE => self.hram.write(addr, value),
            IE => self.ie = InterruptFlags::from_bits_truncate(value),
            0xFF00..=0xFF7F => self.io.write(addr, value),
            _ => {}
        }
    }

    pub fn framebuffer(&self) -> &[u8] {
        self.ppu.framebuffer()
    }

    pub fn take_frame_ready(&mut self) -> bool {
        self.ppu.take_frame_ready()
    }

    /// Advances every peripheral by `t_cycles` T-cycles. Called once after a
    /// CPU instruction completes, never interleaved with the instruction's
    /// own memory accesses.
    pub fn step(&mut self, t_cycles: u32) {
        if self.timer.step(t_cycles) {
            self.request_interrupt(InterruptKind::Timer);
        }

        let events = self.ppu.step(t_cycles);
        for kind in ppu::events_to_kinds(events) {
            self.request_interrupt(kind);
        }

        if self.ppu.dma_active() {
            // VRAM, OAM, and the PPU's own registers are resolved inside
            // `step_dma` itself; this closure only needs to cover the rest
            // of the address space so the DMA source read is unrestricted
            // across the full 16-bit range, not just a hand-picked subset.
            let cartridge = &self.cartridge;
            let wram = &self.wram;
            let hram = &self.hram;
            let io = &self.io;
            let joypad = &self.joypad;
            let timer = &self.timer;
            let iflag = self.iflag;
            let ie = self.ie;
            self.ppu.step_dma(t_cycles, |addr| match addr {
                0x0000..=0x7FFF => cartridge.read_rom(addr),
                0xA000..=0xBFFF => cartridge.read_ram(addr - 0xA000),
                0xC000..=0xFDFF => wram.read(addr),
                P1 => joypad.read_p1(),
                DIV => timer.read_div(),
                TIMA => timer.read_tima(),
                TMA => timer.read_tma(),
                TAC => timer.read_tac(),
                IF => iflag.bits() | 0b1110_0000,
                0xFF80..=0xFFFE => hram.read(addr),
                IE => ie.bits(),
                0xFF00..=0xFF7F => io.read(addr),
                _ => 0xFF,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn test_bus() -> Bus {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0104..0x0134].copy_from_slice(&crate::cartridge::header::NINTENDO_LOGO);
        let mut checksum: u8 = 0;
        for &byte in &rom[0x0134..0x014D] {
            checksum = checksum.wrapping_sub(byte).wrapping_sub(1);
        }
        rom[0x014D] = checksum;
        Bus::new(Cartridge::load(rom).unwrap())
    }

    #[test]
    fn test_dma_lockout_returns_0xff_outside_hram() {
        let mut bus = test_bus();
        bus.write(0xC000, 0x42);
        bus.write(0xFF80, 0x99);
        bus.write(DMA, 0x80);
        assert_eq!(bus.read(0xC000), 0xFF);
        assert_eq!(bus.read(0xFF80), 0x99);

        // after DMA's 160 M-cycles complete, normal access resumes.
        bus.step(160 * 4);
        assert_eq!(bus.read(0xC000), 0x42);
    }

    #[test]
    fn test_vram_blocked_during_mode3() {
        let mut bus = test_bus();
        bus.write(0x8000, 0x11); // writes through while in mode 0
        // Drive the PPU into mode 3 in small per-instruction-sized steps, the
        // way the real CPU/Bus interaction always advances it.
        while bus.ppu.read_stat() & 0b11 != 3 {
            bus.step(4);
        }
        assert_eq!(bus.read(0x8000), 0xFF);
        bus.write(0x8000, 0x22);
        assert_eq!(bus.ppu.read_vram(0), 0x11, "write during mode 3 must be dropped");
    }

    #[test]
    fn test_echo_ram_aliases_wram() {
        let mut bus = test_bus();
        bus.write(0xC010, 0x7A);
        assert_eq!(bus.read(0xE010), 0x7A);
        bus.write(0xE020, 0x55);
        assert_eq!(bus.read(0xC020), 0x55);
    }

    #[test]
    fn test_if_initial_value_reads_0xe1() {
        let bus = test_bus();
        assert_eq!(bus.read(IF), 0xE1);
    }

    #[test]
    fn test_oam_dma_can_source_from_vram_and_hram() {
        let mut bus = test_bus();
        // DMA's own internal reads must bypass the lockout it itself creates,
        // and must reach ranges the old ROM/cart-RAM/WRAM-only closure
        // returned 0xFF for.
        bus.step(200 * 4); // clear mode 3 so VRAM writes below land
        while bus.ppu.read_stat() & 0b11 == 3 {
            bus.step(4);
        }
        bus.ppu.write_vram(0, 0x5A);
        bus.write(0xFF80, 0x77);

        bus.write(DMA, 0x80); // source 0x8000, VRAM
        bus.step(160 * 4);
        assert_eq!(bus.read(0xFE00), 0x5A, "DMA must be able to source from VRAM");

        bus.write(DMA, 0xFF); // source 0xFF00..=0xFF9F; progress 0x80 lands on HRAM's 0xFF80
        bus.step(160 * 4);
        assert_eq!(bus.read(0xFE80), 0x77, "DMA must be able to source from HRAM");
    }
}
