pub mod header;
pub mod mbc;
pub mod mbc2;
pub mod mbc3;

use crate::error::Error;
use header::{CartridgeHeader, MbcKind};
use mbc::{Mbc, Mbc1, NoMbc};
use mbc2::Mbc2;
use mbc3::Mbc3;
use std::fmt;

/// A loaded ROM image plus its external RAM and bank-controller state.
pub struct Cartridge {
    pub header: CartridgeHeader,
    rom: Vec<u8>,
    ram: Vec<u8>,
    mbc: Box<dyn Mbc>,
}

impl fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cartridge")
            .field("header", &self.header)
            .field("mbc", &self.mbc)
            .finish()
    }
}

impl Cartridge {
    pub fn load(rom: Vec<u8>) -> Result<Cartridge, Error> {
        let header = CartridgeHeader::parse(&rom)?;
        log::info!(
            "loaded cartridge \"{}\" ({:?}, {} ROM bank(s), {} RAM bank(s))",
            header.title,
            header.mbc_kind,
            header.rom_banks,
            header.ram_banks
        );

        let expected_rom_len = header.rom_banks * 0x4000;
        if rom.len() != expected_rom_len {
            return Err(Error::LoadFailed {
                reason: format!(
                    "rom size {} does not match header's declared {} bytes",
                    rom.len(),
                    expected_rom_len
                ),
            });
        }

        let ram_len = if header.mbc_kind == MbcKind::Mbc2 {
            512
        } else {
            header.ram_banks * 0x2000
        };

        let mbc: Box<dyn Mbc> = match header.mbc_kind {
            MbcKind::None => Box::new(NoMbc::default()),
            MbcKind::Mbc1 => Box::new(Mbc1::new(header.rom_banks, header.ram_banks)),
            MbcKind::Mbc2 => Box::new(Mbc2::new(header.rom_banks)),
            MbcKind::Mbc3 => Box::new(Mbc3::new(header.rom_banks, header.ram_banks)),
        };

        Ok(Cartridge {
            header,
            rom,
            ram: vec![0; ram_len],
            mbc,
        })
    }

    pub fn read_rom(&self, addr: u16) -> u8 {
        self.mbc.read_rom(&self.rom, addr)
    }

    pub fn write_rom(&mut self, addr: u16, value: u8) {
        self.mbc.write_rom(addr, value);
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        self.mbc.read_ram(&self.ram, addr)
    }

    pub fn write_ram(&mut self, addr: u16, value: u8) {
        self.mbc.write_ram(&mut self.ram, addr, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_only(size: usize) -> Vec<u8> {
        let mut rom = vec![0u8; size.max(0x8000)];
        rom[0x0104..0x0134].copy_from_slice(&header::NINTENDO_LOGO);
        rom[0x0147] = 0x00;
        rom[0x0148] = if size > 0x8000 { 0x01 } else { 0x00 };
        let mut checksum: u8 = 0;
        for &byte in &rom[0x0134..0x014D] {
            checksum = checksum.wrapping_sub(byte).wrapping_sub(1);
        }
        rom[0x014D] = checksum;
        rom
    }

    #[test]
    fn test_load_rom_only() {
        let cart = Cartridge::load(rom_only(0x8000)).unwrap();
        assert_eq!(cart.header.mbc_kind, MbcKind::None);
    }

    #[test]
    fn test_load_rejects_truncated_rom() {
        let mut rom = rom_only(0x8000);
        rom[0x0148] = 0x01;
        let result = Cartridge::load(rom);
        assert!(result.is_err());
    }
}
