//! Parsing of the 0x0100..=0x014F cartridge header embedded in every ROM image.

use crate::error::Error;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MbcKind {
    None,
    Mbc1,
    Mbc2,
    Mbc3,
}

#[derive(Debug, Clone)]
pub struct CartridgeHeader {
    pub title: String,
    pub cart_type: u8,
    pub mbc_kind: MbcKind,
    pub has_ram: bool,
    pub has_battery: bool,
    pub rom_banks: usize,
    pub ram_banks: usize,
    pub destination_code: u8,
    pub old_licensee_code: u8,
    pub new_licensee_code: [u8; 2],
    pub mask_rom_version: u8,
    pub header_checksum: u8,
    pub global_checksum: u16,
}

const LOGO_START: usize = 0x0104;
const LOGO_END: usize = 0x0133;

/// The fixed 48-byte Nintendo logo bitmap every licensed cartridge embeds at
/// `0x0104..=0x0133`; the boot ROM refuses to run anything that doesn't match
/// it bit-for-bit, and so do we.
pub(crate) const NINTENDO_LOGO: [u8; 48] = [
    0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C, 0x00, 0x0D, 0x00, 0x08, 0x11, 0x1F, 0x88, 0x89,
    0x00, 0x0E, 0xDC, 0xCC, 0x6E, 0xE6, 0xDD, 0xDD, 0xD9, 0x99, 0xBB, 0xBB, 0x67, 0x63, 0x6E, 0x0E, 0xEC, 0xCC, 0xDD, 0xDC, 0x99, 0x9F,
    0xBB, 0xB9, 0x33, 0x3E,
];

const TITLE_START: usize = 0x0134;
const TITLE_END: usize = 0x0143;
const NEW_LICENSEE_START: usize = 0x0144;
const CART_TYPE: usize = 0x0147;
const ROM_SIZE: usize = 0x0148;
const RAM_SIZE: usize = 0x0149;
const DESTINATION_CODE: usize = 0x014A;
const OLD_LICENSEE_CODE: usize = 0x014B;
const MASK_ROM_VERSION: usize = 0x014C;
const HEADER_CHECKSUM: usize = 0x014D;
const GLOBAL_CHECKSUM: usize = 0x014E;

impl CartridgeHeader {
    pub fn parse(rom: &[u8]) -> Result<CartridgeHeader, Error> {
        if rom.len() < 0x0150 {
            return Err(Error::LoadFailed {
                reason: format!("rom is only {} bytes, too short to contain a header", rom.len()),
            });
        }

        if rom[LOGO_START..=LOGO_END] != NINTENDO_LOGO {
            return Err(Error::LoadFailed {
                reason: "header logo bytes do not match the fixed Nintendo logo pattern".to_string(),
            });
        }

        let title_bytes: Vec<u8> = rom[TITLE_START..=TITLE_END]
            .iter()
            .copied()
            .take_while(|&b| b != 0)
            .collect();
        let title = String::from_utf8_lossy(&title_bytes).into_owned();

        let cart_type = rom[CART_TYPE];
        let (mbc_kind, has_ram, has_battery) = decode_cart_type(cart_type)?;

        let rom_banks = decode_rom_banks(rom[ROM_SIZE])?;
        let ram_banks = decode_ram_banks(rom[RAM_SIZE], mbc_kind)?;

        let header_checksum = rom[HEADER_CHECKSUM];
        verify_header_checksum(rom, header_checksum)?;

        Ok(CartridgeHeader {
            title,
            cart_type,
            mbc_kind,
            has_ram: has_ram || mbc_kind == MbcKind::Mbc2,
            has_battery,
            rom_banks,
            ram_banks,
            destination_code: rom[DESTINATION_CODE],
            old_licensee_code: rom[OLD_LICENSEE_CODE],
            new_licensee_code: [rom[NEW_LICENSEE_START], rom[NEW_LICENSEE_START + 1]],
            mask_rom_version: rom[MASK_ROM_VERSION],
            header_checksum,
            global_checksum: u16::from_be_bytes([rom[GLOBAL_CHECKSUM], rom[GLOBAL_CHECKSUM + 1]]),
        })
    }
}

fn decode_cart_type(byte: u8) -> Result<(MbcKind, bool, bool), Error> {
    use MbcKind::*;
    Ok(match byte {
        0x00 => (None, false, false),
        0x01 => (Mbc1, false, false),
        0x02 => (Mbc1, true, false),
        0x03 => (Mbc1, true, true),
        0x05 => (Mbc2, false, false),
        0x06 => (Mbc2, false, true),
        0x0F => (Mbc3, false, true),
        0x10 => (Mbc3, true, true),
        0x11 => (Mbc3, false, false),
        0x12 => (Mbc3, true, false),
        0x13 => (Mbc3, true, true),
        other => {
            return Err(Error::LoadFailed {
                reason: format!("unsupported cartridge type byte {:#04x}", other),
            })
        }
    })
}

fn decode_rom_banks(byte: u8) -> Result<usize, Error> {
    if byte > 0x08 {
        return Err(Error::LoadFailed {
            reason: format!("unrecognized ROM size byte {:#04x}", byte),
        });
    }
    Ok(2usize << byte)
}

fn decode_ram_banks(byte: u8, mbc_kind: MbcKind) -> Result<usize, Error> {
    if mbc_kind == MbcKind::Mbc2 {
        // MBC2 has its own built-in 512x4-bit RAM, not sized by this byte.
        return Ok(1);
    }
    Ok(match byte {
        0x00 => 0,
        0x01 => 0,
        0x02 => 1,
        0x03 => 4,
        0x04 => 16,
        0x05 => 8,
        other => {
            return Err(Error::LoadFailed {
                reason: format!("unrecognized RAM size byte {:#04x}", other),
            })
        }
    })
}

fn verify_header_checksum(rom: &[u8], expected: u8) -> Result<(), Error> {
    let mut checksum: u8 = 0;
    for &byte in &rom[TITLE_START..HEADER_CHECKSUM] {
        checksum = checksum.wrapping_sub(byte).wrapping_sub(1);
    }
    if checksum != expected {
        return Err(Error::LoadFailed {
            reason: format!(
                "header checksum mismatch: computed {:#04x}, expected {:#04x}",
                checksum, expected
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[LOGO_START..=LOGO_END].copy_from_slice(&NINTENDO_LOGO);
        rom
    }

    fn with_checksum(mut rom: Vec<u8>) -> Vec<u8> {
        let mut checksum: u8 = 0;
        for &byte in &rom[TITLE_START..HEADER_CHECKSUM] {
            checksum = checksum.wrapping_sub(byte).wrapping_sub(1);
        }
        rom[HEADER_CHECKSUM] = checksum;
        rom
    }

    #[test]
    fn test_parse_minimal_rom_only_cartridge() {
        let rom = with_checksum(blank_rom());
        let header = CartridgeHeader::parse(&rom).unwrap();

        assert_eq!(header.mbc_kind, MbcKind::None);
        assert_eq!(header.rom_banks, 2);
        assert_eq!(header.ram_banks, 0);
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let mut rom = with_checksum(blank_rom());
        rom[HEADER_CHECKSUM] ^= 0xFF;

        assert!(CartridgeHeader::parse(&rom).is_err());
    }

    #[test]
    fn test_rejects_mismatched_logo() {
        let mut rom = with_checksum(blank_rom());
        rom[LOGO_START] ^= 0xFF;

        assert!(CartridgeHeader::parse(&rom).is_err());
    }

    #[test]
    fn test_parse_title() {
        let mut rom = blank_rom();
        rom[TITLE_START..TITLE_START + 6].copy_from_slice(b"TETRIS");
        let rom = with_checksum(rom);

        let header = CartridgeHeader::parse(&rom).unwrap();
        assert_eq!(header.title, "TETRIS");
    }

    #[test]
    fn test_ram_size_code_0x01_means_zero_banks() {
        let mut rom = blank_rom();
        rom[CART_TYPE] = 0x02; // MBC1+RAM
        rom[RAM_SIZE] = 0x01;
        let rom = with_checksum(rom);

        let header = CartridgeHeader::parse(&rom).unwrap();
        assert_eq!(header.ram_banks, 0);
    }

    #[test]
    fn test_mbc1_with_ram_and_battery() {
        let mut rom = blank_rom();
        rom[CART_TYPE] = 0x03;
        rom[RAM_SIZE] = 0x03;
        let rom = with_checksum(rom);

        let header = CartridgeHeader::parse(&rom).unwrap();
        assert_eq!(header.mbc_kind, MbcKind::Mbc1);
        assert!(header.has_ram);
        assert!(header.has_battery);
        assert_eq!(header.ram_banks, 4);
    }
}
