use bitflags::bitflags;
use tinyvec::ArrayVec;

bitflags! {
    pub struct AttributeFlags: u8 {
        const PALETTE_NUMBER = 0b0001_0000;
        const X_FLIP         = 0b0010_0000;
        const Y_FLIP         = 0b0100_0000;
        const BG_OVER_OBJ    = 0b1000_0000;
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Sprite {
    pub y: u8,
    pub x: u8,
    pub tile_index: u8,
    pub flags: AttributeFlags,
    /// Index into OAM, used to break position ties: lower OAM index wins.
    pub oam_index: u8,
}

impl Sprite {
    fn from_oam(oam: &[u8; 0xA0], index: u8) -> Self {
        let base = index as usize * 4;
        Sprite {
            y: oam[base],
            x: oam[base + 1],
            tile_index: oam[base + 2],
            flags: AttributeFlags::from_bits_truncate(oam[base + 3]),
            oam_index: index,
        }
    }
}

/// Scans OAM for up to 10 sprites whose Y-range overlaps scanline `ly`,
/// ordered by X (then OAM index) as the hardware's priority resolution
/// expects when pixels overlap during mode 3.
pub fn scan_line(oam: &[u8; 0xA0], ly: u8, tall_sprites: bool) -> ArrayVec<[Sprite; 10]> {
    let height: u8 = if tall_sprites { 16 } else { 8 };
    let mut selected: ArrayVec<[Sprite; 10]> = ArrayVec::new();

    for index in 0..40u8 {
        if selected.len() == 10 {
            break;
        }
        let sprite = Sprite::from_oam(oam, index);
        let top = sprite.y as i16 - 16;
        let ly = ly as i16;
        if ly >= top && ly < top + height as i16 {
            selected.push(sprite);
        }
    }

    selected
}
