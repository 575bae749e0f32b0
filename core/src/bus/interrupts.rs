use bitflags::bitflags;

bitflags! {
    #[derive(Default)]
    pub struct InterruptFlags: u8 {
        const VBLANK = 0b0000_0001;
        const LCD    = 0b0000_0010;
        const TIMER  = 0b0000_0100;
        const SERIAL = 0b0000_1000;
        const JOYPAD = 0b0001_0000;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InterruptKind {
    VBlank,
    Lcd,
    Timer,
    Serial,
    Joypad,
}

impl InterruptKind {
    pub fn flag(self) -> InterruptFlags {
        match self {
            InterruptKind::VBlank => InterruptFlags::VBLANK,
            InterruptKind::Lcd => InterruptFlags::LCD,
            InterruptKind::Timer => InterruptFlags::TIMER,
            InterruptKind::Serial => InterruptFlags::SERIAL,
            InterruptKind::Joypad => InterruptFlags::JOYPAD,
        }
    }

    pub fn vector(self) -> u16 {
        match self {
            InterruptKind::VBlank => 0x0040,
            InterruptKind::Lcd => 0x0048,
            InterruptKind::Timer => 0x0050,
            InterruptKind::Serial => 0x0058,
            InterruptKind::Joypad => 0x0060,
        }
    }

    /// Priority order, lowest value serviced first when several are pending.
    const ORDER: [InterruptKind; 5] = [
        InterruptKind::VBlank,
        InterruptKind::Lcd,
        InterruptKind::Timer,
        InterruptKind::Serial,
        InterruptKind::Joypad,
    ];

    pub fn highest_pending(ie: InterruptFlags, iflag: InterruptFlags) -> Option<InterruptKind> {
        let pending = ie & iflag;
        Self::ORDER.iter().copied().find(|kind| pending.contains(kind.flag()))
    }
}
