//! DIV/TIMA/TMA/TAC. Two independent T-cycle accumulators: one fixed for DIV,
//! one for TIMA whose threshold is selected by `TAC`.

use bitflags::bitflags;
use num_integer::Integer;

bitflags! {
    #[derive(Default)]
    struct TimerControl: u8 {
        const ENABLE = 0b0000_0100;
        const CLOCK_SELECT = 0b0000_0011;
    }
}

const DIV_THRESHOLD: u32 = 256;

fn tima_threshold(tac: u8) -> u32 {
    match tac & 0b11 {
        0b00 => 1024,
        0b01 => 16,
        0b10 => 64,
        0b11 => 256,
        _ => unreachable!(),
    }
}

#[derive(Debug, Default)]
pub struct Timer {
    div: u8,
    tima: u8,
    tma: u8,
    tac: u8,
    div_accum: u32,
    tima_accum: u32,
}

impl Timer {
    pub fn read_div(&self) -> u8 {
        self.div
    }

    pub fn write_div(&mut self) {
        // Any write resets the divider, regardless of the value written.
        self.div = 0;
        self.div_accum = 0;
    }

    pub fn read_tima(&self) -> u8 {
        self.tima
    }

    pub fn write_tima(&mut self, value: u8) {
        self.tima = value;
    }

    pub fn read_tma(&self) -> u8 {
        self.tma
    }

    pub fn write_tma(&mut self, value: u8) {
        self.tma = value;
    }

    pub fn read_tac(&self) -> u8 {
        self.tac | 0b1111_1000
    }

    pub fn write_tac(&mut self, value: u8) {
        self.tac = value & 0b111;
    }

    /// Advances the timer by `t_cycles` T-cycles. Returns `true` exactly when
    /// TIMA overflowed and reloaded from TMA, so the caller can raise TIMER.
    pub fn step(&mut self, t_cycles: u32) -> bool {
        self.div_accum += t_cycles;
        let (div_ticks, div_rem) = self.div_accum.div_rem(&DIV_THRESHOLD);
        self.div = self.div.wrapping_add(div_ticks as u8);
        self.div_accum = div_rem;

        if self.tac & TimerControl::ENABLE.bits() == 0 {
            return false;
        }

        let threshold = tima_threshold(self.tac);
        self.tima_accum += t_cycles;
        let (tima_ticks, tima_rem) = self.tima_accum.div_rem(&threshold);
        self.tima_accum = tima_rem;

        let mut overflowed = false;
        for _ in 0..tima_ticks {
            let (next, carried) = self.tima.overflowing_add(1);
            if carried {
                self.tima = self.tma;
                overflowed = true;
            } else {
                self.tima = next;
            }
        }
        overflowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_div_increments_every_256_t_cycles() {
        let mut timer = Timer::default();
        timer.step(255);
        assert_eq!(timer.read_div(), 0);
        timer.step(1);
        assert_eq!(timer.read_div(), 1);
    }

    #[test]
    fn test_div_write_resets_to_zero() {
        let mut timer = Timer::default();
        timer.step(300);
        assert_ne!(timer.read_div(), 0);
        timer.write_div();
        assert_eq!(timer.read_div(), 0);
    }

    #[test]
    fn test_tima_disabled_does_not_tick() {
        let mut timer = Timer::default();
        timer.write_tac(0b000);
        let overflowed = timer.step(100_000);
        assert!(!overflowed);
        assert_eq!(timer.read_tima(), 0);
    }

    #[test]
    fn test_tima_overflow_reloads_from_tma_and_raises_interrupt() {
        let mut timer = Timer::default();
        timer.write_tma(0x7C);
        timer.write_tac(0b101); // enabled, clock select 01 (threshold 16)
        timer.write_tima(0xFF);

        let overflowed = timer.step(16);
        assert!(overflowed);
        assert_eq!(timer.read_tima(), 0x7C);
    }
}
