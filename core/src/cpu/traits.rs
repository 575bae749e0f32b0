//! Operand abstraction: every instruction operand (a register, an immediate,
//! or one of the handful of indirect addressing forms) implements these so
//! `ops.rs` can write `self.read8(bus, src)` without a match on every
//! instruction variant.

use super::decode::Operand8;
use super::registers::{Reg16, Reg8};
use super::Cpu;
use crate::bus::Bus;

pub trait ToU8<T: Copy> {
    fn read8(&mut self, bus: &mut Bus, target: T) -> u8;
}

pub trait SetU8<T: Copy> {
    fn write8(&mut self, bus: &mut Bus, target: T, value: u8);
}

pub trait ToU16<T: Copy> {
    fn read16(&mut self, bus: &mut Bus, target: T) -> u16;
}

pub trait SetU16<T: Copy> {
    fn write16(&mut self, bus: &mut Bus, target: T, value: u16);
}

impl ToU8<Reg8> for Cpu {
    fn read8(&mut self, _bus: &mut Bus, target: Reg8) -> u8 {
        self.registers.get8(target)
    }
}

impl SetU8<Reg8> for Cpu {
    fn write8(&mut self, _bus: &mut Bus, target: Reg8, value: u8) {
        self.registers.set8(target, value);
    }
}

impl ToU16<Reg16> for Cpu {
    fn read16(&mut self, _bus: &mut Bus, target: Reg16) -> u16 {
        self.registers.get16(target)
    }
}

impl SetU16<Reg16> for Cpu {
    fn write16(&mut self, _bus: &mut Bus, target: Reg16, value: u16) {
        self.registers.set16(target, value);
    }
}

impl ToU8<Operand8> for Cpu {
    fn read8(&mut self, bus: &mut Bus, target: Operand8) -> u8 {
        match target {
            Operand8::Reg(reg) => self.registers.get8(reg),
            Operand8::Immediate => self.fetch_byte(bus),
            Operand8::IndirectHL => {
                let addr = self.registers.hl();
                self.read_byte(bus, addr)
            }
            Operand8::IndirectBC => {
                let addr = self.registers.bc();
                self.read_byte(bus, addr)
            }
            Operand8::IndirectDE => {
                let addr = self.registers.de();
                self.read_byte(bus, addr)
            }
            Operand8::IndirectImmediate => {
                let addr = self.fetch_word(bus);
                self.read_byte(bus, addr)
            }
            Operand8::IndirectC => {
                let addr = 0xFF00 | self.registers.c as u16;
                self.read_byte(bus, addr)
            }
            Operand8::IndirectImmediateHigh => {
                let low = self.fetch_byte(bus);
                self.read_byte(bus, 0xFF00 | low as u16)
            }
        }
    }
}

impl SetU8<Operand8> for Cpu {
    fn write8(&mut self, bus: &mut Bus, target: Operand8, value: u8) {
        match target {
            Operand8::Reg(reg) => self.registers.set8(reg, value),
            Operand8::Immediate => unreachable!("immediate operand is never a write target"),
            Operand8::IndirectHL => {
                let addr = self.registers.hl();
                self.write_byte(bus, addr, value);
            }
            Operand8::IndirectBC => {
                let addr = self.registers.bc();
                self.write_byte(bus, addr, value);
            }
            Operand8::IndirectDE => {
                let addr = self.registers.de();
                self.write_byte(bus, addr, value);
            }
            Operand8::IndirectImmediate => {
                let addr = self.fetch_word(bus);
                self.write_byte(bus, addr, value);
            }
            Operand8::IndirectC => {
                let addr = 0xFF00 | self.registers.c as u16;
                self.write_byte(bus, addr, value);
            }
            Operand8::IndirectImmediateHigh => {
                let low = self.fetch_byte(bus);
                self.write_byte(bus, 0xFF00 | low as u16, value);
            }
        }
    }
}
