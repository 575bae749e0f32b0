use thiserror::Error;

/// The small set of fallible or explicitly-surfaced outcomes this crate exposes.
/// Unmapped memory accesses and internal invariant violations are *not* part of
/// this enum: the former is recovered locally (open-bus reads, swallowed
/// writes), the latter is a `debug_assert!`/`unreachable!` at the call site.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load cartridge: {reason}")]
    LoadFailed { reason: String },

    #[error("illegal opcode {opcode:#04x} at pc={pc:#06x}")]
    IllegalOpcode { opcode: u8, pc: u16 },
}
