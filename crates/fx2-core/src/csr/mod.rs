//! Control/status registers: bit-field engine and the addressable bank.

/// Address-indexed register bank and its capability flags.
pub mod bank;
/// Bit fields and single-word registers.
pub mod field;

pub use bank::{RegisterBank, RegisterHandle, RegisterKey, SplitCapability};
pub use field::{Field, FieldAccess, Register, REGISTER_WIDTH};
