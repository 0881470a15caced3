//! Cycle-stepped model of an FX2-class USB microcontroller's bus fabric.
//!
//! The crate reproduces the hardware's interconnect semantics in software:
//! block-granular address decoding, one-cycle-delayed read data, bit-level
//! register write policies, fixed-priority arbitration between the
//! instruction-fetch and data masters, and the register-driven data-toggle
//! table. The CPU execution unit itself is an external collaborator that
//! presents [`CycleInputs`] and consumes [`CycleOutputs`].

/// Configuration and lookup error taxonomy.
pub mod error;
pub use error::{ConfigError, LookupError};

/// Bus masters, transactions, arbitration, and trace hooks.
pub mod bus;
pub use bus::{
    arbitrate, CycleInputs, CycleOutputs, DataRequest, FetchRequest, Grant, MasterId, NullTrace,
    Port, TraceEvent, TraceSink,
};

/// Block-granular address map and decoder.
pub mod map;
pub use map::{AddressMap, DecodedAccess, ResourceId, DEFAULT_BLOCK_SIZE};

/// Byte-addressable storage regions with the wide fetch port.
pub mod memory;
pub use memory::MemoryRegion;

/// Control/status register fields, registers, and the register bank.
pub mod csr;
pub use csr::{
    Field, FieldAccess, Register, RegisterBank, RegisterHandle, RegisterKey, SplitCapability,
    REGISTER_WIDTH,
};

/// USB data-toggle table peripheral.
pub mod toggle;
pub use toggle::{toggle_index, Direction, ToggleTable, TOGGLE_SLOTS};

/// SoC composition and the per-cycle step function.
pub mod soc;
pub use soc::{
    Fx2Soc, Resource, SocConfig, SocRegisters, CPUCS_ADDR, CSR_BASE, CSR_SIZE, EP01_SIZE,
    EP0BCH_ADDR, EP0BCL_ADDR, EP0CS_ADDR, EP0_BASE, EP1_IN_BASE, EP1_OUT_BASE, EP2468_BASE,
    EP2468_SIZE, MAIN_RAM_BASE, MAIN_RAM_SIZE, SCRATCH_BASE, SCRATCH_SIZE, SETUPDAT_ADDR,
    TOGCTL_ADDR, USBFRAMEH_ADDR, USBFRAMEL_ADDR, USBIRQ_ADDR, WAVEFORM_BASE, WAVEFORM_SIZE,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
