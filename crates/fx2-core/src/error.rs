use thiserror::Error;

/// Configuration errors raised while assembling the SoC, before any cycle
/// is simulated.
///
/// Once construction succeeds these can no longer occur; run-time conditions
/// (unmapped accesses, writes to read-only storage) are defined outputs, not
/// errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ConfigError {
    /// Decode block size was not a power of two of at least two.
    #[error("decode block size must be a power of two of at least two, got {0}")]
    InvalidBlockSize(u16),
    /// A region of zero size can never be selected.
    #[error("region at 0x{base:04x} has zero size")]
    ZeroSizeRegion {
        /// Base address of the rejected region.
        base: u16,
    },
    /// The region does not cover a single full decode block.
    #[error("region 0x{base:04x}+0x{size:04x} does not span a full decode block")]
    RegionBelowBlockGranularity {
        /// Base address of the rejected region.
        base: u16,
        /// Size of the rejected region.
        size: u16,
    },
    /// The region's decode blocks intersect an already-mapped region.
    #[error("region 0x{base:04x}+0x{size:04x} overlaps an existing region within one decode block")]
    OverlappingRegions {
        /// Base address of the rejected region.
        base: u16,
        /// Size of the rejected region.
        size: u16,
    },
    /// Registers must carry a non-empty name.
    #[error("register must have a name")]
    EmptyRegisterName,
    /// A register already occupies this bus address.
    #[error("register at address 0x{0:04x} already exists")]
    DuplicateRegisterAddress(u16),
    /// A register with this name was already added to the bank.
    #[error("register named {0:?} already exists")]
    DuplicateRegisterName(String),
    /// The address does not fall inside the bank's frame.
    #[error("address 0x{address:04x} is outside the bank frame 0x{base:04x}+0x{size:04x}")]
    AddressOutsideBank {
        /// The rejected register address.
        address: u16,
        /// Base address of the bank frame.
        base: u16,
        /// Size of the bank frame.
        size: u16,
    },
    /// Fields must carry a non-empty name.
    #[error("field must have a name")]
    EmptyFieldName,
    /// A field with this name was already added to the register.
    #[error("field {0:?} already exists in this register")]
    DuplicateFieldName(String),
    /// The field's bit range does not fit the 8-bit register width.
    #[error("field {name:?} at offset {offset} with size {size} exceeds the 8-bit register width")]
    FieldOutOfRange {
        /// Name of the rejected field.
        name: String,
        /// Bit offset of the rejected field.
        offset: u8,
        /// Bit size of the rejected field.
        size: u8,
    },
    /// The field's bit range intersects bits claimed by an earlier field.
    #[error("field {0:?} overlaps bits already claimed in this register")]
    OverlappingFields(String),
    /// The reset value has bits outside the field's width.
    #[error("field {name:?} reset value 0x{reset:02x} does not fit in {size} bits")]
    ResetTooWide {
        /// Name of the rejected field.
        name: String,
        /// The oversized reset value.
        reset: u8,
        /// Bit size of the field.
        size: u8,
    },
    /// A register wider than the 8-bit bus was requested on a bank that only
    /// supports single-word registers.
    #[error("register {0:?} is wider than one bus word and the bank does not split registers")]
    CompoundRegister(String),
    /// Compound register widths must be a positive multiple of the bus width.
    #[error("compound register {name:?} width of {bits} bits is not a positive multiple of 8")]
    BadCompoundWidth {
        /// Name of the rejected register.
        name: String,
        /// The rejected width in bits.
        bits: u16,
    },
    /// The initial image does not fit the region.
    #[error("initial image of {got} bytes exceeds the region capacity of {capacity} bytes")]
    OversizedImage {
        /// Length of the offered image.
        got: usize,
        /// Capacity of the target region.
        capacity: usize,
    },
    /// The bank was already finalized; its register set is frozen.
    #[error("register bank was already finalized")]
    AlreadyFinalized,
}

/// Lookup failures for register-bank queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum LookupError {
    /// No register is mapped at the queried address.
    #[error("no register at address 0x{0:04x}")]
    UnknownAddress(u16),
    /// No register carries the queried name.
    #[error("no register named {0:?}")]
    UnknownName(String),
    /// The register exists but has no field with the queried name.
    #[error("register {register:?} has no field named {field:?}")]
    UnknownField {
        /// Name of the register that was queried.
        register: String,
        /// The missing field name.
        field: String,
    },
    /// The handle does not refer to a register in this bank.
    #[error("register handle does not belong to this bank")]
    InvalidHandle,
}
