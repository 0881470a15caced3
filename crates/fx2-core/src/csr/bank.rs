//! Address-indexed register bank with a finalize-time dispatch table.

use std::collections::HashMap;

use crate::csr::field::{Register, REGISTER_WIDTH};
use crate::error::{ConfigError, LookupError};

/// Whether a bank may host registers wider than one bus word.
///
/// The modeled hardware is inconsistent here: one configuration asserts
/// against compound registers outright, a later one splits them across
/// consecutive addresses. The capability makes the choice explicit instead
/// of guessing a unification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SplitCapability {
    /// Compound registers fail finalize with
    /// [`ConfigError::CompoundRegister`].
    #[default]
    SingleWordOnly,
    /// Compound registers are materialized as consecutive single-byte
    /// registers named `name0..nameN`.
    SplitAcrossAddresses,
}

/// Stable handle to a register added to a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterHandle(usize);

impl RegisterHandle {
    pub(crate) const fn index(self) -> usize {
        self.0
    }
}

/// Key for register lookup: a bus address or a register name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKey<'a> {
    /// Look up by bus address.
    Address(u16),
    /// Look up by register name.
    Name(&'a str),
}

impl From<u16> for RegisterKey<'static> {
    fn from(address: u16) -> Self {
        Self::Address(address)
    }
}

impl<'a> From<&'a str> for RegisterKey<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct PendingSplit {
    address: u16,
    name: String,
    bits: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct HwWrite {
    reg: usize,
    field: String,
    value: u8,
}

/// Bank of control/status registers inside one memory region.
///
/// Registers are added at configuration time against global bus addresses;
/// [`Self::finalize`] freezes the set and builds the read-dispatch table the
/// bus path uses. Reads of frame offsets with no register return 0.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterBank {
    base: u16,
    size: u16,
    capability: SplitCapability,
    registers: Vec<Register>,
    addresses: Vec<u16>,
    by_address: HashMap<u16, usize>,
    by_name: HashMap<String, usize>,
    pending_splits: Vec<PendingSplit>,
    dispatch: Option<Box<[Option<usize>]>>,
    strobe: Option<(u16, u8)>,
    hw_queue: Vec<HwWrite>,
}

impl RegisterBank {
    /// An empty single-word-only bank covering `[base, base + size)`.
    #[must_use]
    pub fn new(base: u16, size: u16) -> Self {
        Self::with_capability(base, size, SplitCapability::SingleWordOnly)
    }

    /// An empty bank with an explicit compound-register capability.
    #[must_use]
    pub fn with_capability(base: u16, size: u16, capability: SplitCapability) -> Self {
        Self {
            base,
            size,
            capability,
            registers: Vec::new(),
            addresses: Vec::new(),
            by_address: HashMap::new(),
            by_name: HashMap::new(),
            pending_splits: Vec::new(),
            dispatch: None,
            strobe: None,
            hw_queue: Vec::new(),
        }
    }

    /// Base bus address of the bank frame.
    #[must_use]
    pub const fn base(&self) -> u16 {
        self.base
    }

    /// Size of the bank frame in bytes.
    #[must_use]
    pub const fn size(&self) -> u16 {
        self.size
    }

    /// True once the register set is frozen.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.dispatch.is_some()
    }

    fn check_address(&self, address: u16) -> Result<(), ConfigError> {
        let end = u32::from(self.base) + u32::from(self.size);
        if u32::from(address) < u32::from(self.base) || u32::from(address) >= end {
            return Err(ConfigError::AddressOutsideBank {
                address,
                base: self.base,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Adds a register at a global bus address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyFinalized`] after [`Self::finalize`],
    /// [`ConfigError::EmptyRegisterName`],
    /// [`ConfigError::AddressOutsideBank`],
    /// [`ConfigError::DuplicateRegisterAddress`], or
    /// [`ConfigError::DuplicateRegisterName`].
    pub fn add(&mut self, address: u16, register: Register) -> Result<RegisterHandle, ConfigError> {
        if self.is_finalized() {
            return Err(ConfigError::AlreadyFinalized);
        }
        if register.name().is_empty() {
            return Err(ConfigError::EmptyRegisterName);
        }
        self.check_address(address)?;
        if self.by_address.contains_key(&address) {
            return Err(ConfigError::DuplicateRegisterAddress(address));
        }
        if self.by_name.contains_key(register.name()) {
            return Err(ConfigError::DuplicateRegisterName(register.name().to_string()));
        }
        let index = self.registers.len();
        self.by_address.insert(address, index);
        self.by_name.insert(register.name().to_string(), index);
        self.addresses.push(address);
        self.registers.push(register);
        Ok(RegisterHandle(index))
    }

    /// Requests a register wider than one bus word, resolved at finalize.
    ///
    /// With [`SplitCapability::SplitAcrossAddresses`] the register becomes
    /// `bits / 8` consecutive byte registers starting at `address`; with the
    /// default capability, finalize fails instead.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyFinalized`],
    /// [`ConfigError::EmptyRegisterName`], or
    /// [`ConfigError::BadCompoundWidth`] when `bits` is zero, not a multiple
    /// of 8, or not wider than one word.
    pub fn add_split(&mut self, address: u16, name: &str, bits: u16) -> Result<(), ConfigError> {
        if self.is_finalized() {
            return Err(ConfigError::AlreadyFinalized);
        }
        if name.is_empty() {
            return Err(ConfigError::EmptyRegisterName);
        }
        if bits == 0 || bits % u16::from(REGISTER_WIDTH) != 0 || bits <= u16::from(REGISTER_WIDTH) {
            return Err(ConfigError::BadCompoundWidth {
                name: name.to_string(),
                bits,
            });
        }
        self.pending_splits.push(PendingSplit {
            address,
            name: name.to_string(),
            bits,
        });
        Ok(())
    }

    /// Freezes the register set and builds the read-dispatch table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyFinalized`] on a second call,
    /// [`ConfigError::CompoundRegister`] when a split was requested on a
    /// single-word-only bank, and any [`Self::add`] error raised while
    /// materializing split registers.
    pub fn finalize(&mut self) -> Result<(), ConfigError> {
        if self.is_finalized() {
            return Err(ConfigError::AlreadyFinalized);
        }
        let pending = std::mem::take(&mut self.pending_splits);
        for split in pending {
            match self.capability {
                SplitCapability::SingleWordOnly => {
                    return Err(ConfigError::CompoundRegister(split.name));
                }
                SplitCapability::SplitAcrossAddresses => {
                    let words = split.bits / u16::from(REGISTER_WIDTH);
                    for word in 0..words {
                        let address = split.address.wrapping_add(word);
                        let name = format!("{}{word}", split.name);
                        self.add(address, Register::byte(&name))?;
                    }
                }
            }
        }
        let mut dispatch = vec![None; usize::from(self.size)].into_boxed_slice();
        for (index, address) in self.addresses.iter().enumerate() {
            let local = usize::from(address.wrapping_sub(self.base));
            if let Some(slot) = dispatch.get_mut(local) {
                *slot = Some(index);
            }
        }
        self.dispatch = Some(dispatch);
        Ok(())
    }

    /// Looks up a register by address or name.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnknownAddress`] or
    /// [`LookupError::UnknownName`] when nothing matches.
    pub fn get<'a>(&self, key: impl Into<RegisterKey<'a>>) -> Result<&Register, LookupError> {
        let index = match key.into() {
            RegisterKey::Address(address) => self
                .by_address
                .get(&address)
                .copied()
                .ok_or(LookupError::UnknownAddress(address))?,
            RegisterKey::Name(name) => self
                .by_name
                .get(name)
                .copied()
                .ok_or_else(|| LookupError::UnknownName(name.to_string()))?,
        };
        self.registers.get(index).ok_or(LookupError::InvalidHandle)
    }

    /// The register behind a handle, when the handle belongs to this bank.
    #[must_use]
    pub fn register(&self, handle: RegisterHandle) -> Option<&Register> {
        self.registers.get(handle.index())
    }

    /// The handle of the register at a bus address, when one exists.
    #[must_use]
    pub fn handle_at(&self, address: u16) -> Option<RegisterHandle> {
        self.by_address.get(&address).copied().map(RegisterHandle)
    }

    /// Every register with its bus address, in ascending address order.
    #[must_use]
    pub fn registers(&self) -> Vec<(u16, &Register)> {
        let mut entries: Vec<(u16, &Register)> = self
            .addresses
            .iter()
            .zip(&self.registers)
            .map(|(address, register)| (*address, register))
            .collect();
        entries.sort_by_key(|(address, _)| *address);
        entries
    }

    /// Queues a hardware-channel write, committed at the next tick.
    ///
    /// This is the only way to mutate read-only fields. When a hardware set
    /// races a clear-on-write acknowledge in the same cycle, the hardware
    /// set wins.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::InvalidHandle`] for a foreign handle and
    /// [`LookupError::UnknownField`] when the register has no such field.
    pub fn hw_write(
        &mut self,
        handle: RegisterHandle,
        field: &str,
        value: u8,
    ) -> Result<(), LookupError> {
        let register = self
            .registers
            .get(handle.index())
            .ok_or(LookupError::InvalidHandle)?;
        if !register.has_field(field) {
            return Err(LookupError::UnknownField {
                register: register.name().to_string(),
                field: field.to_string(),
            });
        }
        self.hw_queue.push(HwWrite {
            reg: handle.index(),
            field: field.to_string(),
            value,
        });
        Ok(())
    }

    fn slot(&self, local: u16) -> Option<usize> {
        let dispatch = self.dispatch.as_ref()?;
        if dispatch.is_empty() {
            return None;
        }
        dispatch
            .get(usize::from(local) % dispatch.len())
            .copied()
            .flatten()
    }

    /// Current concatenated value at a frame offset; 0 when no register is
    /// mapped there or the bank is not finalized.
    #[must_use]
    pub(crate) fn read(&self, local: u16) -> u8 {
        self.slot(local)
            .and_then(|index| self.registers.get(index))
            .map_or(0, Register::value)
    }

    /// Records this cycle's bus write strobe; committed by [`Self::tick`].
    pub(crate) fn bus_write(&mut self, local: u16, data: u8) {
        self.strobe = Some((local, data));
    }

    /// Commits one tick: field effects for the strobed register, pulse
    /// auto-clear everywhere, then the hardware-set queue.
    pub(crate) fn tick(&mut self) {
        let strobe = self.strobe.take();
        let target = strobe.and_then(|(local, _)| self.slot(local));
        for (index, register) in self.registers.iter_mut().enumerate() {
            let data = match (target, strobe) {
                (Some(hit), Some((_, data))) if hit == index => Some(data),
                _ => None,
            };
            register.tick(data);
        }
        let queue = std::mem::take(&mut self.hw_queue);
        for hw in queue {
            if let Some(register) = self.registers.get_mut(hw.reg) {
                register.hw_set(&hw.field, hw.value);
            }
        }
    }

    /// Applies a hardware write immediately, inside the current tick.
    ///
    /// Used by peripherals that refresh mirror fields as part of the tick
    /// sequence itself.
    pub(crate) fn hw_apply(&mut self, handle: RegisterHandle, field: &str, value: u8) {
        if let Some(register) = self.registers.get_mut(handle.index()) {
            register.hw_set(field, value);
        }
    }

    /// Restores every register to its reset value and drops in-flight
    /// strobes and queued hardware writes.
    pub fn reset(&mut self) {
        for register in &mut self.registers {
            register.reset();
        }
        self.strobe = None;
        self.hw_queue.clear();
    }
}
