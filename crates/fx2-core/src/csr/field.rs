//! Bit fields and single-word registers of the CSR bank.

use crate::error::ConfigError;

/// Width in bits of every bus-addressable register.
pub const REGISTER_WIDTH: u8 = 8;

/// Access policy applied to bus writes targeting a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FieldAccess {
    /// Bus writes replace the stored bits.
    #[default]
    ReadWrite,
    /// Bus writes are ignored; only the hardware-set channel mutates the
    /// field.
    ReadOnly,
    /// A bus write drives the field for exactly the following cycle, after
    /// which the engine clears it again; a new write re-arms it.
    Pulse,
}

/// A named bit range inside one register.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Field {
    name: String,
    offset: u8,
    size: u8,
    access: FieldAccess,
    clear_on_write: bool,
    reset: u8,
}

impl Field {
    /// A read-write field of `size` bits starting at bit `offset`.
    #[must_use]
    pub fn new(name: &str, offset: u8, size: u8) -> Self {
        Self {
            name: name.to_string(),
            offset,
            size,
            access: FieldAccess::ReadWrite,
            clear_on_write: false,
            reset: 0,
        }
    }

    /// A single-bit read-write field at bit `offset`.
    #[must_use]
    pub fn bit(name: &str, offset: u8) -> Self {
        Self::new(name, offset, 1)
    }

    /// Marks the field read-only from the bus.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.access = FieldAccess::ReadOnly;
        self
    }

    /// Marks the field as a self-clearing pulse.
    #[must_use]
    pub fn pulse(mut self) -> Self {
        self.access = FieldAccess::Pulse;
        self
    }

    /// Makes incoming 1 bits clear the stored bits instead of setting them.
    ///
    /// Models "write 1 to clear" status flags; incoming 0 bits have no
    /// effect. Combines with any writable access.
    #[must_use]
    pub fn clear_on_write(mut self) -> Self {
        self.clear_on_write = true;
        self
    }

    /// Sets the value the field holds after reset.
    #[must_use]
    pub fn reset(mut self, value: u8) -> Self {
        self.reset = value;
        self
    }

    /// The field's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bit offset inside the register.
    #[must_use]
    pub const fn offset(&self) -> u8 {
        self.offset
    }

    /// Width in bits.
    #[must_use]
    pub const fn size(&self) -> u8 {
        self.size
    }

    /// The bus-write access policy.
    #[must_use]
    pub const fn access(&self) -> FieldAccess {
        self.access
    }

    /// True when incoming 1 bits clear instead of set.
    #[must_use]
    pub const fn is_clear_on_write(&self) -> bool {
        self.clear_on_write
    }

    /// The reset value.
    #[must_use]
    pub const fn reset_value(&self) -> u8 {
        self.reset
    }

    pub(crate) const fn mask(&self) -> u8 {
        if self.size >= REGISTER_WIDTH {
            u8::MAX
        } else {
            (1 << self.size) - 1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct FieldSlot {
    def: Field,
    value: u8,
}

/// One 8-bit bus-addressable register composed of non-overlapping fields.
///
/// The read value is the concatenation of all field values at their offsets;
/// unclaimed bits read 0. Field layout is validated as the register is
/// built, never at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Register {
    name: String,
    fields: Vec<FieldSlot>,
    claimed: u8,
}

impl Register {
    /// An empty register shell; populate it with [`Self::field`].
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            claimed: 0,
        }
    }

    /// A register with one read-write field spanning all eight bits.
    #[must_use]
    pub fn byte(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: vec![FieldSlot {
                def: Field::new("value", 0, REGISTER_WIDTH),
                value: 0,
            }],
            claimed: u8::MAX,
        }
    }

    /// Adds a field, validating its layout against the register.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyFieldName`],
    /// [`ConfigError::DuplicateFieldName`], [`ConfigError::FieldOutOfRange`],
    /// [`ConfigError::ResetTooWide`], or [`ConfigError::OverlappingFields`]
    /// when the field cannot legally join the register.
    pub fn field(mut self, field: Field) -> Result<Self, ConfigError> {
        if field.name.is_empty() {
            return Err(ConfigError::EmptyFieldName);
        }
        if self.fields.iter().any(|slot| slot.def.name == field.name) {
            return Err(ConfigError::DuplicateFieldName(field.name));
        }
        if field.size == 0
            || field.size > REGISTER_WIDTH
            || field.offset >= REGISTER_WIDTH
            || field.offset + field.size > REGISTER_WIDTH
        {
            return Err(ConfigError::FieldOutOfRange {
                name: field.name,
                offset: field.offset,
                size: field.size,
            });
        }
        if field.reset & !field.mask() != 0 {
            return Err(ConfigError::ResetTooWide {
                name: field.name,
                reset: field.reset,
                size: field.size,
            });
        }
        let bits = field.mask() << field.offset;
        if self.claimed & bits != 0 {
            return Err(ConfigError::OverlappingFields(field.name));
        }
        self.claimed |= bits;
        let value = field.reset;
        self.fields.push(FieldSlot { def: field, value });
        Ok(self)
    }

    /// The register's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The concatenated read value.
    #[must_use]
    pub fn value(&self) -> u8 {
        self.fields
            .iter()
            .fold(0, |acc, slot| acc | (slot.value << slot.def.offset))
    }

    /// The current value of one field, right-aligned.
    #[must_use]
    pub fn field_value(&self, name: &str) -> Option<u8> {
        self.fields
            .iter()
            .find(|slot| slot.def.name == name)
            .map(|slot| slot.value)
    }

    /// True when the register declares a field of this name.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|slot| slot.def.name == name)
    }

    /// The field definitions in declaration order.
    #[must_use]
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().map(|slot| &slot.def)
    }

    /// Runs one tick of the field engine.
    ///
    /// `strobe` carries the bus write data when this register was the write
    /// target this cycle. Pulse fields take the strobed bits for exactly one
    /// cycle and fall back to 0 on every tick without a strobe.
    pub(crate) fn tick(&mut self, strobe: Option<u8>) {
        for slot in &mut self.fields {
            let incoming = strobe.map(|data| (data >> slot.def.offset) & slot.def.mask());
            match slot.def.access {
                FieldAccess::Pulse => {
                    slot.value = incoming.unwrap_or(0);
                }
                FieldAccess::ReadOnly => {}
                FieldAccess::ReadWrite => {
                    if let Some(bits) = incoming {
                        if slot.def.clear_on_write {
                            slot.value &= !bits;
                        } else {
                            slot.value = bits;
                        }
                    }
                }
            }
        }
    }

    /// Applies a hardware-channel write to one field, bypassing the bus
    /// policy.
    pub(crate) fn hw_set(&mut self, name: &str, value: u8) {
        if let Some(slot) = self.fields.iter_mut().find(|slot| slot.def.name == name) {
            slot.value = value & slot.def.mask();
        }
    }

    /// Restores every field to its reset value.
    pub(crate) fn reset(&mut self) {
        for slot in &mut self.fields {
            slot.value = slot.def.reset;
        }
    }
}
