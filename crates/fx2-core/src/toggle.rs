//! USB data-toggle table, driven entirely through its control register.
//!
//! One bit of data-phase state exists per (endpoint, direction) pair.
//! Endpoint 0 and the unsplit endpoints (2, 4, 6, 8) carry one bit each;
//! endpoint 1 carries one per direction. Firmware selects a pair through the
//! control register's selector fields, pulses `s` or `r` to force the bit,
//! and reads it back through the `q` mirror.

use crate::bus::{TraceEvent, TraceSink};
use crate::csr::{Field, Register, RegisterBank, RegisterHandle};
use crate::error::ConfigError;

/// Number of distinct toggle bits.
pub const TOGGLE_SLOTS: usize = 7;

/// Transfer direction of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Direction {
    /// Host-to-device.
    Out,
    /// Device-to-host.
    In,
}

impl Direction {
    /// The direction's encoding in the control register's `io` bit.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Out => 0,
            Self::In => 1,
        }
    }

    /// Decodes the `io` bit.
    #[must_use]
    pub const fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            Self::Out
        } else {
            Self::In
        }
    }
}

/// Maps an (endpoint, direction) pair to its slot in the toggle table.
///
/// Endpoint 0 maps to slot 0, endpoint 1 to slots 1 (OUT) and 2 (IN), and
/// endpoints 2, 4, 6, 8 to slots 3..=6 regardless of direction. Every other
/// endpoint number is outside the modeled hardware and yields `None`.
#[must_use]
pub fn toggle_index(endpoint: u8, direction: Direction) -> Option<usize> {
    match endpoint {
        0 => Some(0),
        1 => Some(1 + usize::from(direction.bit())),
        2 | 4 | 6 | 8 => Some(usize::from(endpoint) / 2 + 2),
        _ => None,
    }
}

/// The data-toggle table and its control register.
///
/// [`Self::attach`] registers the control register in the CSR bank:
///
/// | bits | field | policy |
/// |------|-------|--------|
/// | 3..0 | `ep`  | read-write endpoint selector |
/// | 4    | `io`  | read-write direction selector |
/// | 5    | `r`   | reset pulse |
/// | 6    | `s`   | set pulse |
/// | 7    | `q`   | read-only mirror of the selected bit |
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ToggleTable {
    bits: [bool; TOGGLE_SLOTS],
    ctl: RegisterHandle,
}

impl ToggleTable {
    /// Builds the table and adds its control register to `bank` at
    /// `address`.
    ///
    /// # Errors
    ///
    /// Propagates the bank's configuration errors when the address is taken
    /// or outside the bank frame.
    pub fn attach(bank: &mut RegisterBank, address: u16) -> Result<Self, ConfigError> {
        let ctl = Register::new("togctl")
            .field(Field::new("ep", 0, 4))?
            .field(Field::bit("io", 4))?
            .field(Field::bit("r", 5).pulse())?
            .field(Field::bit("s", 6).pulse())?
            .field(Field::bit("q", 7).read_only())?;
        let ctl = bank.add(address, ctl)?;
        Ok(Self {
            bits: [false; TOGGLE_SLOTS],
            ctl,
        })
    }

    /// Handle of the control register inside the owning bank.
    #[must_use]
    pub const fn handle(&self) -> RegisterHandle {
        self.ctl
    }

    /// Current state of one toggle bit, or `None` outside the endpoint
    /// domain.
    #[must_use]
    pub fn bit(&self, endpoint: u8, direction: Direction) -> Option<bool> {
        toggle_index(endpoint, direction).and_then(|index| self.bits.get(index).copied())
    }

    fn selected(bank: &RegisterBank, ctl: RegisterHandle) -> Option<usize> {
        let register = bank.register(ctl)?;
        let endpoint = register.field_value("ep")?;
        let io = register.field_value("io")?;
        toggle_index(endpoint, Direction::from_bit(io))
    }

    /// Applies this cycle's set/reset pulses to the addressed bit.
    ///
    /// Runs before the bank tick so the pulse values seen are the ones
    /// visible during the current cycle. A set pulse wins a simultaneous
    /// reset. Out-of-domain selector values leave the table untouched.
    pub(crate) fn apply<S: TraceSink>(&mut self, bank: &RegisterBank, sink: &mut S) {
        let Some(register) = bank.register(self.ctl) else {
            return;
        };
        let set = register.field_value("s").unwrap_or(0) != 0;
        let reset = register.field_value("r").unwrap_or(0) != 0;
        if !set && !reset {
            return;
        }
        let Some(index) = Self::selected(bank, self.ctl) else {
            return;
        };
        let state = set;
        if let Some(slot) = self.bits.get_mut(index) {
            if *slot != state {
                sink.on_event(TraceEvent::ToggleFlip { index, state });
            }
            *slot = state;
        }
    }

    /// Clears every toggle bit, as a device reset does.
    pub(crate) fn reset(&mut self) {
        self.bits = [false; TOGGLE_SLOTS];
    }

    /// Refreshes the `q` mirror from the post-tick selector and table.
    ///
    /// Runs after the bank tick, as the last sub-step of the cycle commit.
    pub(crate) fn refresh_mirror(&self, bank: &mut RegisterBank) {
        let mirrored = Self::selected(bank, self.ctl)
            .and_then(|index| self.bits.get(index).copied())
            .unwrap_or(false);
        bank.hw_apply(self.ctl, "q", u8::from(mirrored));
    }
}
