//! Bus masters, per-cycle transactions, and the fixed-priority arbiter.
//!
//! Exactly two masters exist by construction: the instruction-fetch master
//! (wide, read-only) and the data master (byte-wide, full address map). They
//! share one physical interconnect, so at most one request is forwarded per
//! cycle.

/// Identifies which master issued or owns a bus transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MasterId {
    /// Instruction-fetch master: 32-bit read-only access to main RAM.
    Fetch,
    /// Data master: 8-bit read/write access to the full address map.
    Data,
}

/// Wide read request issued by the instruction-fetch master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FetchRequest {
    /// Byte address of the first of four fetched lanes.
    pub addr: u16,
}

/// Byte-wide request issued by the data master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DataRequest {
    /// Target bus address.
    pub addr: u16,
    /// True when the write-enable line is driven.
    pub write: bool,
    /// Write data; ignored on reads.
    pub data: u8,
}

impl DataRequest {
    /// Builds a read request.
    #[must_use]
    pub const fn read(addr: u16) -> Self {
        Self {
            addr,
            write: false,
            data: 0,
        }
    }

    /// Builds a write request.
    #[must_use]
    pub const fn write(addr: u16, data: u8) -> Self {
        Self {
            addr,
            write: true,
            data,
        }
    }
}

/// The requests both masters present during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CycleInputs {
    /// Request from the instruction-fetch master, if any.
    pub fetch: Option<FetchRequest>,
    /// Request from the data master, if any.
    pub data: Option<DataRequest>,
}

impl CycleInputs {
    /// A cycle with no requests on either port.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            fetch: None,
            data: None,
        }
    }

    /// A cycle with only an instruction fetch.
    #[must_use]
    pub const fn fetch(addr: u16) -> Self {
        Self {
            fetch: Some(FetchRequest { addr }),
            data: None,
        }
    }

    /// A cycle with only a data-master request.
    #[must_use]
    pub const fn data(request: DataRequest) -> Self {
        Self {
            fetch: None,
            data: Some(request),
        }
    }

    /// A cycle where both masters request the interconnect.
    #[must_use]
    pub const fn contended(fetch_addr: u16, request: DataRequest) -> Self {
        Self {
            fetch: Some(FetchRequest { addr: fetch_addr }),
            data: Some(request),
        }
    }
}

/// The one request forwarded to the decoded resource this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Grant {
    /// The instruction-fetch master owns the interconnect this cycle.
    Fetch(FetchRequest),
    /// The data master owns the interconnect this cycle.
    Data(DataRequest),
}

impl Grant {
    /// The master the grant belongs to.
    #[must_use]
    pub const fn master(self) -> MasterId {
        match self {
            Self::Fetch(_) => MasterId::Fetch,
            Self::Data(_) => MasterId::Data,
        }
    }
}

/// Static-priority mux over the two masters.
///
/// The data master always wins a contended cycle: the CPU core halts
/// instruction fetch whenever it needs the data bus, so genuine simultaneous
/// contention for one resource cannot occur by construction. The losing
/// request is simply not forwarded; there is no queue and no backpressure.
#[must_use]
pub const fn arbitrate(inputs: &CycleInputs) -> Option<Grant> {
    match (inputs.data, inputs.fetch) {
        (Some(data), _) => Some(Grant::Data(data)),
        (None, Some(fetch)) => Some(Grant::Fetch(fetch)),
        (None, None) => None,
    }
}

/// Registered response lines of one master port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Port<T> {
    /// Read data driven back to the master.
    pub data: T,
    /// Acknowledge line; asserts exactly one cycle after an accepted request.
    pub ack: bool,
    /// Error line. The decode policy never asserts it: unmapped accesses
    /// ack with data 0 instead, so the line exists only because the masters
    /// wire it.
    pub err: bool,
}

impl<T: Default> Port<T> {
    /// An idle port: no ack, data lines at rest.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }
}

/// Response lines both masters observe during one cycle.
///
/// The interconnect is a single shared pipe: the data latched for the one
/// forwarded request is what exists on the response lines; the un-granted
/// master sees its ack deasserted and must disregard the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CycleOutputs {
    /// Instruction-fetch port response.
    pub fetch: Port<u32>,
    /// Data port response.
    pub data: Port<u8>,
}

/// Deterministic trace events emitted in cycle order while stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// A master won arbitration and its request was forwarded.
    Granted {
        /// Master that owns the interconnect this cycle.
        master: MasterId,
        /// Address the forwarded request carries.
        addr: u16,
    },
    /// A write was forwarded to a decoded resource.
    Write {
        /// Target bus address.
        addr: u16,
        /// The byte committed at the tick boundary.
        value: u8,
    },
    /// Read data was latched for drive-back on the following cycle.
    Latched {
        /// Master the data belongs to.
        master: MasterId,
        /// Latched read data, widened for the fetch port.
        data: u32,
    },
    /// A forwarded request decoded to no mapped resource.
    Unmapped {
        /// The undecodable address.
        addr: u16,
        /// True when the request was a write.
        write: bool,
    },
    /// A data-toggle bit changed state.
    ToggleFlip {
        /// Index of the affected table slot.
        index: usize,
        /// The bit's new state.
        state: bool,
    },
}

/// Sink trait for deterministic trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn on_event(&mut self, _event: TraceEvent) {}
}
