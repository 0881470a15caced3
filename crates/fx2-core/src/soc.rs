//! SoC composition and the per-cycle step function.
//!
//! [`Fx2Soc`] wires the TRM 5.6 memory layout onto one shared interconnect:
//! main RAM with the wide fetch port, the scratch and endpoint buffers, and
//! the CSR bank with the data-toggle peripheral. Each call to [`Fx2Soc::step`]
//! simulates exactly one clock cycle: combinational arbitration and decode
//! from this cycle's inputs, outputs driven from state registered at the
//! previous tick, and all sequential effects committed at the tick boundary.

use crate::bus::{
    arbitrate, CycleInputs, CycleOutputs, Grant, MasterId, NullTrace, Port, TraceEvent, TraceSink,
};
use crate::csr::{Field, Register, RegisterBank, RegisterHandle, SplitCapability};
use crate::error::ConfigError;
use crate::map::{AddressMap, ResourceId};
use crate::memory::MemoryRegion;
use crate::toggle::ToggleTable;

/// Base address of main RAM.
pub const MAIN_RAM_BASE: u16 = 0x0000;
/// Size of main RAM: 16 KiB shared by code and data.
pub const MAIN_RAM_SIZE: u16 = 0x4000;
/// Base address of the scratch RAM.
pub const SCRATCH_BASE: u16 = 0xe000;
/// Size of the scratch RAM.
pub const SCRATCH_SIZE: u16 = 0x0200;
/// Base address of the waveform-descriptor buffer.
pub const WAVEFORM_BASE: u16 = 0xe400;
/// Size of the waveform-descriptor buffer.
pub const WAVEFORM_SIZE: u16 = 0x0080;
/// Base address of the CSR frame.
pub const CSR_BASE: u16 = 0xe500;
/// Size of the CSR frame.
pub const CSR_SIZE: u16 = 0x0200;
/// Base address of the endpoint-0 buffer.
pub const EP0_BASE: u16 = 0xe740;
/// Size of each endpoint-0/1 buffer.
pub const EP01_SIZE: u16 = 0x0040;
/// Base address of the endpoint-1 OUT buffer.
pub const EP1_OUT_BASE: u16 = 0xe780;
/// Base address of the endpoint-1 IN buffer.
pub const EP1_IN_BASE: u16 = 0xe7c0;
/// Base address of the shared endpoint-2/4/6/8 buffer.
pub const EP2468_BASE: u16 = 0xf000;
/// Size of the shared endpoint-2/4/6/8 buffer.
pub const EP2468_SIZE: u16 = 0x1000;

/// Address of the CPU control/status register.
pub const CPUCS_ADDR: u16 = 0xe600;
/// Address of the USB interrupt-request register.
pub const USBIRQ_ADDR: u16 = 0xe65d;
/// Address of the data-toggle control register.
pub const TOGCTL_ADDR: u16 = 0xe683;
/// Address of the frame-number high register.
pub const USBFRAMEH_ADDR: u16 = 0xe684;
/// Address of the frame-number low register.
pub const USBFRAMEL_ADDR: u16 = 0xe685;
/// Address of the endpoint-0 byte-count high register.
pub const EP0BCH_ADDR: u16 = 0xe68a;
/// Address of the endpoint-0 byte-count low register.
pub const EP0BCL_ADDR: u16 = 0xe68b;
/// Address of the endpoint-0 control/status register.
pub const EP0CS_ADDR: u16 = 0xe6a0;
/// First address of the 8-byte setup-data block.
pub const SETUPDAT_ADDR: u16 = 0xe6b8;

/// Which storage a decoded [`ResourceId`] dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Resource {
    /// Main code/data RAM with the wide fetch port.
    MainRam,
    /// Data-only scratch RAM.
    Scratch,
    /// Waveform-descriptor buffer.
    Waveform,
    /// The CSR bank.
    CsrBank,
    /// Endpoint-0 buffer.
    Ep0,
    /// Endpoint-1 OUT buffer.
    Ep1Out,
    /// Endpoint-1 IN buffer.
    Ep1In,
    /// Shared endpoint-2/4/6/8 buffer.
    Ep2468,
}

/// Construction-time configuration of the SoC.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SocConfig {
    /// Initial main-RAM image, loaded at address 0 and zero-padded.
    pub code: Vec<u8>,
    /// Treat main RAM as hard-coded instruction storage that drops writes.
    pub code_read_only: bool,
}

/// Handles to the registers the stock SoC defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SocRegisters {
    /// CPU control/status register.
    pub cpucs: RegisterHandle,
    /// USB interrupt-request flags.
    pub usbirq: RegisterHandle,
    /// Data-toggle control register.
    pub togctl: RegisterHandle,
    /// Frame-number high byte.
    pub usbframeh: RegisterHandle,
    /// Frame-number low byte.
    pub usbframel: RegisterHandle,
    /// Endpoint-0 byte-count high byte.
    pub ep0bch: RegisterHandle,
    /// Endpoint-0 byte-count low byte.
    pub ep0bcl: RegisterHandle,
    /// Endpoint-0 control/status register.
    pub ep0cs: RegisterHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct BusLatch {
    fetch: Port<u32>,
    data: Port<u8>,
}

/// The FX2-class SoC bus model.
///
/// Two masters share the interconnect: the instruction-fetch master (wide,
/// wired to main RAM only) and the data master (byte-wide, full map). One
/// request is forwarded per cycle; the response appears on the granted
/// master's port exactly one cycle later.
///
/// Accesses that decode to no region follow a fixed policy: they ack one
/// cycle later with read data 0, and writes are dropped. The modeled part
/// leaves unmapped behavior undefined; a deterministic simulation cannot
/// usefully model a hung bus, so the permissive policy is used throughout.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Fx2Soc {
    map: AddressMap,
    slaves: Vec<Resource>,
    main_ram: MemoryRegion,
    scratch: MemoryRegion,
    waveform: MemoryRegion,
    ep0: MemoryRegion,
    ep1_out: MemoryRegion,
    ep1_in: MemoryRegion,
    ep2468: MemoryRegion,
    bank: RegisterBank,
    toggles: ToggleTable,
    regs: SocRegisters,
    main_ram_id: ResourceId,
    latch: BusLatch,
}

fn map_resource(
    map: &mut AddressMap,
    slaves: &mut Vec<Resource>,
    base: u16,
    size: u16,
    resource: Resource,
) -> Result<ResourceId, ConfigError> {
    let id = ResourceId::new(slaves.len());
    map.add_region(base, size, id)?;
    slaves.push(resource);
    Ok(id)
}

fn build_csr_bank() -> Result<(RegisterBank, ToggleTable, SocRegisters), ConfigError> {
    let mut bank =
        RegisterBank::with_capability(CSR_BASE, CSR_SIZE, SplitCapability::SplitAcrossAddresses);

    let cpucs = bank.add(
        CPUCS_ADDR,
        Register::new("cpucs").field(Field::new("clkspd", 3, 2))?,
    )?;
    let usbirq = bank.add(
        USBIRQ_ADDR,
        Register::new("usbirq")
            .field(Field::bit("sudav", 0).clear_on_write())?
            .field(Field::bit("sof", 1).clear_on_write())?
            .field(Field::bit("sutok", 2).clear_on_write())?
            .field(Field::bit("susp", 3).clear_on_write())?
            .field(Field::bit("ures", 4).clear_on_write())?
            .field(Field::bit("hsgrant", 5).clear_on_write())?
            .field(Field::bit("ep0ack", 6).clear_on_write())?,
    )?;
    let toggles = ToggleTable::attach(&mut bank, TOGCTL_ADDR)?;
    let usbframeh = bank.add(USBFRAMEH_ADDR, Register::byte("usbframeh"))?;
    let usbframel = bank.add(USBFRAMEL_ADDR, Register::byte("usbframel"))?;
    let ep0bch = bank.add(EP0BCH_ADDR, Register::byte("ep0bch"))?;
    let ep0bcl = bank.add(EP0BCL_ADDR, Register::byte("ep0bcl"))?;
    let ep0cs = bank.add(
        EP0CS_ADDR,
        Register::new("ep0cs")
            .field(Field::bit("stall", 0))?
            .field(Field::bit("busy", 1).read_only())?
            .field(Field::bit("hsnak", 7).clear_on_write().reset(1))?,
    )?;
    bank.add_split(SETUPDAT_ADDR, "setupdat", 64)?;
    bank.finalize()?;

    let regs = SocRegisters {
        cpucs,
        usbirq,
        togctl: toggles.handle(),
        usbframeh,
        usbframel,
        ep0bch,
        ep0bcl,
        ep0cs,
    };
    Ok((bank, toggles, regs))
}

impl Fx2Soc {
    /// Builds the SoC, loading the initial main-RAM image.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the image does not fit main RAM. The
    /// fixed region and register layout itself cannot fail, but its
    /// construction uses the same fallible configuration interface as
    /// caller-supplied layouts.
    pub fn new(config: &SocConfig) -> Result<Self, ConfigError> {
        let main_ram = if config.code_read_only {
            MemoryRegion::read_only(MAIN_RAM_SIZE)
        } else {
            MemoryRegion::new(MAIN_RAM_SIZE)
        }
        .with_contents(&config.code)?;

        let mut map = AddressMap::new();
        let mut slaves = Vec::new();
        let main_ram_id = map_resource(
            &mut map,
            &mut slaves,
            MAIN_RAM_BASE,
            MAIN_RAM_SIZE,
            Resource::MainRam,
        )?;
        map_resource(
            &mut map,
            &mut slaves,
            SCRATCH_BASE,
            SCRATCH_SIZE,
            Resource::Scratch,
        )?;
        map_resource(
            &mut map,
            &mut slaves,
            WAVEFORM_BASE,
            WAVEFORM_SIZE,
            Resource::Waveform,
        )?;
        map_resource(&mut map, &mut slaves, CSR_BASE, CSR_SIZE, Resource::CsrBank)?;
        map_resource(&mut map, &mut slaves, EP0_BASE, EP01_SIZE, Resource::Ep0)?;
        map_resource(
            &mut map,
            &mut slaves,
            EP1_OUT_BASE,
            EP01_SIZE,
            Resource::Ep1Out,
        )?;
        map_resource(
            &mut map,
            &mut slaves,
            EP1_IN_BASE,
            EP01_SIZE,
            Resource::Ep1In,
        )?;
        map_resource(
            &mut map,
            &mut slaves,
            EP2468_BASE,
            EP2468_SIZE,
            Resource::Ep2468,
        )?;

        let (bank, toggles, regs) = build_csr_bank()?;

        Ok(Self {
            map,
            slaves,
            main_ram,
            scratch: MemoryRegion::new(SCRATCH_SIZE),
            waveform: MemoryRegion::new(WAVEFORM_SIZE),
            ep0: MemoryRegion::new(EP01_SIZE),
            ep1_out: MemoryRegion::new(EP01_SIZE),
            ep1_in: MemoryRegion::new(EP01_SIZE),
            ep2468: MemoryRegion::new(EP2468_SIZE),
            bank,
            toggles,
            regs,
            main_ram_id,
            latch: BusLatch::default(),
        })
    }

    /// The address map in use.
    #[must_use]
    pub const fn map(&self) -> &AddressMap {
        &self.map
    }

    /// Main RAM contents.
    #[must_use]
    pub const fn main_ram(&self) -> &MemoryRegion {
        &self.main_ram
    }

    /// The CSR bank.
    #[must_use]
    pub const fn csr_bank(&self) -> &RegisterBank {
        &self.bank
    }

    /// Mutable CSR bank access, for driving the hardware-set channel.
    #[must_use]
    pub fn csr_bank_mut(&mut self) -> &mut RegisterBank {
        &mut self.bank
    }

    /// Handles to the stock register set.
    #[must_use]
    pub const fn regs(&self) -> &SocRegisters {
        &self.regs
    }

    /// The data-toggle table.
    #[must_use]
    pub const fn toggles(&self) -> &ToggleTable {
        &self.toggles
    }

    fn resource_at(&self, id: ResourceId) -> Option<Resource> {
        self.slaves.get(id.index()).copied()
    }

    fn read_slave(&self, resource: Resource, local: u16) -> u8 {
        match resource {
            Resource::MainRam => self.main_ram.read(local),
            Resource::Scratch => self.scratch.read(local),
            Resource::Waveform => self.waveform.read(local),
            Resource::CsrBank => self.bank.read(local),
            Resource::Ep0 => self.ep0.read(local),
            Resource::Ep1Out => self.ep1_out.read(local),
            Resource::Ep1In => self.ep1_in.read(local),
            Resource::Ep2468 => self.ep2468.read(local),
        }
    }

    fn write_slave(&mut self, resource: Resource, local: u16, value: u8) {
        match resource {
            Resource::MainRam => self.main_ram.write(local, value),
            Resource::Scratch => self.scratch.write(local, value),
            Resource::Waveform => self.waveform.write(local, value),
            Resource::CsrBank => self.bank.bus_write(local, value),
            Resource::Ep0 => self.ep0.write(local, value),
            Resource::Ep1Out => self.ep1_out.write(local, value),
            Resource::Ep1In => self.ep1_in.write(local, value),
            Resource::Ep2468 => self.ep2468.write(local, value),
        }
    }

    /// Simulates one clock cycle without tracing.
    pub fn step(&mut self, inputs: &CycleInputs) -> CycleOutputs {
        self.step_traced(inputs, &mut NullTrace)
    }

    /// Simulates one clock cycle, reporting events to `sink`.
    ///
    /// The returned outputs answer the requests of the *previous* cycle:
    /// read data and ack are registered, so they line up with the address
    /// that was on the bus when the resource was asked to produce them.
    pub fn step_traced<S: TraceSink>(&mut self, inputs: &CycleInputs, sink: &mut S) -> CycleOutputs {
        let outputs = CycleOutputs {
            fetch: self.latch.fetch,
            data: self.latch.data,
        };

        let mut next = BusLatch::default();
        let mut write_back: Option<(Resource, u16, u8)> = None;

        match arbitrate(inputs) {
            None => {}
            Some(Grant::Fetch(request)) => {
                sink.on_event(TraceEvent::Granted {
                    master: MasterId::Fetch,
                    addr: request.addr,
                });
                // The fetch port is wired to main RAM alone; anything else
                // leaves the wide data lines undriven.
                let word = match self.map.resolve(request.addr) {
                    Some(hit) if hit.resource == self.main_ram_id => {
                        self.main_ram.wide_read(hit.local)
                    }
                    Some(_) => 0,
                    None => {
                        sink.on_event(TraceEvent::Unmapped {
                            addr: request.addr,
                            write: false,
                        });
                        0
                    }
                };
                next.fetch = Port {
                    data: word,
                    ack: true,
                    err: false,
                };
                sink.on_event(TraceEvent::Latched {
                    master: MasterId::Fetch,
                    data: word,
                });
            }
            Some(Grant::Data(request)) => {
                sink.on_event(TraceEvent::Granted {
                    master: MasterId::Data,
                    addr: request.addr,
                });
                match self.map.resolve(request.addr) {
                    Some(hit) => {
                        let resource = self.resource_at(hit.resource);
                        if request.write {
                            sink.on_event(TraceEvent::Write {
                                addr: request.addr,
                                value: request.data,
                            });
                            write_back =
                                resource.map(|resource| (resource, hit.local, request.data));
                            next.data = Port {
                                data: 0,
                                ack: true,
                                err: false,
                            };
                        } else {
                            let byte = resource
                                .map_or(0, |resource| self.read_slave(resource, hit.local));
                            next.data = Port {
                                data: byte,
                                ack: true,
                                err: false,
                            };
                            sink.on_event(TraceEvent::Latched {
                                master: MasterId::Data,
                                data: u32::from(byte),
                            });
                        }
                    }
                    None => {
                        sink.on_event(TraceEvent::Unmapped {
                            addr: request.addr,
                            write: request.write,
                        });
                        next.data = Port {
                            data: 0,
                            ack: true,
                            err: false,
                        };
                    }
                }
            }
        }

        // Tick boundary: every sequential effect commits here, computed from
        // the state that was visible during the cycle.
        if let Some((resource, local, value)) = write_back {
            self.write_slave(resource, local, value);
        }
        self.toggles.apply(&self.bank, sink);
        self.bank.tick();
        self.toggles.refresh_mirror(&mut self.bank);
        self.latch = next;

        outputs
    }

    /// Steps `cycles` idle cycles, letting registered responses drain.
    pub fn run(&mut self, cycles: u32) {
        for _ in 0..cycles {
            let _ = self.step(&CycleInputs::idle());
        }
    }

    /// Applies device-reset semantics: every register returns to its reset
    /// value, the toggle table clears, and the registered bus state idles.
    ///
    /// Memory contents survive a reset, as they do in the modeled part.
    pub fn reset(&mut self) {
        self.bank.reset();
        self.toggles.reset();
        self.latch = BusLatch::default();
    }
}
