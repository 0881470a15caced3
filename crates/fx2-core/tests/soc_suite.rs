//! Bus-level integration coverage for the stock SoC: cycle timing, the
//! arbitration contract, register policies as seen from the bus, and the
//! data-toggle flows.

#![allow(clippy::pedantic, clippy::nursery, clippy::similar_names)]

use fx2_core::{
    CycleInputs, DataRequest, Direction, Fx2Soc, MasterId, SocConfig, TraceEvent, TraceSink,
    CPUCS_ADDR, EP0CS_ADDR, SETUPDAT_ADDR, TOGCTL_ADDR, USBIRQ_ADDR,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

fn soc_with_code(code: &[u8]) -> Fx2Soc {
    let config = SocConfig {
        code: code.to_vec(),
        code_read_only: false,
    };
    Fx2Soc::new(&config).expect("stock layout is valid")
}

fn soc() -> Fx2Soc {
    soc_with_code(&[])
}

/// Writes a byte and waits for the ack cycle.
fn poke(soc: &mut Fx2Soc, addr: u16, value: u8) {
    soc.step(&CycleInputs::data(DataRequest::write(addr, value)));
    let outputs = soc.step(&CycleInputs::idle());
    assert!(outputs.data.ack, "write to {addr:#06x} must ack");
}

/// Reads a byte, consuming the two cycles the registered path needs.
fn peek(soc: &mut Fx2Soc, addr: u16) -> u8 {
    soc.step(&CycleInputs::data(DataRequest::read(addr)));
    let outputs = soc.step(&CycleInputs::idle());
    assert!(outputs.data.ack, "read of {addr:#06x} must ack");
    outputs.data.data
}

#[test]
fn end_to_end_wide_fetch_and_register_write_back() {
    let mut soc = soc_with_code(&[0x01, 0x02, 0x03, 0x04]);

    // Instruction master fetches address 0; the word appears one cycle later.
    let same_cycle = soc.step(&CycleInputs::fetch(0x0000));
    assert!(!same_cycle.fetch.ack);
    let next_cycle = soc.step(&CycleInputs::idle());
    assert!(next_cycle.fetch.ack);
    assert_eq!(next_cycle.fetch.data, 0x0403_0201);

    // Data master writes the CPU control register and reads it back.
    poke(&mut soc, CPUCS_ADDR, 0b0001_1000);
    assert_eq!(peek(&mut soc, CPUCS_ADDR), 0b0001_1000);
}

#[test]
fn unaligned_wide_fetch_reads_across_byte_boundaries() {
    let mut soc = soc_with_code(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    soc.step(&CycleInputs::fetch(0x0001));
    let outputs = soc.step(&CycleInputs::idle());
    assert!(outputs.fetch.ack);
    assert_eq!(outputs.fetch.data, 0x0504_0302);
}

#[test]
fn fetch_outside_main_ram_drives_zero() {
    let mut soc = soc_with_code(&[0xff; 16]);
    soc.step(&CycleInputs::fetch(CPUCS_ADDR));
    let outputs = soc.step(&CycleInputs::idle());
    assert!(outputs.fetch.ack);
    assert_eq!(outputs.fetch.data, 0);
}

#[test]
fn contended_cycle_services_the_data_master_only() {
    let mut soc = soc_with_code(&[0x01, 0x02, 0x03, 0x04]);
    poke(&mut soc, CPUCS_ADDR, 0b0001_1000);

    let same_cycle = soc.step(&CycleInputs::contended(
        0x0000,
        DataRequest::read(CPUCS_ADDR),
    ));
    assert!(!same_cycle.fetch.ack);
    assert!(!same_cycle.data.ack);

    let next_cycle = soc.step(&CycleInputs::idle());
    assert!(next_cycle.data.ack, "forwarded request must ack");
    assert_eq!(next_cycle.data.data, 0b0001_1000);
    assert!(
        !next_cycle.fetch.ack,
        "losing master observes no response for its dropped request"
    );
}

#[test]
fn unmapped_accesses_ack_with_zero_and_drop_writes() {
    let mut soc = soc();
    // 0x8000 falls in the hole between main RAM and the upper regions.
    soc.step(&CycleInputs::data(DataRequest::write(0x8000, 0xff)));
    let outputs = soc.step(&CycleInputs::idle());
    assert!(outputs.data.ack);
    assert!(!outputs.data.err, "unmapped accesses ack instead of erroring");

    assert_eq!(peek(&mut soc, 0x8000), 0);
}

#[test]
fn read_only_code_storage_rejects_data_writes_silently() {
    let config = SocConfig {
        code: vec![0xaa, 0xbb],
        code_read_only: true,
    };
    let mut soc = Fx2Soc::new(&config).expect("stock layout is valid");

    poke(&mut soc, 0x0000, 0x55);
    assert_eq!(peek(&mut soc, 0x0000), 0xaa);

    // The fetch path still sees the hard-coded image.
    soc.step(&CycleInputs::fetch(0x0000));
    let outputs = soc.step(&CycleInputs::idle());
    assert_eq!(outputs.fetch.data & 0xffff, 0xbbaa);
}

#[test]
fn read_data_lines_up_with_the_cycle_its_address_was_presented() {
    let mut soc = soc();
    poke(&mut soc, 0xe010, 0x11);

    // Back-to-back read, write, read of one address: each data beat reflects
    // storage as of the cycle its own address was on the bus, so the first
    // read returns the pre-write value even though its data arrives while
    // the write is already in flight.
    soc.step(&CycleInputs::data(DataRequest::read(0xe010)));
    let first_beat = soc.step(&CycleInputs::data(DataRequest::write(0xe010, 0x22)));
    assert!(first_beat.data.ack);
    assert_eq!(first_beat.data.data, 0x11);

    let write_beat = soc.step(&CycleInputs::data(DataRequest::read(0xe010)));
    assert!(write_beat.data.ack);

    let second_beat = soc.step(&CycleInputs::idle());
    assert!(second_beat.data.ack);
    assert_eq!(second_beat.data.data, 0x22);
}

#[test]
fn setupdat_block_is_split_into_byte_registers() {
    let mut soc = soc();
    for offset in 0..8_u16 {
        poke(&mut soc, SETUPDAT_ADDR + offset, 0x10 + offset as u8);
    }
    for offset in 0..8_u16 {
        assert_eq!(peek(&mut soc, SETUPDAT_ADDR + offset), 0x10 + offset as u8);
    }
    assert_eq!(
        soc.csr_bank().get("setupdat3").expect("named").value(),
        0x13
    );
}

#[test]
fn usbirq_flags_set_by_hardware_clear_on_acknowledge() {
    let mut soc = soc();
    let usbirq = soc.regs().usbirq;

    soc.csr_bank_mut()
        .hw_write(usbirq, "sudav", 1)
        .expect("field exists");
    soc.run(1);
    assert_eq!(peek(&mut soc, USBIRQ_ADDR), 0b0000_0001);

    // Acknowledging an unrelated flag leaves the pending one alone.
    poke(&mut soc, USBIRQ_ADDR, 0b0000_0010);
    assert_eq!(peek(&mut soc, USBIRQ_ADDR), 0b0000_0001);

    // Writing 0 bits has no effect either.
    poke(&mut soc, USBIRQ_ADDR, 0b0000_0000);
    assert_eq!(peek(&mut soc, USBIRQ_ADDR), 0b0000_0001);

    // Writing the flag's own bit acknowledges it.
    poke(&mut soc, USBIRQ_ADDR, 0b0000_0001);
    assert_eq!(peek(&mut soc, USBIRQ_ADDR), 0);
}

#[test]
fn ep0cs_busy_is_untouchable_from_the_bus() {
    let mut soc = soc();
    let ep0cs = soc.regs().ep0cs;

    // hsnak resets to 1; busy to 0.
    assert_eq!(peek(&mut soc, EP0CS_ADDR), 0b1000_0000);

    for data in [0b0000_0010, 0b1111_1111, 0b0000_0000] {
        poke(&mut soc, EP0CS_ADDR, data);
        assert_eq!(
            peek(&mut soc, EP0CS_ADDR) & 0b0000_0010,
            0,
            "bus write {data:#010b} must not reach busy"
        );
    }

    soc.csr_bank_mut()
        .hw_write(ep0cs, "busy", 1)
        .expect("field exists");
    soc.run(1);
    assert_eq!(peek(&mut soc, EP0CS_ADDR) & 0b0000_0010, 0b0000_0010);
}

#[test]
fn togctl_pulse_reads_set_exactly_one_cycle_after_the_trigger() {
    let mut soc = soc();

    // Cycle 0: write `s` with endpoint 1 OUT selected.
    soc.step(&CycleInputs::data(DataRequest::write(
        TOGCTL_ADDR,
        0b0100_0001,
    )));
    // Cycle 1: the pulse is visible to a read presented now.
    soc.step(&CycleInputs::data(DataRequest::read(TOGCTL_ADDR)));
    // Cycle 2: pulse gone, mirror caught up; sample both data beats.
    let first = soc.step(&CycleInputs::data(DataRequest::read(TOGCTL_ADDR)));
    assert!(first.data.ack);
    assert_eq!(first.data.data, 0b0100_0001, "s high, mirror not yet");
    let second = soc.step(&CycleInputs::idle());
    assert!(second.data.ack);
    assert_eq!(second.data.data, 0b1000_0001, "s cleared, q mirrors the bit");
}

#[test]
fn toggle_set_and_reset_flows_drive_the_selected_bit() {
    let mut soc = soc();

    // Set endpoint 1 OUT.
    poke(&mut soc, TOGCTL_ADDR, 0b0100_0001);
    assert_eq!(soc.toggles().bit(1, Direction::Out), Some(true));
    assert_eq!(soc.toggles().bit(1, Direction::In), Some(false));

    // Set endpoint 1 IN independently.
    poke(&mut soc, TOGCTL_ADDR, 0b0101_0001);
    assert_eq!(soc.toggles().bit(1, Direction::In), Some(true));

    // Reset endpoint 1 OUT; IN keeps its state.
    poke(&mut soc, TOGCTL_ADDR, 0b0010_0001);
    assert_eq!(soc.toggles().bit(1, Direction::Out), Some(false));
    assert_eq!(soc.toggles().bit(1, Direction::In), Some(true));

    // Unsplit endpoints share one bit across both directions.
    poke(&mut soc, TOGCTL_ADDR, 0b0100_0110);
    assert_eq!(soc.toggles().bit(6, Direction::Out), Some(true));
    assert_eq!(soc.toggles().bit(6, Direction::In), Some(true));

    // A simultaneous set and reset resolves to set.
    poke(&mut soc, TOGCTL_ADDR, 0b0110_0000);
    assert_eq!(soc.toggles().bit(0, Direction::Out), Some(true));
}

#[test]
fn reset_restores_registers_but_preserves_memory() {
    let mut soc = soc();
    poke(&mut soc, CPUCS_ADDR, 0b0001_1000);
    poke(&mut soc, EP0CS_ADDR, 0b1000_0001);
    poke(&mut soc, TOGCTL_ADDR, 0b0100_0001);
    poke(&mut soc, 0xe010, 0x42);
    assert_eq!(soc.toggles().bit(1, Direction::Out), Some(true));

    // Leave a response in flight so reset has a latch to drop.
    soc.step(&CycleInputs::data(DataRequest::read(CPUCS_ADDR)));
    soc.reset();

    let outputs = soc.step(&CycleInputs::idle());
    assert!(!outputs.data.ack, "reset must drop the registered response");
    assert_eq!(peek(&mut soc, CPUCS_ADDR), 0);
    assert_eq!(peek(&mut soc, EP0CS_ADDR), 0b1000_0000, "hsnak resets to 1");
    assert_eq!(soc.toggles().bit(1, Direction::Out), Some(false));
    assert_eq!(peek(&mut soc, 0xe010), 0x42, "memory survives reset");
}

#[derive(Default)]
struct RecordingSink {
    events: Vec<TraceEvent>,
}

impl TraceSink for RecordingSink {
    fn on_event(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

#[test]
fn trace_events_follow_cycle_order() {
    let mut soc = soc_with_code(&[0x01, 0x02, 0x03, 0x04]);
    let mut sink = RecordingSink::default();

    soc.step_traced(
        &CycleInputs::data(DataRequest::write(TOGCTL_ADDR, 0b0100_0001)),
        &mut sink,
    );
    soc.step_traced(&CycleInputs::fetch(0x0000), &mut sink);

    assert_eq!(
        sink.events,
        vec![
            TraceEvent::Granted {
                master: MasterId::Data,
                addr: TOGCTL_ADDR,
            },
            TraceEvent::Write {
                addr: TOGCTL_ADDR,
                value: 0b0100_0001,
            },
            TraceEvent::Granted {
                master: MasterId::Fetch,
                addr: 0x0000,
            },
            TraceEvent::Latched {
                master: MasterId::Fetch,
                data: 0x0403_0201,
            },
            TraceEvent::ToggleFlip {
                index: 1,
                state: true,
            },
        ]
    );
}
