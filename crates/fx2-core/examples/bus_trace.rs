//! Drives the stock SoC through a short scenario and prints every trace
//! event: a wide instruction fetch, a register write-back, and a data-toggle
//! set pulse.

use fx2_core::{
    CycleInputs, DataRequest, Fx2Soc, SocConfig, TraceEvent, TraceSink, CPUCS_ADDR, TOGCTL_ADDR,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

struct StdoutSink {
    cycle: u32,
}

impl TraceSink for StdoutSink {
    fn on_event(&mut self, event: TraceEvent) {
        println!("cycle {:>3}: {event:?}", self.cycle);
    }
}

fn main() {
    let config = SocConfig {
        code: vec![0x01, 0x02, 0x03, 0x04],
        code_read_only: false,
    };
    let mut soc = Fx2Soc::new(&config).expect("stock layout is valid");
    let mut sink = StdoutSink { cycle: 0 };

    let script = [
        CycleInputs::fetch(0x0000),
        CycleInputs::data(DataRequest::write(CPUCS_ADDR, 0b0001_1000)),
        CycleInputs::data(DataRequest::read(CPUCS_ADDR)),
        CycleInputs::data(DataRequest::write(TOGCTL_ADDR, 0b0100_0001)),
        CycleInputs::idle(),
        CycleInputs::data(DataRequest::read(TOGCTL_ADDR)),
        CycleInputs::idle(),
        CycleInputs::idle(),
    ];

    for inputs in script {
        let outputs = soc.step_traced(&inputs, &mut sink);
        if outputs.fetch.ack {
            println!(
                "cycle {:>3}: fetch port  <- {:#010x}",
                sink.cycle, outputs.fetch.data
            );
        }
        if outputs.data.ack {
            println!(
                "cycle {:>3}: data port   <- {:#04x}",
                sink.cycle, outputs.data.data
            );
        }
        sink.cycle += 1;
    }
}
