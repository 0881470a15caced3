#![no_main]

use fx2_core::{CycleInputs, DataRequest, Fx2Soc, SocConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut soc) = Fx2Soc::new(&SocConfig::default()) else {
        return;
    };

    for chunk in data.chunks_exact(4) {
        let addr = u16::from_be_bytes([chunk[0], chunk[1]]);
        let inputs = match chunk[2] & 0x07 {
            0 => CycleInputs::idle(),
            1 => CycleInputs::fetch(addr),
            2 => CycleInputs::data(DataRequest::read(addr)),
            3 => CycleInputs::data(DataRequest::write(addr, chunk[3])),
            4 => CycleInputs::contended(addr, DataRequest::read(addr.wrapping_add(1))),
            _ => CycleInputs::contended(addr, DataRequest::write(addr, chunk[3])),
        };
        let _ = soc.step(&inputs);
    }
});
