//! `fx2-sim`: scripted bus exerciser for the FX2 SoC model.
//!
//! Loads an optional program image into main RAM, then drives a script of
//! bus transactions against the SoC, one operation per cycle, printing each
//! master's acknowledged data beats.
//!
//! Script syntax, one operation per line (`#` starts a comment):
//!
//! ```text
//! f 0000      # wide instruction fetch at 0x0000
//! r e600      # data-master read of 0xe600
//! w e600 18   # data-master write of 0x18 to 0xe600
//! i 4         # idle for 4 cycles (count optional, default 1)
//! ```

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use fx2_core::{CycleInputs, DataRequest, Fx2Soc, SocConfig, TraceEvent, TraceSink};

/// FX2 SoC bus exerciser.
#[derive(Parser, Debug)]
#[command(name = "fx2-sim")]
#[command(about = "Drive scripted bus transactions against the FX2 SoC model", long_about = None)]
struct Args {
    /// Script of bus operations, one per cycle
    script: PathBuf,

    /// Program image loaded into main RAM at address 0
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Treat main RAM as read-only instruction storage
    #[arg(long)]
    read_only: bool,

    /// Idle cycles appended so the last responses drain
    #[arg(long, default_value = "4")]
    drain: u32,

    /// Print trace events while stepping
    #[arg(short, long)]
    trace: bool,

    /// Dump every CSR after the script finishes
    #[arg(short = 'd', long)]
    dump_regs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Fetch(u16),
    Read(u16),
    Write(u16, u8),
    Idle(u32),
}

fn parse_hex16(token: &str) -> Result<u16, String> {
    u16::from_str_radix(token, 16).map_err(|err| format!("bad address {token:?}: {err}"))
}

fn parse_hex8(token: &str) -> Result<u8, String> {
    u8::from_str_radix(token, 16).map_err(|err| format!("bad byte {token:?}: {err}"))
}

fn parse_line(line: &str) -> Result<Option<Op>, String> {
    let body = line.split('#').next().unwrap_or("").trim();
    if body.is_empty() {
        return Ok(None);
    }
    let mut tokens = body.split_whitespace();
    let keyword = tokens.next().unwrap_or("");
    let op = match keyword {
        "f" => {
            let addr = tokens
                .next()
                .ok_or_else(|| "f needs an address".to_string())?;
            Op::Fetch(parse_hex16(addr)?)
        }
        "r" => {
            let addr = tokens
                .next()
                .ok_or_else(|| "r needs an address".to_string())?;
            Op::Read(parse_hex16(addr)?)
        }
        "w" => {
            let addr = tokens
                .next()
                .ok_or_else(|| "w needs an address".to_string())?;
            let value = tokens
                .next()
                .ok_or_else(|| "w needs a data byte".to_string())?;
            Op::Write(parse_hex16(addr)?, parse_hex8(value)?)
        }
        "i" => {
            let count = tokens.next().map_or(Ok(1), |token| {
                token
                    .parse::<u32>()
                    .map_err(|err| format!("bad idle count {token:?}: {err}"))
            })?;
            Op::Idle(count)
        }
        other => return Err(format!("unknown operation {other:?}")),
    };
    if let Some(extra) = tokens.next() {
        return Err(format!("trailing token {extra:?}"));
    }
    Ok(Some(op))
}

fn parse_script(text: &str) -> Result<Vec<Op>, String> {
    let mut ops = Vec::new();
    for (number, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(op)) => ops.push(op),
            Ok(None) => {}
            Err(err) => return Err(format!("line {}: {err}", number + 1)),
        }
    }
    Ok(ops)
}

struct PrintSink {
    cycle: u32,
    enabled: bool,
}

impl TraceSink for PrintSink {
    fn on_event(&mut self, event: TraceEvent) {
        if self.enabled {
            println!("cycle {:>4}: {event:?}", self.cycle);
        }
    }
}

fn run(soc: &mut Fx2Soc, ops: &[Op], drain: u32, trace: bool) {
    let mut plan = Vec::new();
    for op in ops {
        match *op {
            Op::Fetch(addr) => plan.push(CycleInputs::fetch(addr)),
            Op::Read(addr) => plan.push(CycleInputs::data(DataRequest::read(addr))),
            Op::Write(addr, value) => {
                plan.push(CycleInputs::data(DataRequest::write(addr, value)));
            }
            Op::Idle(count) => plan.extend((0..count).map(|_| CycleInputs::idle())),
        }
    }
    plan.extend((0..drain).map(|_| CycleInputs::idle()));

    let mut sink = PrintSink {
        cycle: 0,
        enabled: trace,
    };
    for (cycle, inputs) in plan.iter().enumerate() {
        sink.cycle = u32::try_from(cycle).unwrap_or(u32::MAX);
        let outputs = soc.step_traced(inputs, &mut sink);
        if outputs.fetch.ack {
            println!("cycle {cycle:>4}: fetch <- {:#010x}", outputs.fetch.data);
        }
        if outputs.data.ack {
            println!("cycle {cycle:>4}: data  <- {:#04x}", outputs.data.data);
        }
    }
}

fn dump_regs(soc: &Fx2Soc) {
    println!("\nCSR state:");
    for (address, register) in soc.csr_bank().registers() {
        println!(
            "  {address:#06x} {:<10} = {:#04x}",
            register.name(),
            register.value()
        );
    }
}

fn main() {
    let args = Args::parse();

    let code = args.image.as_deref().map_or_else(Vec::new, |path| {
        fs::read(path).unwrap_or_else(|err| {
            eprintln!("failed to read image {}: {err}", path.display());
            process::exit(1);
        })
    });

    let config = SocConfig {
        code,
        code_read_only: args.read_only,
    };
    let mut soc = match Fx2Soc::new(&config) {
        Ok(soc) => soc,
        Err(err) => {
            eprintln!("failed to build the SoC: {err}");
            process::exit(1);
        }
    };

    let text = match fs::read_to_string(&args.script) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("failed to read script {}: {err}", args.script.display());
            process::exit(1);
        }
    };
    let ops = match parse_script(&text) {
        Ok(ops) => ops,
        Err(err) => {
            eprintln!("script error: {err}");
            process::exit(1);
        }
    };

    run(&mut soc, &ops, args.drain, args.trace);
    if args.dump_regs {
        dump_regs(&soc);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_line, parse_script, Op};

    #[test]
    fn lines_parse_into_operations() {
        assert_eq!(parse_line("f 0000").unwrap(), Some(Op::Fetch(0x0000)));
        assert_eq!(parse_line("r e600").unwrap(), Some(Op::Read(0xe600)));
        assert_eq!(
            parse_line("w e600 18").unwrap(),
            Some(Op::Write(0xe600, 0x18))
        );
        assert_eq!(parse_line("i 3").unwrap(), Some(Op::Idle(3)));
        assert_eq!(parse_line("i").unwrap(), Some(Op::Idle(1)));
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("  # comment only").unwrap(), None);
        assert_eq!(
            parse_line("w e600 18  # set clkspd").unwrap(),
            Some(Op::Write(0xe600, 0x18))
        );
    }

    #[test]
    fn malformed_lines_are_rejected_with_context() {
        assert!(parse_line("w e600").is_err());
        assert!(parse_line("x 1234").is_err());
        assert!(parse_line("r e600 extra").is_err());
        assert!(parse_line("r zzzz").is_err());
    }

    #[test]
    fn script_errors_carry_line_numbers() {
        let err = parse_script("f 0000\nw e600\n").unwrap_err();
        assert!(err.starts_with("line 2:"), "got {err:?}");
    }
}
