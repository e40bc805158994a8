//! Minimal CP/M harness for ZEXDOC/ZEXALL.
//!
//! CP/M memory layout:
//! - 0x0000: Warm boot; reaching it ends the run
//! - 0x0005: BDOS entry; calls are intercepted before they execute
//! - 0x0006-0x0007: Top of TPA (0x8000), read by the program to set SP
//! - 0x0100: Program load address (TPA start)
//!
//! `zexdoc.com` and `zexall.com` (Frank Cringle's instruction exerciser,
//! distributed with YAZE and most Z80 emulator test suites) are not
//! shipped; copy them into `tests/data/` before running with `--ignored`.
//! A missing binary fails the test.

use std::io::Write;

use emu_core::{AddressBus, Cpu, MemoryBus};
use emu_z80::{Z80, Z80Config};

const BDOS: u16 = 0x0005;
const TPA: u16 = 0x0100;

/// Run a CP/M test binary to warm boot. Returns the console output, or
/// `None` if the core stopped with an error.
fn run_cpm(binary: &[u8]) -> Option<String> {
    let mut bus = MemoryBus::with_ram(0x1_0000);
    bus.load(TPA, binary);
    bus.load(BDOS, &[0xC9]); // RET
    bus.write_word(0x0006, 0x8000);

    let mut cpu = Z80::with_config(bus, Z80Config { reset_pc: TPA });
    let mut output = String::new();
    let mut instructions: u64 = 0;

    loop {
        match cpu.regs.pc {
            0x0000 => {
                eprintln!("\nWarm boot after {instructions} instructions");
                return Some(output);
            }
            BDOS => {
                bdos_call(&mut cpu, &mut output);
                // Return to the caller as the RET at 0x0005 would.
                let sp = cpu.regs.sp;
                cpu.regs.pc = cpu.read_word(sp);
                cpu.regs.sp = sp.wrapping_add(2);
                continue;
            }
            _ => {}
        }

        if let Err(err) = cpu.step() {
            eprintln!("\n{err} after {instructions} instructions");
            return None;
        }
        instructions += 1;
        if instructions % 10_000_000 == 0 {
            eprint!("\r[{instructions} instructions]");
        }
    }
}

fn bdos_call(cpu: &mut Z80, output: &mut String) {
    let mut stderr = std::io::stderr();
    match cpu.regs.c {
        // Console output: character in E.
        2 => {
            let ch = char::from(cpu.regs.e);
            let _ = write!(stderr, "{ch}");
            output.push(ch);
        }
        // Print string at DE up to '$'.
        9 => {
            let mut addr = cpu.regs.de();
            loop {
                let byte = cpu.bus().peek_ram(addr);
                if byte == b'$' {
                    break;
                }
                let ch = char::from(byte);
                let _ = write!(stderr, "{ch}");
                output.push(ch);
                addr = addr.wrapping_add(1);
            }
        }
        func => eprintln!("\nUnknown BDOS function: {func}"),
    }
    let _ = stderr.flush();
}

fn read_binary(path: &str) -> Vec<u8> {
    std::fs::read(path).unwrap_or_else(|e| panic!("{path} not found: {e}"))
}

fn run_zex(path: &str) {
    let binary = read_binary(path);
    let _ = env_logger::builder().is_test(true).try_init();

    let output = run_cpm(&binary).unwrap_or_else(|| panic!("{path} stopped with an error"));
    let passed = output.matches("  OK").count();
    let failed = output.matches("ERROR").count();
    eprintln!("{path}: {passed} OK, {failed} ERROR");
    assert!(passed > 0, "no test groups reported");
    assert_eq!(failed, 0, "{path} reported errors");
}

#[test]
#[ignore = "requires tests/data/zexdoc.com - run with --ignored"]
fn zexdoc() {
    run_zex("tests/data/zexdoc.com");
}

#[test]
#[ignore = "requires tests/data/zexall.com - run with --ignored"]
fn zexall() {
    run_zex("tests/data/zexall.com");
}

/// Tiny CP/M program exercising the harness itself.
#[test]
fn bdos_console_output() {
    #[rustfmt::skip]
    let program = [
        0x2A, 0x06, 0x00,   // LD HL, (0x0006)
        0xF9,               // LD SP, HL
        0x0E, 0x09,         // LD C, 9
        0x11, 0x16, 0x01,   // LD DE, message
        0xCD, 0x05, 0x00,   // CALL 5
        0x0E, 0x02,         // LD C, 2
        0x1E, b'!',         // LD E, '!'
        0xCD, 0x05, 0x00,   // CALL 5
        0xC3, 0x00, 0x00,   // JP 0
    ];
    let mut binary = program.to_vec();
    binary.extend_from_slice(b"hello$");

    assert_eq!(run_cpm(&binary).as_deref(), Some("hello!"));
}

#[test]
#[should_panic(expected = "not found")]
fn missing_binary_fails_instead_of_passing() {
    run_zex("tests/data/no-such-exerciser.com");
}
