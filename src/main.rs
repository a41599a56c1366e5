//! LS-8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu run <program>` - Run an .ls8 image or .asm source
//! - `ls8-emu debug <program>` - Interactive debugger
//! - `ls8-emu asm <source>` - Assemble to an .ls8 image
//! - `ls8-emu disasm <image>` - Disassemble an .ls8 image
//!
//! Exit status: 0 on HLT, 1 on a machine error, 2 when the program cannot
//! be read or parsed, 3 when a `--max-cycles` limit is reached.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::process::exit;
use tracing_subscriber::EnvFilter;

const EXIT_MACHINE_ERROR: i32 = 1;
const EXIT_BAD_PROGRAM: i32 = 2;
const EXIT_CYCLE_LIMIT: i32 = 3;

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version)]
#[command(about = "An emulator for the LS-8 8-bit virtual machine")]
struct Cli {
    /// Log engine events to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .ls8 image or .asm source to execute
        program: String,
        /// Stop after this many cycles (no limit by default)
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Print a TRACE line before every instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        dump_state: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the .ls8 image or .asm source to debug
        program: String,
    },
    /// Assemble source to an .ls8 image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an .ls8 image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { program, max_cycles, trace, dump_state } => {
            run_program(&program, max_cycles, trace, dump_state);
        }
        Commands::Debug { program } => {
            debug_program(&program);
        }
        Commands::Asm { source, output } => {
            assemble_file(&source, output);
        }
        Commands::Disasm { image } => {
            disassemble_file(&image);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load program bytes from an image, assembling `.asm` sources first.
fn load_program(path: &str) -> Vec<u8> {
    use ls8::{assemble, load_image};

    let program = if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{}: failed to read {}: {}", env!("CARGO_PKG_NAME"), path, e);
                exit(EXIT_BAD_PROGRAM);
            }
        };

        match assemble(&source) {
            Ok(bytes) => {
                tracing::info!(bytes = bytes.len(), "assembled {}", path);
                bytes
            }
            Err(e) => {
                eprintln!("{}: assembly error: {}", env!("CARGO_PKG_NAME"), e);
                exit(EXIT_BAD_PROGRAM);
            }
        }
    } else {
        match load_image(path) {
            Ok(image) => image.bytes,
            Err(e) => {
                eprintln!("{}: failed to load {}: {}", env!("CARGO_PKG_NAME"), path, e);
                exit(EXIT_BAD_PROGRAM);
            }
        }
    };

    if program.is_empty() {
        eprintln!("{}: {} contains no program bytes", env!("CARGO_PKG_NAME"), path);
        exit(EXIT_BAD_PROGRAM);
    }

    program
}

fn run_program(path: &str, max_cycles: Option<u64>, trace: bool, dump_state: bool) {
    use ls8::Cpu;

    let program = load_program(path);

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&program) {
        eprintln!("{}: failed to load program: {}", env!("CARGO_PKG_NAME"), e);
        exit(EXIT_BAD_PROGRAM);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    // PRN values are written after every step, keeping them in order with trace lines
    let mut cycles = 0u64;
    let within_limit = |cycles: u64| max_cycles.map_or(true, |max| cycles < max);
    while cpu.is_running() && within_limit(cycles) {
        if trace {
            let _ = writeln!(out, "{}", cpu.trace_line());
        }

        let pc = cpu.regs.pc;
        match cpu.step() {
            Ok(_) => {
                cycles += 1;
                for value in cpu.take_output() {
                    let _ = writeln!(out, "{}", value);
                }
            }
            Err(e) => {
                let _ = out.flush();
                tracing::warn!(pc, cycles, "execution aborted: {}", e);
                eprintln!("{}: error at PC={:02X}: {}", env!("CARGO_PKG_NAME"), pc, e);
                exit(EXIT_MACHINE_ERROR);
            }
        }
    }
    let _ = out.flush();
    drop(out);

    tracing::info!(cycles, state = ?cpu.state, "run finished");

    if dump_state {
        match serde_json::to_string_pretty(&cpu) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}: failed to serialize state: {}", env!("CARGO_PKG_NAME"), e),
        }
    }

    if let Some(max) = max_cycles.filter(|_| cpu.is_running()) {
        eprintln!("{}: reached max cycles limit ({})", env!("CARGO_PKG_NAME"), max);
        exit(EXIT_CYCLE_LIMIT);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use ls8::tui::run_debugger;

    let program = load_program(path);

    if let Err(e) = run_debugger(program) {
        eprintln!("{}: debugger error: {}", env!("CARGO_PKG_NAME"), e);
        exit(EXIT_MACHINE_ERROR);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str) {
    eprintln!("{}: built without the `tui` feature", env!("CARGO_PKG_NAME"));
    exit(EXIT_BAD_PROGRAM);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use ls8::{assemble, save_image, ProgramImage};

    let out_path = output.unwrap_or_else(|| {
        match source_path.strip_suffix(".asm") {
            Some(stem) => format!("{}.ls8", stem),
            None => format!("{}.ls8", source_path),
        }
    });

    // Read source
    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: failed to read {}: {}", env!("CARGO_PKG_NAME"), source_path, e);
            exit(EXIT_BAD_PROGRAM);
        }
    };

    // Assemble
    let bytes = match assemble(&source) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}: assembly error: {}", env!("CARGO_PKG_NAME"), e);
            exit(EXIT_BAD_PROGRAM);
        }
    };

    let size = bytes.len();
    if let Err(e) = save_image(&out_path, &ProgramImage::from_bytes(bytes)) {
        eprintln!("{}: failed to save image: {}", env!("CARGO_PKG_NAME"), e);
        exit(EXIT_BAD_PROGRAM);
    }

    println!("{} -> {} ({} bytes)", source_path, out_path, size);
}

fn disassemble_file(image_path: &str) {
    use ls8::{disassemble, load_image};

    let image = match load_image(image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("{}: failed to load {}: {}", env!("CARGO_PKG_NAME"), image_path, e);
            exit(EXIT_BAD_PROGRAM);
        }
    };

    print!("{}", disassemble(&image.bytes));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> Option<u64> {
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Run { max_cycles, .. } => max_cycles,
            _ => panic!("expected the run command"),
        }
    }

    #[test]
    fn test_run_has_no_cycle_limit_by_default() {
        assert_eq!(run_args(&["ls8-emu", "run", "demos/print8.ls8"]), None);
    }

    #[test]
    fn test_run_cycle_limit_flag() {
        assert_eq!(run_args(&["ls8-emu", "run", "--max-cycles", "50", "demos/print8.ls8"]), Some(50));
        assert_eq!(run_args(&["ls8-emu", "run", "-m", "7", "demos/print8.ls8"]), Some(7));
    }
}
