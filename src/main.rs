//! Duck Machine - CLI Entry Point
//!
//! Commands:
//! - `duck run <program>` - Run an assembly or object file
//! - `duck asm <source>` - Assemble to an object file
//! - `duck resolve <source>` - Print the resolved assembly listing
//! - `duck disasm <object>` - Disassemble an object file

use clap::{ArgAction, Parser, Subcommand};
use duck::asm::{assemble_at, disassemble, listing, load_object, resolve_source, save_object};
use duck::{Cpu, CpuState, MachineConfig};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duck")]
#[command(version)]
#[command(about = "Emulator and assembler for the Duck Machine")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts or faults
    Run {
        /// Path to the .asm source or object file to execute
        program: PathBuf,
        /// Machine configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Maximum number of cycles to run (0 for no limit)
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Log every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        dump_state: bool,
    },
    /// Assemble source to an object file
    Asm {
        /// Path to the source file
        source: PathBuf,
        /// Output object file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Address the program will be loaded at
        #[arg(long, default_value = "0")]
        origin: u32,
    },
    /// Print source with every label resolved
    Resolve {
        /// Path to the source file
        source: PathBuf,
        /// Address the program will be loaded at
        #[arg(long, default_value = "0")]
        origin: u32,
    },
    /// Disassemble an object file
    Disasm {
        /// Path to the object file
        object: PathBuf,
        /// Address the program will be loaded at
        #[arg(long, default_value = "0")]
        origin: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    let trace = matches!(cli.command, Commands::Run { trace: true, .. });
    init_tracing(cli.verbose, trace);

    match cli.command {
        Commands::Run { program, config, max_cycles, trace: _, dump_state } => {
            run_program(&program, config.as_deref(), max_cycles, dump_state);
        }
        Commands::Asm { source, output, origin } => {
            assemble_file(&source, output, origin);
        }
        Commands::Resolve { source, origin } => {
            resolve_file(&source, origin);
        }
        Commands::Disasm { object, origin } => {
            disassemble_file(&object, origin);
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` or else by the verbosity flags.
fn init_tracing(verbose: u8, trace: bool) {
    let level = if trace || verbose >= 2 {
        "duck=trace"
    } else if verbose == 1 {
        "duck=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_program(path: &Path, config_path: Option<&Path>, max_cycles: Option<u64>, dump_state: bool) {
    let mut config = match config_path {
        Some(config_path) => MachineConfig::load(config_path).unwrap_or_else(|e| fail(e)),
        None => MachineConfig::default(),
    };
    if let Some(limit) = max_cycles {
        config.max_cycles = (limit > 0).then_some(limit);
    }

    let words = load_program(path, config.load_base);
    if words.is_empty() {
        fail("no words to execute");
    }

    let mut cpu = Cpu::with_config(config);
    if let Err(e) = cpu.load_program(&words) {
        fail(format!("failed to load program: {}", e));
    }

    let result = cpu.run();
    print!("{}", cpu.take_output());

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cpu.cycles);
    match &cpu.state {
        CpuState::Faulted(fault) => println!("State: faulted ({})", fault),
        state => println!("State: {:?}", state),
    }
    println!("Flags: {}", cpu.regs.flags);
    for (reg, value) in cpu.regs.snapshot().iter().enumerate().skip(1) {
        if *value != 0 {
            println!("r{:<2} = {}", reg, value);
        }
    }

    if dump_state {
        match serde_json::to_string_pretty(&cpu) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(format!("failed to dump state: {}", e)),
        }
    }

    if let Err(e) = result {
        fail(e);
    }
}

/// Assemble `.asm` files, otherwise read an object file.
fn load_program(path: &Path, origin: u32) -> Vec<u32> {
    if path.extension().is_some_and(|ext| ext == "asm") {
        let source = read_source(path);
        match assemble_at(&source, origin) {
            Ok(program) => {
                println!("📝 Assembled {} words", program.words.len());
                program.words
            }
            Err(e) => fail(format!("assembly failed:\n{}", e)),
        }
    } else {
        match load_object(path) {
            Ok(words) => {
                println!("📂 Loaded {} words", words.len());
                words
            }
            Err(e) => fail(format!("failed to load object file: {}", e)),
        }
    }
}

fn assemble_file(source_path: &Path, output: Option<PathBuf>, origin: u32) {
    let out_path = output.unwrap_or_else(|| source_path.with_extension("obj"));

    println!("📝 Assembling: {} → {}", source_path.display(), out_path.display());

    let source = read_source(source_path);
    let program = assemble_at(&source, origin)
        .unwrap_or_else(|e| fail(format!("assembly failed:\n{}", e)));

    println!("✓ Assembled {} words", program.words.len());

    if let Err(e) = save_object(&out_path, &program.words) {
        fail(format!("failed to save object file: {}", e));
    }

    println!("✓ Saved to {}", out_path.display());
}

fn resolve_file(source_path: &Path, origin: u32) {
    let source = read_source(source_path);
    match resolve_source(&source, origin) {
        Ok((statements, _)) => print!("{}", listing(&statements)),
        Err(e) => fail(format!("resolution failed:\n{}", e)),
    }
}

fn disassemble_file(object_path: &Path, origin: u32) {
    let words = load_object(object_path)
        .unwrap_or_else(|e| fail(format!("failed to load object file: {}", e)));
    print!("{}", disassemble(&words, origin));
}

fn read_source(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("failed to read {}: {}", path.display(), e)))
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    process::exit(1);
}
