use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use clap::{builder::RangedU64ValueParser, Parser, Subcommand};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, NamedSource, Report, Result};
use tracing_subscriber::EnvFilter;

use bytecpu::{
    env, Clock, Cpu, Fault, InstructionSet, MachineConfig, Program, DEFAULT_CAPACITY,
    DEFAULT_REGISTERS, MAX_REGISTERS,
};

mod output;
use output::Output;

/// bytecpu assembles and runs programs for a tiny byte-addressable virtual CPU.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` or `.bin` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or compiled `.bin` file directly and output to terminal
    Run {
        /// `.asm` or `.bin` file to run
        name: PathBuf,
        #[command(flatten)]
        machine: MachineArgs,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Create `.bin` program file to run later or view compiled data
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        /// Destination to output .bin file
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
}

#[derive(clap::Args, Clone, Debug)]
struct MachineArgs {
    /// Registers in each of the data and address banks, from 1 to 256
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_REGISTERS,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_REGISTERS as u64),
    )]
    registers: usize,
    /// Memory size in bytes
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    memory: usize,
    /// Pace execution, e.g. `4hz` or `2mhz`
    #[arg(short, long)]
    clock: Option<Clock>,
}

impl Default for MachineArgs {
    fn default() -> Self {
        MachineArgs {
            registers: DEFAULT_REGISTERS,
            memory: DEFAULT_CAPACITY,
            clock: None,
        }
    }
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    env::init();

    let filter = EnvFilter::try_from_env("BYTECPU_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(bytecpu::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let isa = InstructionSet::new();

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                machine,
                minimal,
            } => run(&isa, &name, &machine, minimal),
            Command::Compile { name, dest } => {
                file_message(Green, "Assembling", &name);
                let program = assemble(&isa, &name)?;

                let out_file_name = dest.unwrap_or_else(|| name.with_extension("bin"));
                fs::write(&out_file_name, program.to_string()).into_diagnostic()?;

                message(Green, "Finished", "emit binary");
                file_message(Green, "Saved", &out_file_name);
                Ok(())
            }
            Command::Check { name } => {
                file_message(Green, "Checking", &name);
                let _ = assemble(&isa, &name)?;
                message(Green, "Success", "no errors found!");
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        run(&isa, &path, &MachineArgs::default(), false)
    } else {
        println!("\n~ bytecpu v{VERSION} ~");
        println!("{SHORT_INFO}");
        Ok(())
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(isa: &InstructionSet, name: &Path, machine: &MachineArgs, minimal: bool) -> Result<()> {
    // Set up colour handling before anything is printed
    let output = Output::new(minimal);

    let program = match name.extension().and_then(OsStr::to_str) {
        Some("asm") => {
            file_message(MsgColor::Green, "Assembling", name);
            assemble(isa, name)?
        }
        Some("bin") => {
            file_message(MsgColor::Green, "Loading", name);
            let contents = fs::read_to_string(name).into_diagnostic()?;
            contents.parse::<Program>()?
        }
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    };

    let config = MachineConfig {
        registers: machine.registers,
        memory: machine.memory,
    };
    let mut cpu = Cpu::new(isa, config);
    cpu.load(&program)?;

    match &machine.clock {
        Some(clock) => message(MsgColor::Green, "Running", &format!("at {clock}")),
        None => message(MsgColor::Green, "Running", "emitted binary"),
    }
    let result = if env::is_trace_enabled() {
        run_traced(&mut cpu, &output, machine.clock.as_ref())
    } else if let Some(clock) = &machine.clock {
        cpu.run_paced(clock)
    } else {
        cpu.run()
    };

    output.print_dump(&cpu);
    match result {
        Ok(()) => {
            file_message(MsgColor::Cyan, "Halted", name);
            Ok(())
        }
        Err(fault) => {
            file_message(MsgColor::Red, "Faulted", name);
            Err(fault.into())
        }
    }
}

/// Step manually so the state can be printed after every instruction.
fn run_traced(cpu: &mut Cpu, output: &Output, clock: Option<&Clock>) -> Result<(), Fault> {
    while cpu.is_running() {
        let result = cpu.step();
        output.print_step(cpu);
        result?;
        if let Some(clock) = clock {
            thread::sleep(clock.tick());
        }
    }
    Ok(())
}

/// Assemble a source file, attaching the source to any error for display
fn assemble(isa: &InstructionSet, name: &Path) -> Result<Program> {
    let contents = fs::read_to_string(name).into_diagnostic()?;
    match bytecpu::assemble(isa, &contents) {
        Ok(program) => Ok(program),
        Err(err) => {
            let src = NamedSource::new(name.display().to_string(), contents);
            Err(Report::new(err).with_source_code(src))
        }
    }
}

const SHORT_INFO: &str = r"
Welcome to bytecpu, an assembler and interpreter for a tiny byte-addressable CPU.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
