// Instruction set
pub mod isa;
pub use isa::InstructionSet;

// Assembling
mod lexer;
mod parser;
pub use parser::AsmParser;
mod air;
pub use air::{Air, ENTRY_LABEL};
mod program;
pub use program::Program;
mod symbol;

// Running
mod memory;
pub use memory::{Memory, DEFAULT_CAPACITY, ROW_WIDTH};
mod state;
pub use state::{Bank, Flags, Register, Registers, MAX_REGISTERS};
mod runtime;
pub use runtime::{Cpu, MachineConfig, RunState, Snapshot, DEFAULT_REGISTERS};
mod clock;
pub use clock::{Clock, Magnitude};

mod error;
pub use error::{AsmError, Fault, IsaError, LoadError, Location};

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;

/// Run both assembler passes over `src` and return the finished program.
pub fn assemble(isa: &InstructionSet, src: &str) -> Result<Program, AsmError> {
    let air = AsmParser::new(isa, src).parse()?;
    air.emit()
}
