use std::fmt;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::isa::OperandKind;
use crate::state::Register;

// Instruction set errors

/// Failure to look up, encode or decode a single instruction.
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum IsaError {
    #[error("`{0}` is not a known mnemonic or opcode")]
    #[diagnostic(code(isa::unknown_opcode))]
    UnknownOpcode(String),
    #[error("operands do not match the layout of `{mnemonic}`")]
    #[diagnostic(code(isa::layout))]
    LayoutMismatch { mnemonic: &'static str },
    #[error("invalid operand tag {0:#04x}")]
    #[diagnostic(code(isa::operand_tag))]
    InvalidOperandTag(u8),
    #[error("expected {expected} operand bytes, found {found}")]
    #[diagnostic(code(isa::truncated))]
    Truncated { expected: usize, found: usize },
}

// Assembler errors

#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum AsmError {
    #[error("line {line}: `{mnemonic}` is not a recognised instruction")]
    #[diagnostic(
        code(asm::unknown_opcode),
        help("check the list of available instructions in the documentation")
    )]
    UnknownOpcode {
        line: usize,
        mnemonic: String,
        #[label("unknown instruction")]
        span: SourceSpan,
    },
    #[error("line {line}: `{label}` is not a defined label")]
    #[diagnostic(
        code(asm::undefined_label),
        help("did you forget to define it or misspell it?")
    )]
    UndefinedLabel {
        line: usize,
        label: String,
        #[label("undefined label")]
        span: SourceSpan,
    },
    #[error("program has no `start` label")]
    #[diagnostic(
        code(asm::missing_entry),
        help("mark the first instruction to run with `start:`")
    )]
    MissingEntryPoint,
    #[error("line {line}: label `{label}` is defined twice")]
    #[diagnostic(code(asm::duplicate_label), help("labels are only allowed once per file"))]
    DuplicateLabel {
        line: usize,
        label: String,
        #[label("duplicate label")]
        span: SourceSpan,
    },
    #[error("line {line}: `{label}` names a register and cannot be a label")]
    #[diagnostic(code(asm::register_label), help("pick a name other than `d<n>` or `a<n>`"))]
    RegisterLabel {
        line: usize,
        label: String,
        #[label("register name")]
        span: SourceSpan,
    },
    #[error("line {line}: `{mnemonic}` takes {expected} operand(s), found {found}")]
    #[diagnostic(code(asm::operand_count), help("check the operands for this instruction"))]
    OperandCount {
        line: usize,
        mnemonic: &'static str,
        expected: usize,
        found: usize,
        #[label("wrong number of operands")]
        span: SourceSpan,
    },
    #[error("line {line}: invalid operand `{operand}`, {reason}")]
    #[diagnostic(code(asm::operand))]
    InvalidOperand {
        line: usize,
        operand: String,
        reason: &'static str,
        #[label("invalid operand")]
        span: SourceSpan,
    },
    #[error("line {line}: `{label}` resolves to offset {offset}, which does not fit in a byte")]
    #[diagnostic(
        code(asm::target_range),
        help("programs may only place labels in the first 256 bytes")
    )]
    TargetOutOfRange {
        line: usize,
        label: String,
        offset: usize,
        #[label("label out of range")]
        span: SourceSpan,
    },
    #[error("line {line}: unexpected `{found}`")]
    #[diagnostic(
        code(asm::unexpected_token),
        help("statements look like `label: mnemonic src, dest`")
    )]
    UnexpectedToken {
        line: usize,
        found: String,
        #[label("unexpected token")]
        span: SourceSpan,
    },
    /// Operands that do not fit the descriptor. The parser always builds matching
    /// operands, so only a hand-built [`Air`](crate::Air) can raise this.
    #[error("line {line}: {error}")]
    #[diagnostic(code(asm::encode))]
    Encode {
        line: usize,
        #[source]
        error: IsaError,
    },
}

// Loader errors

/// Malformed program artifact.
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum LoadError {
    #[error("program has no `START:` declaration")]
    #[diagnostic(code(load::start))]
    MissingStart,
    #[error("program has no `LENGTH:` declaration")]
    #[diagnostic(code(load::length))]
    MissingLength,
    #[error("program has no `.CODE` section")]
    #[diagnostic(code(load::code))]
    MissingCode,
    #[error("line {line}: malformed header")]
    #[diagnostic(
        code(load::header),
        help("the header only allows `.DATA`, `START: <offset>` and `LENGTH: <count>`")
    )]
    BadHeader { line: usize },
    #[error("line {line}: expected pairs of hex digits")]
    #[diagnostic(code(load::hex))]
    BadHex { line: usize },
    #[error("header declares {declared} instruction(s), found {found}")]
    #[diagnostic(code(load::length_mismatch))]
    LengthMismatch { declared: usize, found: usize },
}

// Runtime faults

/// Fatal condition raised by the execution engine. Carries the program counter of the
/// instruction being executed.
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum Fault {
    #[error("unknown opcode {code:#04x} at pc {pc}")]
    #[diagnostic(code(cpu::unknown_opcode))]
    UnknownOpcode { pc: usize, code: u8 },
    #[error("{location} is out of bounds at pc {pc}")]
    #[diagnostic(code(cpu::out_of_bounds))]
    OutOfBounds { pc: usize, location: Location },
    #[error("division by zero at pc {pc}")]
    #[diagnostic(code(cpu::division_by_zero))]
    DivisionByZero { pc: usize },
    #[error("`{mnemonic}` cannot write to a {kind} at pc {pc}")]
    #[diagnostic(code(cpu::addressing_mode))]
    UnsupportedAddressingMode {
        pc: usize,
        mnemonic: &'static str,
        kind: OperandKind,
    },
    #[error("invalid operand tag {tag:#04x} at pc {pc}")]
    #[diagnostic(code(cpu::operand_tag))]
    InvalidOperandTag { pc: usize, tag: u8 },
}

impl Fault {
    pub fn pc(&self) -> usize {
        match self {
            Self::UnknownOpcode { pc, .. }
            | Self::OutOfBounds { pc, .. }
            | Self::DivisionByZero { pc }
            | Self::UnsupportedAddressingMode { pc, .. }
            | Self::InvalidOperandTag { pc, .. } => *pc,
        }
    }
}

/// Storage location named by an out-of-bounds fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    Memory(usize),
    Register(Register),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(addr) => write!(f, "memory address {addr:#04x}"),
            Self::Register(reg) => write!(f, "register {reg}"),
        }
    }
}
