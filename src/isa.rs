//! Instruction set definitions.
//!
//! The [`InstructionSet`] is the only place that knows how an opcode is laid out in memory.
//! The assembler uses it to emit bytes and the [`Cpu`](crate::Cpu) uses it to decode them, so
//! the two can never disagree about instruction lengths or operand order.
//!
//! # Encoding
//!
//! Every field is a single byte, so the length of an instruction depends only on its opcode:
//!
//! | Layout    | Bytes after the opcode                       | Length |
//! |-----------|----------------------------------------------|--------|
//! | `Nullary` | none                                         | 1      |
//! | `Unary`   | dest tag, dest                               | 3      |
//! | `Binary`  | src tag, src, dest tag, dest                 | 5      |
//! | `Branch`  | target offset                                | 2      |

use std::fmt;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::error::IsaError;

/// Expands the instruction list into the [`Opcode`] enum and the descriptor table, keeping
/// both in one place.
macro_rules! instructions {
    ($( $(#[$doc:meta])* $name:ident = $code:literal, $mnemonic:literal, $layout:ident, $family:ident; )*) => {
        /// Numeric operation code, stored as the first byte of every instruction.
        #[repr(u8)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub enum Opcode {
            $( $(#[$doc])* $name = $code, )*
        }

        const DESCRIPTORS: &[Descriptor] = &[
            $(
                Descriptor {
                    opcode: Opcode::$name,
                    mnemonic: $mnemonic,
                    layout: Layout::$layout,
                    family: Family::$family,
                },
            )*
        ];
    };
}

instructions! {
    /// add.b src, dest ; dest = dest + src
    Add = 0x00, "add.b", Binary, Arithmetic;
    /// sub.b src, dest ; dest = dest - src
    Sub = 0x01, "sub.b", Binary, Arithmetic;
    /// mul.b src, dest ; dest = dest * src
    Mul = 0x02, "mul.b", Binary, Arithmetic;
    /// div.b src, dest ; dest = dest / src (faults on zero)
    Div = 0x03, "div.b", Binary, Arithmetic;
    /// inc dest ; dest = dest + 1
    Inc = 0x04, "inc", Unary, Step;
    /// dec dest ; dest = dest - 1
    Dec = 0x05, "dec", Unary, Step;
    Noop = 0x06, "noop", Nullary, Noop;
    /// move.b src, dest ; dest = src
    Move = 0x07, "move.b", Binary, Move;
    /// jmp label ; unconditional
    Jmp = 0x08, "jmp", Branch, Branch;
    /// jng label ; taken when negative
    Jng = 0x09, "jng", Branch, Branch;
    /// jnz label ; taken when zero
    Jnz = 0x0a, "jnz", Branch, Branch;
    /// jeq label ; taken when equal
    Jeq = 0x0b, "jeq", Branch, Branch;
    /// jne label ; taken when not equal
    Jne = 0x0c, "jne", Branch, Branch;
    Halt = 0x0d, "halt", Nullary, Halt;
    /// cmp.b src, dest ; flags from dest - src
    Cmp = 0x0e, "cmp.b", Binary, Compare;
}

/// Operand shape of an opcode. Fixes both the operand count and the encoded length.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Layout {
    Nullary,
    Unary,
    Binary,
    Branch,
}

impl Layout {
    pub const fn operand_count(self) -> usize {
        match self {
            Self::Nullary => 0,
            Self::Unary | Self::Branch => 1,
            Self::Binary => 2,
        }
    }

    /// Encoded length in bytes, opcode included.
    pub const fn len(self) -> usize {
        match self {
            Self::Nullary => 1,
            Self::Unary => 3,
            Self::Binary => 5,
            Self::Branch => 2,
        }
    }
}

/// Execution behaviour shared by a group of opcodes. Used as an index into the engine's
/// handler table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Family {
    Noop = 0,
    Halt,
    Move,
    Arithmetic,
    Step,
    Compare,
    Branch,
}

/// Type tag written in front of every typed operand.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum OperandKind {
    Data = 0,
    Address = 1,
    Memory = 2,
    Number = 3,
}

impl TryFrom<u8> for OperandKind {
    type Error = IsaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Data),
            1 => Ok(Self::Address),
            2 => Ok(Self::Memory),
            3 => Ok(Self::Number),
            _ => Err(IsaError::InvalidOperandTag(value)),
        }
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "data register",
            Self::Address => "address register",
            Self::Memory => "memory cell",
            Self::Number => "immediate",
        };
        f.write_str(name)
    }
}

/// Tagged operand. The payload is a register index, a memory address, or a two's complement
/// immediate depending on `kind`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Operand {
    pub kind: OperandKind,
    pub value: u8,
}

impl Operand {
    pub const fn data(index: u8) -> Self {
        Operand { kind: OperandKind::Data, value: index }
    }

    pub const fn address(index: u8) -> Self {
        Operand { kind: OperandKind::Address, value: index }
    }

    pub const fn memory(addr: u8) -> Self {
        Operand { kind: OperandKind::Memory, value: addr }
    }

    pub const fn number(value: i8) -> Self {
        Operand { kind: OperandKind::Number, value: value as u8 }
    }

    /// Payload read as a sign-extended immediate.
    pub const fn immediate(&self) -> i32 {
        self.value as i8 as i32
    }
}

/// Decoded operands of one instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operands {
    None,
    Unary { dest: Operand },
    Binary { src: Operand, dest: Operand },
    Target(u8),
}

/// Everything there is to know about one opcode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Descriptor {
    pub opcode: Opcode,
    pub mnemonic: &'static str,
    pub layout: Layout,
    pub family: Family,
}

impl Descriptor {
    pub const fn code(&self) -> u8 {
        self.opcode as u8
    }

    pub const fn len(&self) -> usize {
        self.layout.len()
    }

    pub const fn operand_count(&self) -> usize {
        self.layout.operand_count()
    }

    /// Encode a full instruction, opcode first.
    pub fn encode(&self, operands: &Operands) -> Result<Vec<u8>, IsaError> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.push(self.code());
        match (self.layout, operands) {
            (Layout::Nullary, Operands::None) => {}
            (Layout::Unary, Operands::Unary { dest }) => {
                bytes.extend([dest.kind as u8, dest.value]);
            }
            (Layout::Binary, Operands::Binary { src, dest }) => {
                bytes.extend([src.kind as u8, src.value, dest.kind as u8, dest.value]);
            }
            (Layout::Branch, Operands::Target(target)) => bytes.push(*target),
            _ => {
                return Err(IsaError::LayoutMismatch {
                    mnemonic: self.mnemonic,
                })
            }
        }
        debug_assert_eq!(bytes.len(), self.len());
        Ok(bytes)
    }

    /// Decode the operand bytes that follow the opcode. Extra trailing bytes are ignored.
    pub fn decode(&self, bytes: &[u8]) -> Result<Operands, IsaError> {
        let expected = self.len() - 1;
        if bytes.len() < expected {
            return Err(IsaError::Truncated {
                expected,
                found: bytes.len(),
            });
        }
        let operand = |tag: u8, value: u8| -> Result<Operand, IsaError> {
            Ok(Operand {
                kind: OperandKind::try_from(tag)?,
                value,
            })
        };
        let operands = match self.layout {
            Layout::Nullary => Operands::None,
            Layout::Unary => Operands::Unary {
                dest: operand(bytes[0], bytes[1])?,
            },
            Layout::Binary => Operands::Binary {
                src: operand(bytes[0], bytes[1])?,
                dest: operand(bytes[2], bytes[3])?,
            },
            Layout::Branch => Operands::Target(bytes[0]),
        };
        Ok(operands)
    }
}

/// Immutable opcode table, built once and shared by reference between the assembler and the
/// engine.
#[derive(Debug)]
pub struct InstructionSet {
    descriptors: Vec<Descriptor>,
    by_mnemonic: IndexMap<&'static str, usize, FxBuildHasher>,
    by_code: IndexMap<u8, usize, FxBuildHasher>,
}

impl InstructionSet {
    pub fn new() -> Self {
        let descriptors = DESCRIPTORS.to_vec();
        let mut by_mnemonic = IndexMap::with_hasher(FxBuildHasher::default());
        let mut by_code = IndexMap::with_hasher(FxBuildHasher::default());
        for (idx, desc) in descriptors.iter().enumerate() {
            by_mnemonic.insert(desc.mnemonic, idx);
            by_code.insert(desc.code(), idx);
        }
        InstructionSet {
            descriptors,
            by_mnemonic,
            by_code,
        }
    }

    /// Resolve a mnemonic (`move.b`) or a two hex digit opcode (`07`). Both forms return the
    /// same descriptor.
    pub fn lookup(&self, identifier: &str) -> Result<&Descriptor, IsaError> {
        let lower = identifier.to_ascii_lowercase();
        if let Some(&idx) = self.by_mnemonic.get(lower.as_str()) {
            return Ok(&self.descriptors[idx]);
        }
        if lower.len() == 2 && lower.chars().all(|c| c.is_ascii_hexdigit()) {
            if let Ok(code) = u8::from_str_radix(&lower, 16) {
                if let Ok(desc) = self.decode_opcode(code) {
                    return Ok(desc);
                }
            }
        }
        Err(IsaError::UnknownOpcode(identifier.to_string()))
    }

    pub fn decode_opcode(&self, code: u8) -> Result<&Descriptor, IsaError> {
        self.by_code
            .get(&code)
            .map(|&idx| &self.descriptors[idx])
            .ok_or_else(|| IsaError::UnknownOpcode(format!("{code:02x}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [OperandKind; 4] = [
        OperandKind::Data,
        OperandKind::Address,
        OperandKind::Memory,
        OperandKind::Number,
    ];

    #[test]
    fn lookup_by_name_and_code() {
        let isa = InstructionSet::new();
        for desc in isa.iter() {
            let by_name = isa.lookup(desc.mnemonic).unwrap();
            let by_code = isa.lookup(&format!("{:02x}", desc.code())).unwrap();
            assert!(std::ptr::eq(by_name, by_code), "{}", desc.mnemonic);
            assert_eq!(by_name.opcode, desc.opcode);
        }
        assert_eq!(isa.len(), 15);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let isa = InstructionSet::new();
        assert_eq!(isa.lookup("MOVE.B").unwrap().opcode, Opcode::Move);
        assert_eq!(isa.lookup("0A").unwrap().opcode, Opcode::Jnz);
        assert_eq!(isa.lookup("0a").unwrap().opcode, Opcode::Jnz);
    }

    #[test]
    fn lookup_unknown() {
        let isa = InstructionSet::new();
        for ident in ["mov", "0f", "ff", "", "7", "007", "halt.b"] {
            assert_eq!(
                isa.lookup(ident),
                Err(IsaError::UnknownOpcode(ident.to_string())),
                "{ident}"
            );
        }
        assert!(isa.decode_opcode(0x0f).is_err());
    }

    #[test]
    fn codes_are_contiguous() {
        let isa = InstructionSet::new();
        for (idx, desc) in isa.iter().enumerate() {
            assert_eq!(desc.code() as usize, idx);
        }
    }

    #[test]
    fn lengths_follow_layout() {
        let isa = InstructionSet::new();
        let len = |name| isa.lookup(name).unwrap().len();
        assert_eq!(len("noop"), 1);
        assert_eq!(len("halt"), 1);
        assert_eq!(len("inc"), 3);
        assert_eq!(len("dec"), 3);
        for name in ["add.b", "sub.b", "mul.b", "div.b", "move.b", "cmp.b"] {
            assert_eq!(len(name), 5);
        }
        for name in ["jmp", "jng", "jnz", "jeq", "jne"] {
            assert_eq!(len(name), 2);
        }
    }

    #[test]
    fn encode_move() {
        let isa = InstructionSet::new();
        let desc = isa.lookup("move.b").unwrap();
        let bytes = desc
            .encode(&Operands::Binary {
                src: Operand::number(5),
                dest: Operand::data(0),
            })
            .unwrap();
        assert_eq!(bytes, [0x07, 0x03, 0x05, 0x00, 0x00]);
    }

    /// Every operand combination a descriptor accepts decodes back to itself.
    #[test]
    fn decode_inverts_encode() {
        let isa = InstructionSet::new();
        let payloads = [0u8, 1, 0x7f, 0x80, 0xff];
        for desc in isa.iter() {
            let mut cases = Vec::new();
            match desc.layout {
                Layout::Nullary => cases.push(Operands::None),
                Layout::Branch => cases.extend(payloads.map(Operands::Target)),
                Layout::Unary => {
                    for kind in KINDS {
                        for value in payloads {
                            cases.push(Operands::Unary {
                                dest: Operand { kind, value },
                            });
                        }
                    }
                }
                Layout::Binary => {
                    for src_kind in KINDS {
                        for dest_kind in KINDS {
                            for value in payloads {
                                cases.push(Operands::Binary {
                                    src: Operand { kind: src_kind, value },
                                    dest: Operand { kind: dest_kind, value: !value },
                                });
                            }
                        }
                    }
                }
            }
            for operands in cases {
                let bytes = desc.encode(&operands).unwrap();
                assert_eq!(bytes.len(), desc.len());
                assert_eq!(bytes[0], desc.code());
                assert_eq!(desc.decode(&bytes[1..]), Ok(operands), "{}", desc.mnemonic);
            }
        }
    }

    #[test]
    fn encode_rejects_wrong_shape() {
        let isa = InstructionSet::new();
        let jmp = isa.lookup("jmp").unwrap();
        assert_eq!(
            jmp.encode(&Operands::None),
            Err(IsaError::LayoutMismatch { mnemonic: "jmp" })
        );
        let halt = isa.lookup("halt").unwrap();
        assert!(halt.encode(&Operands::Target(3)).is_err());
    }

    #[test]
    fn decode_errors() {
        let isa = InstructionSet::new();
        let add = isa.lookup("add.b").unwrap();
        assert_eq!(
            add.decode(&[0x03, 0x01]),
            Err(IsaError::Truncated { expected: 4, found: 2 })
        );
        assert_eq!(
            add.decode(&[0x09, 0x01, 0x00, 0x00]),
            Err(IsaError::InvalidOperandTag(0x09))
        );
    }

    #[test]
    fn immediates_are_signed() {
        assert_eq!(Operand::number(-3).immediate(), -3);
        assert_eq!(Operand::number(127).immediate(), 127);
        assert_eq!(Operand::number(-128).value, 0x80);
    }
}
