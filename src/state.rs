use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::isa::{Operand, OperandKind};

/// Register bank, selected by the `d`/`a` prefix in source.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Bank {
    Data,
    Address,
}

/// Name of a single register, e.g. `d0` or `a3`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Register {
    pub bank: Bank,
    pub index: u8,
}

impl Register {
    pub const fn data(index: u8) -> Self {
        Register { bank: Bank::Data, index }
    }

    pub const fn address(index: u8) -> Self {
        Register { bank: Bank::Address, index }
    }

    /// Register named by a register operand, `None` for memory cells and immediates.
    pub fn from_operand(operand: Operand) -> Option<Self> {
        match operand.kind {
            OperandKind::Data => Some(Register::data(operand.value)),
            OperandKind::Address => Some(Register::address(operand.value)),
            OperandKind::Memory | OperandKind::Number => None,
        }
    }

    pub const fn to_operand(self) -> Operand {
        match self.bank {
            Bank::Data => Operand::data(self.index),
            Bank::Address => Operand::address(self.index),
        }
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let bank = match chars.next() {
            Some('d' | 'D') => Bank::Data,
            Some('a' | 'A') => Bank::Address,
            _ => return Err(()),
        };
        let digits = chars.as_str();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(());
        }
        let index = digits.parse::<u8>().map_err(|_| ())?;
        Ok(Register { bank, index })
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.bank {
            Bank::Data => 'd',
            Bank::Address => 'a',
        };
        write!(f, "{}{}", prefix, self.index)
    }
}

/// Largest bank an operand byte can index.
pub const MAX_REGISTERS: usize = u8::MAX as usize + 1;

/// Data and address register banks. Both banks hold the same number of registers, at most
/// [`MAX_REGISTERS`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Registers {
    data: Vec<i32>,
    address: Vec<i32>,
}

impl Registers {
    /// Counts above [`MAX_REGISTERS`] are clamped.
    pub fn new(count: usize) -> Self {
        let count = count.min(MAX_REGISTERS);
        Registers {
            data: vec![0; count],
            address: vec![0; count],
        }
    }

    /// Registers per bank
    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, reg: Register) -> Option<i32> {
        self.bank(reg.bank).get(reg.index as usize).copied()
    }

    pub fn get_mut(&mut self, reg: Register) -> Option<&mut i32> {
        let bank = match reg.bank {
            Bank::Data => &mut self.data,
            Bank::Address => &mut self.address,
        };
        bank.get_mut(reg.index as usize)
    }

    pub fn data(&self) -> &[i32] {
        &self.data
    }

    pub fn address(&self) -> &[i32] {
        &self.address
    }

    /// Every register with its value, data bank first.
    pub fn iter(&self) -> impl Iterator<Item = (Register, i32)> + '_ {
        let data = self.data.iter().enumerate();
        let address = self.address.iter().enumerate();
        let data = data.map(|(i, &v)| (Register::data(i as u8), v));
        let address = address.map(|(i, &v)| (Register::address(i as u8), v));
        data.chain(address)
    }

    fn bank(&self, bank: Bank) -> &[i32] {
        match bank {
            Bank::Data => &self.data,
            Bank::Address => &self.address,
        }
    }
}

bitflags! {
    /// Condition codes.
    pub struct Flags: u8 {
        const NEGATIVE = 0b0000_0001;
        const ZERO     = 0b0000_0010;
        const CARRY    = 0b0000_0100;
        const OVERFLOW = 0b0000_1000;
        const EQUAL    = 0b0001_0000;
    }
}

impl Flags {
    pub fn new() -> Self {
        Flags::empty()
    }

    /// Set negative and zero from a result value.
    pub fn set_result(&mut self, value: i32) {
        self.set(Flags::NEGATIVE, value < 0);
        self.set(Flags::ZERO, value == 0);
    }

    // No instruction computes carry or overflow
    pub fn clear_carry_overflow(&mut self) {
        self.remove(Flags::CARRY | Flags::OVERFLOW);
    }

    /// Each flag by name, in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        [
            ("negative", self.contains(Flags::NEGATIVE)),
            ("zero", self.contains(Flags::ZERO)),
            ("carry", self.contains(Flags::CARRY)),
            ("overflow", self.contains(Flags::OVERFLOW)),
            ("equal", self.contains(Flags::EQUAL)),
        ]
        .into_iter()
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::new()
    }
}
