use std::thread;

use tracing::{debug, trace};

use crate::{
    clock::Clock,
    error::{Fault, IsaError, Location},
    isa::{Descriptor, InstructionSet, Opcode, Operand, OperandKind, Operands},
    memory::{Memory, DEFAULT_CAPACITY},
    program::Program,
    state::{Flags, Register, Registers},
};

/// Registers per bank when not configured.
pub const DEFAULT_REGISTERS: usize = 8;

/// Size of a machine, fixed at construction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MachineConfig {
    /// Registers per bank, at most 256
    pub registers: usize,
    /// Memory capacity in bytes
    pub memory: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            registers: DEFAULT_REGISTERS,
            memory: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RunState {
    Running,
    Halted,
    /// Stopped on a fault. Machine state is left as it was when the fault was raised.
    Faulted(Fault),
}

/// Owned copy of everything observable about a [`Cpu`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Snapshot {
    pub pc: usize,
    pub state: RunState,
    pub registers: Registers,
    pub flags: Flags,
    pub memory: Memory,
}

/// What to do with the program counter once an instruction has executed.
enum Flow {
    /// Skip past the current instruction
    Next,
    Jump(usize),
    Halt,
}

type Handler<'isa> = fn(&mut Cpu<'isa>, &Descriptor, Operands) -> Result<Flow, Fault>;

/// Represents complete machine state during runtime.
pub struct Cpu<'isa> {
    isa: &'isa InstructionSet,
    mem: Memory,
    regs: Registers,
    flags: Flags,
    /// Program counter
    pc: usize,
    start: usize,
    state: RunState,
}

impl<'isa> Cpu<'isa> {
    /// A machine with zeroed memory and registers. It stays halted until a program is loaded.
    pub fn new(isa: &'isa InstructionSet, config: MachineConfig) -> Self {
        Cpu {
            isa,
            mem: Memory::new(config.memory),
            regs: Registers::new(config.registers),
            flags: Flags::new(),
            pc: 0,
            start: 0,
            state: RunState::Halted,
        }
    }

    /// Reset the machine and copy `program` to the start of memory, ready to run from its
    /// entry point. Nothing changes if the program does not fit.
    pub fn load(&mut self, program: &Program) -> Result<(), Fault> {
        let start = usize::from(program.start());
        let mut mem = Memory::new(self.mem.capacity());
        mem.load(&program.bytes())
            .map_err(|addr| Fault::OutOfBounds {
                pc: start,
                location: Location::Memory(addr),
            })?;
        self.mem = mem;
        self.regs = Registers::new(self.regs.count());
        self.flags = Flags::new();
        self.start = start;
        self.pc = start;
        self.state = RunState::Running;
        debug!(
            instructions = program.len(),
            start,
            memory = %self.mem,
            "loaded program"
        );
        Ok(())
    }

    // Indexed by `Family`
    const FAMILY_TABLE: [Handler<'isa>; 7] = [
        Self::noop,        // Noop
        Self::halt,        // Halt
        Self::mov,         // Move
        Self::arithmetic,  // Arithmetic
        Self::step_by_one, // Step
        Self::compare,     // Compare
        Self::branch,      // Branch
    ];

    /// Execute a single instruction. Does nothing once halted, and repeats the fault once
    /// faulted.
    pub fn step(&mut self) -> Result<(), Fault> {
        match &self.state {
            RunState::Running => {}
            RunState::Halted => return Ok(()),
            RunState::Faulted(fault) => return Err(fault.clone()),
        }
        if let Err(fault) = self.cycle() {
            debug!(pc = fault.pc(), %fault, "faulted");
            self.state = RunState::Faulted(fault.clone());
            return Err(fault);
        }
        Ok(())
    }

    /// Step until the machine halts or faults.
    pub fn run(&mut self) -> Result<(), Fault> {
        while self.is_running() {
            self.step()?;
        }
        self.step()
    }

    /// As [`Cpu::run`], waiting one clock tick after every instruction.
    pub fn run_paced(&mut self, clock: &Clock) -> Result<(), Fault> {
        let tick = clock.tick();
        while self.is_running() {
            self.step()?;
            thread::sleep(tick);
        }
        self.step()
    }

    /// Fetch, decode and execute the instruction at `pc`.
    fn cycle(&mut self) -> Result<(), Fault> {
        let pc = self.pc;
        let code = self.mem.get(pc).ok_or(Fault::OutOfBounds {
            pc,
            location: Location::Memory(pc),
        })?;
        let isa = self.isa;
        let desc = isa
            .decode_opcode(code)
            .map_err(|_| Fault::UnknownOpcode { pc, code })?;
        let bytes = self
            .mem
            .slice(pc + 1, desc.len() - 1)
            .ok_or(Fault::OutOfBounds {
                pc,
                location: Location::Memory(self.mem.capacity()),
            })?;
        let operands = desc.decode(bytes).map_err(|err| match err {
            IsaError::InvalidOperandTag(tag) => Fault::InvalidOperandTag { pc, tag },
            // Slice above always holds every operand byte
            _ => Fault::OutOfBounds {
                pc,
                location: Location::Memory(self.mem.capacity()),
            },
        })?;
        trace!(pc, mnemonic = desc.mnemonic, ?operands, "execute");

        match Self::FAMILY_TABLE[desc.family as usize](self, desc, operands)? {
            Flow::Next => self.pc += desc.len(),
            Flow::Jump(target) => self.pc = target,
            Flow::Halt => {
                debug!(pc, "halted");
                self.state = RunState::Halted;
            }
        }
        Ok(())
    }

    fn noop(&mut self, _: &Descriptor, _: Operands) -> Result<Flow, Fault> {
        Ok(Flow::Next)
    }

    fn halt(&mut self, _: &Descriptor, _: Operands) -> Result<Flow, Fault> {
        Ok(Flow::Halt)
    }

    fn mov(&mut self, desc: &Descriptor, operands: Operands) -> Result<Flow, Fault> {
        let (src, dest) = binary(operands);
        let value = self.read(src)?;
        let old = self.read(dest)?;
        let stored = self.write(desc, dest, value)?;
        // Memory destinations compare as bytes
        self.flags.set(Flags::EQUAL, old == stored);
        self.flags.set_result(stored);
        self.flags.clear_carry_overflow();
        Ok(Flow::Next)
    }

    fn arithmetic(&mut self, desc: &Descriptor, operands: Operands) -> Result<Flow, Fault> {
        let (src, dest) = binary(operands);
        let rhs = self.read(src)?;
        if desc.opcode == Opcode::Div && rhs == 0 {
            return Err(Fault::DivisionByZero { pc: self.pc });
        }
        if dest.kind != OperandKind::Data {
            return Err(self.unsupported(desc, dest.kind));
        }
        let lhs = self.read(dest)?;
        let result = match desc.opcode {
            Opcode::Add => lhs.wrapping_add(rhs),
            Opcode::Sub => lhs.wrapping_sub(rhs),
            Opcode::Mul => lhs.wrapping_mul(rhs),
            Opcode::Div => lhs.wrapping_div(rhs),
            _ => unreachable!("{} is not arithmetic", desc.mnemonic),
        };
        self.write(desc, dest, result)?;
        self.flags.set(Flags::EQUAL, lhs == rhs);
        self.flags.set_result(result);
        self.flags.clear_carry_overflow();
        Ok(Flow::Next)
    }

    /// `inc` and `dec`. Carry and overflow are left alone.
    fn step_by_one(&mut self, desc: &Descriptor, operands: Operands) -> Result<Flow, Fault> {
        let dest = unary(operands);
        let old = self.read(dest)?;
        let new = match desc.opcode {
            Opcode::Inc => old.wrapping_add(1),
            _ => old.wrapping_sub(1),
        };
        // Immediates only affect flags
        let stored = match dest.kind {
            OperandKind::Number => new,
            _ => self.write(desc, dest, new)?,
        };
        self.flags.set(Flags::EQUAL, old == stored);
        self.flags.set_result(stored);
        Ok(Flow::Next)
    }

    fn compare(&mut self, _: &Descriptor, operands: Operands) -> Result<Flow, Fault> {
        let (src, dest) = binary(operands);
        let rhs = self.read(src)?;
        let lhs = self.read(dest)?;
        self.flags.set(Flags::EQUAL, lhs == rhs);
        self.flags.set_result(lhs.wrapping_sub(rhs));
        self.flags.clear_carry_overflow();
        Ok(Flow::Next)
    }

    fn branch(&mut self, desc: &Descriptor, operands: Operands) -> Result<Flow, Fault> {
        let Operands::Target(target) = operands else {
            unreachable!("{} takes a target", desc.mnemonic)
        };
        let taken = match desc.opcode {
            Opcode::Jmp => true,
            Opcode::Jng => self.flags.contains(Flags::NEGATIVE),
            Opcode::Jnz => self.flags.contains(Flags::ZERO),
            Opcode::Jeq => self.flags.contains(Flags::EQUAL),
            Opcode::Jne => !self.flags.contains(Flags::EQUAL),
            _ => unreachable!("{} is not a branch", desc.mnemonic),
        };
        if taken {
            trace!(pc = self.pc, target, "branch taken");
            Ok(Flow::Jump(usize::from(target)))
        } else {
            Ok(Flow::Next)
        }
    }

    /// Register value, or sign-extended memory cell or immediate.
    fn read(&self, operand: Operand) -> Result<i32, Fault> {
        if let Some(reg) = Register::from_operand(operand) {
            return self
                .regs
                .get(reg)
                .ok_or(self.out_of_bounds(Location::Register(reg)));
        }
        match operand.kind {
            OperandKind::Memory => {
                let addr = usize::from(operand.value);
                self.mem
                    .get(addr)
                    .map(signed_byte)
                    .ok_or(self.out_of_bounds(Location::Memory(addr)))
            }
            _ => Ok(operand.immediate()),
        }
    }

    /// Store `value` and return it as read back. Memory cells keep the low byte, which
    /// reads back sign-extended.
    fn write(&mut self, desc: &Descriptor, operand: Operand, value: i32) -> Result<i32, Fault> {
        let pc = self.pc;
        let fault = move |location| Fault::OutOfBounds { pc, location };
        if let Some(reg) = Register::from_operand(operand) {
            let slot = self
                .regs
                .get_mut(reg)
                .ok_or(fault(Location::Register(reg)))?;
            *slot = value;
            return Ok(value);
        }
        match operand.kind {
            OperandKind::Memory => {
                let addr = usize::from(operand.value);
                let cell = self
                    .mem
                    .get_mut(addr)
                    .ok_or(fault(Location::Memory(addr)))?;
                *cell = value as u8;
                Ok(signed_byte(*cell))
            }
            kind => Err(self.unsupported(desc, kind)),
        }
    }

    fn out_of_bounds(&self, location: Location) -> Fault {
        Fault::OutOfBounds {
            pc: self.pc,
            location,
        }
    }

    fn unsupported(&self, desc: &Descriptor, kind: OperandKind) -> Fault {
        Fault::UnsupportedAddressingMode {
            pc: self.pc,
            mnemonic: desc.mnemonic,
            kind,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn isa(&self) -> &'isa InstructionSet {
        self.isa
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Entry point of the loaded program
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pc: self.pc,
            state: self.state.clone(),
            registers: self.regs.clone(),
            flags: self.flags,
            memory: self.mem.clone(),
        }
    }
}

// Layouts are fixed per family, so the shape always matches
fn binary(operands: Operands) -> (Operand, Operand) {
    match operands {
        Operands::Binary { src, dest } => (src, dest),
        other => unreachable!("expected two operands, found {other:?}"),
    }
}

/// Cells hold two's complement bytes, the same as immediates.
fn signed_byte(cell: u8) -> i32 {
    i32::from(cell as i8)
}

fn unary(operands: Operands) -> Operand {
    match operands {
        Operands::Unary { dest } => dest,
        other => unreachable!("expected one operand, found {other:?}"),
    }
}
