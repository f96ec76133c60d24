use colored::Colorize;

use bytecpu::{Cpu, Flags, Memory, Registers, RunState, ROW_WIDTH};

/// Machine state printer for the command line.
#[derive(Clone, Copy, Debug)]
pub struct Output {
    /// Plain `name value` lines, suited for blackbox tests
    minimal: bool,
}

impl Output {
    pub fn new(minimal: bool) -> Self {
        if minimal {
            colored::control::set_override(false);
        }
        Output { minimal }
    }

    /// Registers, flags and memory, in that order.
    pub fn print_dump(&self, cpu: &Cpu) {
        self.print_registers(cpu.registers(), cpu.pc());
        self.print_flags(cpu.flags());
        self.print_memory(cpu.memory());
    }

    pub fn print_registers(&self, regs: &Registers, pc: usize) {
        if self.minimal {
            for (reg, value) in regs.iter() {
                println!("{reg} {value}");
            }
            println!("pc {pc}");
            return;
        }

        println!("{}", "┌──────────────────────────────┐".dimmed());
        println!(
            "{}{}{}",
            "│".dimmed(),
            "            hex          int ".italic(),
            " │".dimmed()
        );
        for (reg, value) in regs.iter() {
            println!(
                "{} {:<4} 0x{:08x}  {:>11} {}",
                "│".dimmed(),
                reg.to_string().bold(),
                value,
                value,
                "│".dimmed()
            );
        }
        println!(
            "{} {:<4} 0x{:08x}  {:>11} {}",
            "│".dimmed(),
            "pc".bold(),
            pc,
            pc,
            "│".dimmed()
        );
        println!("{}", "└──────────────────────────────┘".dimmed());
    }

    pub fn print_flags(&self, flags: Flags) {
        let line: Vec<String> = flags
            .iter()
            .map(|(name, set)| {
                let text = format!("{name}={}", u8::from(set));
                if self.minimal || !set {
                    text
                } else {
                    text.bold().to_string()
                }
            })
            .collect();
        println!("flags {}", line.join(" "));
    }

    /// Memory as rows of hex cells, each row prefixed with its address.
    pub fn print_memory(&self, mem: &Memory) {
        if !self.minimal {
            println!("{} {}", "memory".bold(), mem.to_string().dimmed());
        }
        for (row, cells) in mem.rows().enumerate() {
            let addr = row * ROW_WIDTH;
            let cells: Vec<String> = cells
                .iter()
                .map(|cell| {
                    let text = format!("{cell:02x}");
                    if self.minimal || *cell != 0 {
                        text
                    } else {
                        text.dimmed().to_string()
                    }
                })
                .collect();
            println!("{:04x}: {}", addr, cells.join(" "));
        }
    }

    /// One-line summary written after every step when tracing.
    pub fn print_step(&self, cpu: &Cpu) {
        let state = match cpu.state() {
            RunState::Running => "running".green(),
            RunState::Halted => "halted".cyan(),
            RunState::Faulted(_) => "faulted".red(),
        };
        let regs: Vec<String> = cpu
            .registers()
            .iter()
            .filter(|(_, value)| *value != 0)
            .map(|(reg, value)| format!("{reg}={value}"))
            .collect();
        eprintln!(
            "{:>12} pc={:<4} flags={:05b} {}",
            state,
            cpu.pc(),
            cpu.flags().bits(),
            regs.join(" ")
        );
    }
}
