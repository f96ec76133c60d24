use tracing::{debug, trace};

use crate::{
    error::AsmError,
    isa::{Descriptor, Operands},
    program::Program,
    symbol::{LabelDef, LabelTable, Span},
};

/// Label marking the first instruction to execute.
pub const ENTRY_LABEL: &str = "start";

/// Assembly intermediate representation: statements with their operands already classified,
/// plus every label defined in the source. Branch targets stay symbolic until [`Air::emit`].
#[derive(Debug)]
pub struct Air<'a> {
    stmts: Vec<AirStmt<'a>>,
    labels: LabelTable,
    /// Encoded length of all statements so far
    offset: usize,
}

impl<'a> Air<'a> {
    pub fn new() -> Self {
        Air {
            stmts: Vec::new(),
            labels: LabelTable::new(),
            offset: 0,
        }
    }

    /// Append a statement. Its length is known from the descriptor alone.
    pub fn add_stmt(&mut self, stmt: AirStmt<'a>) {
        self.offset += stmt.desc.len();
        self.stmts.push(stmt)
    }

    /// Define `name` at the offset of the next statement.
    pub fn define_label(&mut self, name: &str, line: usize, span: Span) -> Result<(), LabelDef> {
        let def = LabelDef {
            offset: self.offset,
            line,
            span,
        };
        self.labels.insert(name, def)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn entry(&self) -> Option<&LabelDef> {
        self.labels.get(ENTRY_LABEL)
    }

    pub fn get(&self, idx: usize) -> &AirStmt<'a> {
        &self.stmts[idx]
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Second pass: resolve branch labels and encode every statement.
    pub fn emit(&self) -> Result<Program, AsmError> {
        let entry = self.entry().ok_or(AsmError::MissingEntryPoint)?;
        let start = target(ENTRY_LABEL, entry.offset, entry.line, entry.span)?;

        for (name, def) in self.labels.iter() {
            trace!(label = name, offset = def.offset, line = def.line, "label");
        }

        let mut instructions = Vec::with_capacity(self.stmts.len());
        for stmt in &self.stmts {
            let operands = match &stmt.args {
                AirArgs::Operands(operands) => *operands,
                AirArgs::Label { name, span } => {
                    let def = self
                        .labels
                        .get(name)
                        .ok_or_else(|| AsmError::UndefinedLabel {
                            line: stmt.line,
                            label: name.clone(),
                            span: (*span).into(),
                        })?;
                    Operands::Target(target(name, def.offset, stmt.line, *span)?)
                }
            };
            let bytes = stmt
                .desc
                .encode(&operands)
                .map_err(|error| AsmError::Encode {
                    line: stmt.line,
                    error,
                })?;
            instructions.push(bytes);
        }

        debug!(
            instructions = instructions.len(),
            bytes = self.offset,
            start,
            "emitted program"
        );
        Ok(Program::new(start, instructions))
    }
}

impl Default for Air<'_> {
    fn default() -> Self {
        Self::new()
    }
}

// Offsets are stored in a single byte
fn target(label: &str, offset: usize, line: usize, span: Span) -> Result<u8, AsmError> {
    u8::try_from(offset).map_err(|_| AsmError::TargetOutOfRange {
        line,
        label: label.to_string(),
        offset,
        span: span.into(),
    })
}

/// Single statement, one per source line holding an instruction.
#[derive(PartialEq, Eq, Debug)]
pub struct AirStmt<'a> {
    /// 1-based source line
    pub line: usize,
    /// Mnemonic through last operand
    pub span: Span,
    pub desc: &'a Descriptor,
    pub args: AirArgs,
}

#[derive(PartialEq, Eq, Debug)]
pub enum AirArgs {
    Operands(Operands),
    /// Branch target, resolved during emission
    Label { name: String, span: Span },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assemble,
        error::IsaError,
        isa::Operand,
        symbol::SrcOffset,
        InstructionSet,
    };

    #[test]
    fn emit_bytes() {
        let isa = InstructionSet::new();
        let program = assemble(
            &isa,
            "start: move.b #$5, d0\n\
             inc d0\n\
             halt",
        )
        .unwrap();
        assert_eq!(program.start(), 0);
        assert_eq!(
            program.instructions(),
            &[
                vec![0x07, 0x03, 0x05, 0x00, 0x00],
                vec![0x04, 0x00, 0x00],
                vec![0x0d],
            ]
        );
    }

    #[test]
    fn forward_reference() {
        let isa = InstructionSet::new();
        let program = assemble(
            &isa,
            "start: jmp forward\n\
             noop\n\
             inc d1\n\
             forward: halt",
        )
        .unwrap();
        // jmp(2) + noop(1) + inc(3)
        assert_eq!(program.instructions()[0], [0x08, 6]);
        assert_eq!(program.bytes()[6], 0x0d);
    }

    #[test]
    fn backward_reference() {
        let isa = InstructionSet::new();
        let program = assemble(&isa, "noop\nstart: noop\njne start\nhalt").unwrap();
        assert_eq!(program.start(), 1);
        assert_eq!(program.instructions()[2], [0x0c, 1]);
    }

    #[test]
    fn entry_need_not_be_first() {
        let isa = InstructionSet::new();
        let program = assemble(&isa, "noop\nnoop\nstart:\n\nhalt").unwrap();
        assert_eq!(program.start(), 2);
    }

    #[test]
    fn undefined_label() {
        let isa = InstructionSet::new();
        let err = assemble(&isa, "start: noop\n\njeq nowhere\nhalt").unwrap_err();
        assert!(
            matches!(err, AsmError::UndefinedLabel { line: 3, ref label, .. } if label == "nowhere"),
            "{err:?}"
        );
    }

    #[test]
    fn target_out_of_range() {
        let isa = InstructionSet::new();
        // A jump plus 52 five byte instructions push `end` to offset 262
        let mut src = String::from("start: jmp end\n");
        for _ in 0..52 {
            src.push_str("add.b #$1, d0\n");
        }
        src.push_str("end: halt\n");
        let err = assemble(&isa, &src).unwrap_err();
        assert!(
            matches!(err, AsmError::TargetOutOfRange { line: 1, offset: 262, .. }),
            "{err:?}"
        );
    }

    #[test]
    fn hand_built_statement_must_fit_layout() {
        let isa = InstructionSet::new();
        let mut air = Air::new();
        air.define_label("start", 1, Span::new(SrcOffset(0), 5)).unwrap();
        air.add_stmt(AirStmt {
            line: 1,
            span: Span::new(SrcOffset(7), 4),
            desc: isa.lookup("halt").unwrap(),
            args: AirArgs::Operands(Operands::Unary {
                dest: Operand::data(0),
            }),
        });
        assert_eq!(
            air.emit().unwrap_err(),
            AsmError::Encode {
                line: 1,
                error: IsaError::LayoutMismatch { mnemonic: "halt" },
            }
        );
    }
}
