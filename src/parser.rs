use std::{iter::Peekable, vec::IntoIter};

use tracing::debug;

use crate::{
    air::{Air, AirArgs, AirStmt},
    error::AsmError,
    isa::{InstructionSet, Layout, Operand, Operands},
    lexer::{tokenize, Token, TokenKind, IMMEDIATE_PREFIX, MEMORY_PREFIX},
    state::Register,
    symbol::{SrcOffset, Span},
};

/// Transforms token stream into AIR
pub struct AsmParser<'a> {
    isa: &'a InstructionSet,
    /// Reference to the source file
    src: &'a str,
    /// Peekable iterator over tokens, without whitespace or comments
    toks: Peekable<IntoIter<Token>>,
    /// Assembly intermediate representation
    air: Air<'a>,
    /// Tracker for current line
    line: usize,
}

impl<'a> AsmParser<'a> {
    pub fn new(isa: &'a InstructionSet, src: &'a str) -> Self {
        let toks: Vec<Token> = tokenize(src)
            .filter(|tok| !matches!(tok.kind, TokenKind::Whitespace | TokenKind::Comment))
            .collect();
        AsmParser {
            isa,
            src,
            toks: toks.into_iter().peekable(),
            air: Air::new(),
            line: 1,
        }
    }

    fn get_span(&self, span: Span) -> &'a str {
        &self.src[span.range()]
    }

    /// First pass: classify every statement, assign offsets and collect labels. Branch
    /// targets are left for [`Air::emit`].
    pub fn parse(mut self) -> Result<Air<'a>, AsmError> {
        while self.toks.peek().is_some() {
            let line = self.next_line();
            if !line.is_empty() {
                self.parse_line(&line)?;
            }
            self.line += 1;
        }
        if self.air.entry().is_none() {
            return Err(AsmError::MissingEntryPoint);
        }
        debug!(
            statements = self.air.len(),
            labels = self.air.labels().len(),
            bytes = self.air.offset(),
            "parsed source"
        );
        // Consume self to return AIR
        Ok(self.air)
    }

    /// Tokens up to the next newline, which is consumed.
    fn next_line(&mut self) -> Vec<Token> {
        let mut line = Vec::new();
        for tok in self.toks.by_ref() {
            if tok.kind == TokenKind::Newline {
                break;
            }
            line.push(tok);
        }
        line
    }

    fn parse_line(&mut self, line: &[Token]) -> Result<(), AsmError> {
        let mut toks = line.iter().copied().peekable();

        // Label prefix, possibly alone on the line
        if let Some(label) = toks.next_if(|tok| tok.kind == TokenKind::Label) {
            self.define_label(label)?;
        }
        let Some(mnemonic) = toks.next() else {
            return Ok(());
        };
        if mnemonic.kind != TokenKind::Ident {
            return Err(self.unexpected(mnemonic));
        }
        let isa = self.isa;
        let desc = isa
            .lookup(self.get_span(mnemonic.span))
            .map_err(|_| AsmError::UnknownOpcode {
                line: self.line,
                mnemonic: self.get_span(mnemonic.span).to_string(),
                span: mnemonic.span.into(),
            })?;

        let operands = self.operand_list(&mut toks)?;
        let span = operands
            .last()
            .map_or(mnemonic.span, |last| mnemonic.span.to(last.span));
        if operands.len() != desc.operand_count() {
            return Err(AsmError::OperandCount {
                line: self.line,
                mnemonic: desc.mnemonic,
                expected: desc.operand_count(),
                found: operands.len(),
                span: span.into(),
            });
        }

        let args = match desc.layout {
            Layout::Nullary => AirArgs::Operands(Operands::None),
            Layout::Unary => AirArgs::Operands(Operands::Unary {
                dest: self.typed_operand(operands[0])?,
            }),
            Layout::Binary => AirArgs::Operands(Operands::Binary {
                src: self.typed_operand(operands[0])?,
                dest: self.typed_operand(operands[1])?,
            }),
            Layout::Branch => self.label_ref(operands[0])?,
        };
        self.air.add_stmt(AirStmt {
            line: self.line,
            span,
            desc,
            args,
        });
        Ok(())
    }

    fn define_label(&mut self, tok: Token) -> Result<(), AsmError> {
        // Drop the trailing `:`
        let span = Span::new(SrcOffset(tok.span.offs()), tok.span.len() - 1);
        let name = self.get_span(span);
        // Branches could never name it
        if name.parse::<Register>().is_ok() {
            return Err(AsmError::RegisterLabel {
                line: self.line,
                label: name.to_string(),
                span: span.into(),
            });
        }
        self.air
            .define_label(name, self.line, span)
            .map_err(|_| AsmError::DuplicateLabel {
                line: self.line,
                label: name.to_string(),
                span: span.into(),
            })
    }

    /// Comma separated operands until the end of the line.
    fn operand_list(
        &self,
        toks: &mut impl Iterator<Item = Token>,
    ) -> Result<Vec<Token>, AsmError> {
        let mut operands = Vec::new();
        let Some(mut tok) = toks.next() else {
            return Ok(operands);
        };
        loop {
            match tok.kind {
                TokenKind::Ident | TokenKind::Imm | TokenKind::Mem => operands.push(tok),
                _ => return Err(self.unexpected(tok)),
            }
            match toks.next() {
                None => break,
                Some(comma) if comma.kind == TokenKind::Comma => {
                    // Trailing comma
                    tok = toks.next().ok_or_else(|| self.unexpected(comma))?;
                }
                Some(other) => return Err(self.unexpected(other)),
            }
        }
        Ok(operands)
    }

    fn typed_operand(&self, tok: Token) -> Result<Operand, AsmError> {
        let text = self.get_span(tok.span);
        match tok.kind {
            TokenKind::Imm => text
                .strip_prefix(IMMEDIATE_PREFIX)
                .and_then(|digits| digits.parse::<i8>().ok())
                .map(Operand::number)
                .ok_or_else(|| self.invalid(tok, "immediates range from #$-128 to #$127")),
            // Prefix may be `0x` or `0X`
            TokenKind::Mem => u8::from_str_radix(&text[MEMORY_PREFIX.len()..], 16)
                .map(Operand::memory)
                .map_err(|_| self.invalid(tok, "memory cells range from 0x00 to 0xff")),
            TokenKind::Ident => text
                .parse::<Register>()
                .map(Register::to_operand)
                .map_err(|_| self.invalid(tok, "expected a register, memory cell or immediate")),
            _ => Err(self.unexpected(tok)),
        }
    }

    fn label_ref(&self, tok: Token) -> Result<AirArgs, AsmError> {
        let text = self.get_span(tok.span);
        if tok.kind != TokenKind::Ident || text.parse::<Register>().is_ok() {
            return Err(self.invalid(tok, "branches take a label"));
        }
        Ok(AirArgs::Label {
            name: text.to_string(),
            span: tok.span,
        })
    }

    fn invalid(&self, tok: Token, reason: &'static str) -> AsmError {
        AsmError::InvalidOperand {
            line: self.line,
            operand: self.get_span(tok.span).to_string(),
            reason,
            span: tok.span.into(),
        }
    }

    fn unexpected(&self, tok: Token) -> AsmError {
        AsmError::UnexpectedToken {
            line: self.line,
            found: self.get_span(tok.span).to_string(),
            span: tok.span.into(),
        }
    }
}
