use crate::lexer::cursor::Cursor;
use crate::symbol::{Span, SrcOffset};

pub mod cursor;

/// Prefix of an immediate number, e.g. `#$5`.
pub const IMMEDIATE_PREFIX: &str = "#$";
/// Prefix of a memory cell address, e.g. `0x0a`.
pub const MEMORY_PREFIX: &str = "0x";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Mnemonic, register, or label reference
    Ident,
    /// Label definition, including the trailing `:`
    Label,
    /// `#$` followed by an optionally negative decimal
    Imm,
    /// `0x` followed by hex digits
    Mem,
    Comma,
    Comment,
    Whitespace,
    Newline,
    Unknown,
    Eof,
}

/// Iterate over every token in `input`, stopping before `Eof`.
pub fn tokenize(input: &str) -> impl Iterator<Item = Token> + '_ {
    let mut cursor = Cursor::new(input);
    std::iter::from_fn(move || {
        let token = cursor.advance_token();
        if token.kind != TokenKind::Eof {
            Some(token)
        } else {
            None
        }
    })
}

/// Whitespace inside a line. Newlines are significant and lexed separately.
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

pub(crate) fn is_id_start(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_')
}

/// Mnemonics contain a `.` (`move.b`), and so are allowed to here.
pub(crate) fn is_id(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '.')
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> Token {
        let start = self.token_start();
        let first_char = match self.bump() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, Span::new(SrcOffset(start), 0)),
        };
        let kind = match first_char {
            ';' => {
                self.take_while(|c| c != '\n');
                TokenKind::Comment
            }
            '\n' => TokenKind::Newline,
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                TokenKind::Whitespace
            }
            ',' => TokenKind::Comma,
            '#' if self.first() == '$' => {
                self.bump();
                if self.first() == '-' {
                    self.bump();
                }
                self.take_while(|c| c.is_ascii_digit());
                TokenKind::Imm
            }
            '0' if matches!(self.first(), 'x' | 'X') => {
                self.bump();
                self.take_while(|c| c.is_ascii_hexdigit());
                TokenKind::Mem
            }
            // Bare numbers are lexed as identifiers and rejected by the parser
            c if is_id_start(c) || c.is_ascii_digit() => {
                self.take_while(is_id);
                if self.first() == ':' {
                    self.bump();
                    TokenKind::Label
                } else {
                    TokenKind::Ident
                }
            }
            _ => TokenKind::Unknown,
        };
        let token = Token::new(kind, Span::new(SrcOffset(start), self.pos_in_token()));
        self.reset_pos();
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).map(|tok| tok.kind).collect()
    }

    fn text(src: &str) -> Vec<&str> {
        tokenize(src).map(|tok| &src[tok.span.range()]).collect()
    }

    #[test]
    fn lex_instruction() {
        let src = "start: move.b #$5, d0";
        assert_eq!(
            kinds(src),
            [Label, Whitespace, Ident, Whitespace, Imm, Comma, Whitespace, Ident]
        );
        assert_eq!(
            text(src),
            ["start:", " ", "move.b", " ", "#$5", ",", " ", "d0"]
        );
    }

    #[test]
    fn lex_literals() {
        assert_eq!(text("#$-12"), ["#$-12"]);
        assert_eq!(kinds("#$-12"), [Imm]);
        assert_eq!(kinds("0x0A"), [Mem]);
        assert_eq!(kinds("0X1f"), [Mem]);
        assert_eq!(kinds("0"), [Ident]);
        assert_eq!(kinds("12"), [Ident]);
        assert_eq!(kinds("#5"), [Unknown, Ident]);
    }

    #[test]
    fn lex_comments_and_lines() {
        let src = "; header\nnoop ; trailing, comment\n\nhalt";
        assert_eq!(
            kinds(src),
            [Comment, Newline, Ident, Whitespace, Comment, Newline, Newline, Ident]
        );
    }

    #[test]
    fn lex_label_only() {
        assert_eq!(kinds("loop_2:"), [Label]);
        assert_eq!(kinds("loop :"), [Ident, Whitespace, Unknown]);
    }

    #[test]
    fn spans_are_absolute() {
        let src = "noop\n  jmp end";
        let toks: Vec<_> = tokenize(src).collect();
        let jmp = toks.iter().find(|tok| &src[tok.span.range()] == "jmp").unwrap();
        assert_eq!(jmp.span.offs(), 7);
        let end = toks.last().unwrap();
        assert_eq!(end.span.range(), 11..14);
    }
}
