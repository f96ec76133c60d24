use std::fmt::{self, Write};
use std::str::FromStr;

use crate::error::LoadError;

const DATA_SECTION: &str = ".DATA";
const CODE_SECTION: &str = ".CODE";
const START_KEY: &str = "START:";
const LENGTH_KEY: &str = "LENGTH:";

/// Assembled program: the entry offset and the encoded bytes of every instruction, in source
/// order. Written to and read from the textual artifact format:
///
/// ```text
/// .DATA
/// START: 0
/// LENGTH: 2
///
/// .CODE
/// 06
/// 0d
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Program {
    start: u8,
    instructions: Vec<Vec<u8>>,
}

impl Program {
    pub fn new(start: u8, instructions: Vec<Vec<u8>>) -> Self {
        Program {
            start,
            instructions,
        }
    }

    /// Byte offset of the first instruction to execute.
    pub fn start(&self) -> u8 {
        self.start
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Vec<u8>] {
        &self.instructions
    }

    /// Memory image, starting at address 0.
    pub fn bytes(&self) -> Vec<u8> {
        self.instructions.concat()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{DATA_SECTION}")?;
        writeln!(f, "{START_KEY} {}", self.start)?;
        writeln!(f, "{LENGTH_KEY} {}", self.instructions.len())?;
        writeln!(f)?;
        writeln!(f, "{CODE_SECTION}")?;
        for instr in &self.instructions {
            let mut line = String::with_capacity(instr.len() * 2);
            for byte in instr {
                write!(line, "{byte:02x}")?;
            }
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl FromStr for Program {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut start = None;
        let mut length = None;
        let mut code: Option<Vec<Vec<u8>>> = None;

        for (idx, raw) in s.lines().enumerate() {
            let line = idx + 1;
            let text = raw.trim();
            if text.is_empty() {
                continue;
            }
            if let Some(instructions) = code.as_mut() {
                instructions.push(decode_hex(text).ok_or(LoadError::BadHex { line })?);
            } else if text == CODE_SECTION {
                code = Some(Vec::new());
            } else if text == DATA_SECTION {
                continue;
            } else if let Some(value) = text.strip_prefix(START_KEY) {
                let value = value.trim().parse::<u8>();
                start = Some(value.map_err(|_| LoadError::BadHeader { line })?);
            } else if let Some(value) = text.strip_prefix(LENGTH_KEY) {
                let value = value.trim().parse::<usize>();
                length = Some(value.map_err(|_| LoadError::BadHeader { line })?);
            } else {
                return Err(LoadError::BadHeader { line });
            }
        }

        let start = start.ok_or(LoadError::MissingStart)?;
        let declared = length.ok_or(LoadError::MissingLength)?;
        let instructions = code.ok_or(LoadError::MissingCode)?;
        if instructions.len() != declared {
            return Err(LoadError::LengthMismatch {
                declared,
                found: instructions.len(),
            });
        }
        Ok(Program::new(start, instructions))
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Program {
        Program::new(
            5,
            vec![vec![0x06], vec![0x07, 0x03, 0xfb, 0x00, 0x01], vec![0x0d]],
        )
    }

    const SAMPLE_TEXT: &str = ".DATA\n\
                               START: 5\n\
                               LENGTH: 3\n\
                               \n\
                               .CODE\n\
                               06\n\
                               0703fb0001\n\
                               0d\n";

    #[test]
    fn write_artifact() {
        assert_eq!(sample().to_string(), SAMPLE_TEXT);
    }

    #[test]
    fn read_artifact() {
        assert_eq!(SAMPLE_TEXT.parse::<Program>(), Ok(sample()));
        assert_eq!(sample().bytes(), [0x06, 0x07, 0x03, 0xfb, 0x00, 0x01, 0x0d]);
    }

    #[test]
    fn read_loose_layout() {
        let text = "LENGTH: 1\r\n.DATA\n  START:   0 \n\n\n.CODE\n\n0D\n\n";
        assert_eq!(
            text.parse::<Program>(),
            Ok(Program::new(0, vec![vec![0x0d]]))
        );
    }

    #[test]
    fn read_errors() {
        let cases = [
            (".DATA\nLENGTH: 0\n.CODE\n", LoadError::MissingStart),
            (".DATA\nSTART: 0\n.CODE\n", LoadError::MissingLength),
            (".DATA\nSTART: 0\nLENGTH: 0\n", LoadError::MissingCode),
            (".DATA\nSTART: 300\n", LoadError::BadHeader { line: 2 }),
            ("START: 0\nORIGIN: 0\n", LoadError::BadHeader { line: 2 }),
            ("06\n", LoadError::BadHeader { line: 1 }),
            ("START: 0\nLENGTH: 1\n.CODE\n0d0\n", LoadError::BadHex { line: 4 }),
            ("START: 0\nLENGTH: 1\n.CODE\nzz\n", LoadError::BadHex { line: 4 }),
            (
                "START: 0\nLENGTH: 2\n.CODE\n0d\n",
                LoadError::LengthMismatch {
                    declared: 2,
                    found: 1,
                },
            ),
        ];
        for (text, err) in cases {
            assert_eq!(text.parse::<Program>(), Err(err), "{text:?}");
        }
    }
}
