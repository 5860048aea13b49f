// src/content/prescan.rs
//! Byte-level pass run over a stream before lopdf's content parser sees it.
//!
//! lopdf reads arrays and dictionaries recursively and stops quietly at the
//! first byte it cannot parse. This pass bounds container nesting, cuts out
//! inline image payloads and comments, and turns the whitespace bytes lopdf
//! does not accept between operands into plain spaces.

use crate::utils::error::InterpretError;
use std::borrow::Cow;

/// Deepest `[`/`<<` nesting accepted in a content stream or CMap program.
pub const MAX_NESTING: usize = 64;

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

enum Step {
    End,
    Word(usize, usize),
    Other,
}

struct Scanner<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
    // Only allocated once something has to be cut.
    out: Option<Vec<u8>>,
    copied: usize,
    cutting: bool,
}

/// Checks nesting and returns the stream with inline images and comments
/// replaced by single spaces. Clean input is returned borrowed.
pub fn prepare(data: &[u8]) -> Result<Cow<'_, [u8]>, InterpretError> {
    let mut scanner = Scanner {
        data,
        pos: 0,
        depth: 0,
        out: None,
        copied: 0,
        cutting: true,
    };
    loop {
        match scanner.step()? {
            Step::End => break,
            Step::Word(start, end) if &data[start..end] == b"BI" => {
                scanner.skip_inline_image(start)?;
            }
            _ => {}
        }
    }
    Ok(scanner.finish())
}

impl<'a> Scanner<'a> {
    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn step(&mut self) -> Result<Step, InterpretError> {
        let Some(b) = self.peek_at(0) else {
            return Ok(Step::End);
        };
        let start = self.pos;
        match b {
            b'%' => {
                while let Some(c) = self.peek_at(0) {
                    if c == b'\r' || c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
                self.cut(start);
            }
            b'(' => self.skip_literal_string()?,
            b'<' if self.peek_at(1) == Some(b'<') => {
                self.pos += 2;
                self.open(start)?;
            }
            b'<' => self.skip_hex_string()?,
            b'>' if self.peek_at(1) == Some(b'>') => {
                self.pos += 2;
                self.depth = self.depth.saturating_sub(1);
            }
            b'[' => {
                self.pos += 1;
                self.open(start)?;
            }
            b']' => {
                self.pos += 1;
                self.depth = self.depth.saturating_sub(1);
            }
            b'/' => {
                self.pos += 1;
                while self.peek_at(0).is_some_and(is_regular) {
                    self.pos += 1;
                }
            }
            b'\x00' | b'\x0c' => {
                self.pos += 1;
                self.cut(start);
            }
            b if !is_regular(b) => self.pos += 1,
            _ => {
                while self.peek_at(0).is_some_and(is_regular) {
                    self.pos += 1;
                }
                return Ok(Step::Word(start, self.pos));
            }
        }
        Ok(Step::Other)
    }

    fn open(&mut self, offset: usize) -> Result<(), InterpretError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(InterpretError::NestingTooDeep {
                offset,
                limit: MAX_NESTING,
            });
        }
        Ok(())
    }

    fn skip_literal_string(&mut self) -> Result<(), InterpretError> {
        let start = self.pos;
        self.pos += 1;
        let mut depth = 1usize;
        while depth > 0 {
            let Some(c) = self.peek_at(0) else {
                return Err(InterpretError::UnexpectedEof {
                    context: "literal string",
                    offset: start,
                });
            };
            self.pos += 1;
            match c {
                b'(' => depth += 1,
                b')' => depth -= 1,
                b'\\' => self.pos += 1,
                _ => {}
            }
        }
        Ok(())
    }

    fn skip_hex_string(&mut self) -> Result<(), InterpretError> {
        let start = self.pos;
        match self.data[start..].iter().position(|&c| c == b'>') {
            Some(len) => {
                self.pos = start + len + 1;
                Ok(())
            }
            None => Err(InterpretError::UnexpectedEof {
                context: "hex string",
                offset: start,
            }),
        }
    }

    /// Cuts `BI <dict> ID <binary> EI`, starting at the `BI` keyword.
    fn skip_inline_image(&mut self, start: usize) -> Result<(), InterpretError> {
        // The whole image goes in one cut below.
        self.cutting = false;
        loop {
            match self.step()? {
                Step::Word(from, to) if &self.data[from..to] == b"ID" => break,
                Step::End => {
                    return Err(InterpretError::UnexpectedEof {
                        context: "inline image",
                        offset: start,
                    })
                }
                _ => {}
            }
        }

        // Single whitespace byte after ID, then raw data up to a delimited EI.
        self.pos += 1;
        while self.pos < self.data.len() {
            let at_ei = self.data[self.pos..].starts_with(b"EI")
                && is_whitespace(self.data[self.pos - 1])
                && self.peek_at(2).map_or(true, is_whitespace);
            if at_ei {
                self.pos += 2;
                break;
            }
            self.pos += 1;
        }
        self.pos = self.pos.min(self.data.len());
        self.cutting = true;
        self.cut(start);
        Ok(())
    }

    /// Replaces `data[start..pos]` with one space in the output.
    fn cut(&mut self, start: usize) {
        if !self.cutting {
            return;
        }
        let out = self.out.get_or_insert_with(|| Vec::with_capacity(self.data.len()));
        out.extend_from_slice(&self.data[self.copied..start]);
        out.push(b' ');
        self.copied = self.pos;
    }

    fn finish(self) -> Cow<'a, [u8]> {
        match self.out {
            None => Cow::Borrowed(self.data),
            Some(mut out) => {
                out.extend_from_slice(&self.data[self.copied..]);
                Cow::Owned(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_stream_is_borrowed() {
        let data = b"BT /F1 12 Tf [(A)-20(B)] TJ <</MCID 3>> BDC EMC ET";
        assert!(matches!(prepare(data).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_inline_image_is_cut() {
        let data = b"q BI /W 2 /H 1 /BPC 8 ID \x00(\xff EI Q (after) Tj";
        let prepared = prepare(data).unwrap();
        assert_eq!(prepared.as_ref(), b"q   Q (after) Tj");
    }

    #[test]
    fn test_name_spelled_bi_is_not_an_image() {
        let data = b"/BI 1 gs (x) Tj";
        assert_eq!(prepare(data).unwrap().as_ref(), data);
    }

    #[test]
    fn test_comments_and_odd_whitespace_become_spaces() {
        let data = b"1 0 % note\n0 1 0 0 cm\x00(a%b) Tj";
        assert_eq!(prepare(data).unwrap().as_ref(), b"1 0  \n0 1 0 0 cm (a%b) Tj");
    }

    #[test]
    fn test_deep_array_nesting_is_rejected() {
        let mut data = vec![b'['; 20_000];
        data.extend_from_slice(b" TJ");
        match prepare(&data).unwrap_err() {
            InterpretError::NestingTooDeep { offset, limit } => {
                assert_eq!(limit, MAX_NESTING);
                assert_eq!(offset, MAX_NESTING);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_deep_dictionary_nesting_is_rejected() {
        let data = b"<<".repeat(MAX_NESTING + 1);
        assert!(matches!(
            prepare(&data),
            Err(InterpretError::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_brackets_inside_strings_do_not_nest() {
        let mut data = b"(".to_vec();
        data.extend(vec![b'['; 500]);
        data.extend_from_slice(b") Tj <5B5B5B> Tj");
        assert!(prepare(&data).is_ok());
    }

    #[test]
    fn test_nesting_at_limit_is_accepted() {
        let mut data = vec![b'['; MAX_NESTING];
        data.extend(vec![b']'; MAX_NESTING]);
        data.extend_from_slice(b" TJ");
        assert!(prepare(&data).is_ok());
    }

    #[test]
    fn test_unterminated_string_reports_offset() {
        match prepare(b"BT (abc").unwrap_err() {
            InterpretError::UnexpectedEof { context, offset } => {
                assert_eq!(context, "literal string");
                assert_eq!(offset, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
