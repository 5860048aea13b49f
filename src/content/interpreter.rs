// src/content/interpreter.rs
//! Replays a page's content stream and collects the text it shows.
//!
//! lopdf splits the stream into operations; only the operand stack is
//! modelled on top of that. Every operator that could sit between two
//! text-showing operators is listed in [`classify`] with its operand count,
//! so that the stack stays aligned; anything unlisted is pushed as a plain
//! operand and never read again.

use crate::content::cmap::{CharMap, FontLookup, IdentityMap};
use crate::content::prescan;
use crate::utils::error::InterpretError;
use lopdf::content::Content;
use lopdf::Object;
use std::collections::HashMap;

/// What a recognized operator does to the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    /// Pops this many operands and ignores them.
    Discard(usize),
    /// `Tf`: font name and size.
    SetFont,
    /// `Tj`, `'` and `TJ`: one string or array operand.
    Show,
    /// `"`: word spacing, char spacing, string.
    ShowSpaced,
}

fn classify(keyword: &str) -> Option<Operator> {
    let op = match keyword {
        "B" | "B*" | "F" | "S" | "b" | "b*" | "f" | "f*" | "h" | "n" | "s" | "q" | "Q"
        | "W" | "W*" | "BT" | "ET" | "T*" | "EMC" => Operator::Discard(0),
        "G" | "J" | "M" | "g" | "gs" | "i" | "j" | "w" | "ri" | "cs" | "CS" | "Do" | "sh"
        | "TL" | "Tc" | "Tr" | "Ts" | "Tw" | "Tz" | "BMC" | "MP" => Operator::Discard(1),
        "d" | "d0" | "l" | "m" | "TD" | "Td" | "BDC" | "DP" => Operator::Discard(2),
        "RG" | "rg" => Operator::Discard(3),
        "re" | "v" | "y" | "K" | "k" => Operator::Discard(4),
        "c" | "cm" | "d1" | "Tm" => Operator::Discard(6),
        "Tf" => Operator::SetFont,
        "Tj" | "'" | "TJ" => Operator::Show,
        "\"" => Operator::ShowSpaced,
        _ => return None,
    };
    Some(op)
}

#[derive(Debug)]
enum Operand {
    Object(Object),
    /// An operator missing from the arity table, holding its stack slot.
    Keyword(String),
}

/// Text reconstruction state for one page.
pub struct Interpreter<'f> {
    fonts: &'f dyn FontLookup,
    char_maps: HashMap<String, Box<dyn CharMap + 'f>>,
    font: Option<String>,
    stack: Vec<Operand>,
    fragments: Vec<String>,
}

impl<'f> Interpreter<'f> {
    pub fn new(fonts: &'f dyn FontLookup) -> Self {
        Self {
            fonts,
            char_maps: HashMap::new(),
            font: None,
            stack: Vec::new(),
            fragments: Vec::new(),
        }
    }

    /// Feeds one decompressed content stream. State (font, stack, fragments)
    /// carries over between calls so a page split across streams reads as one.
    pub fn process(&mut self, data: &[u8]) -> Result<(), InterpretError> {
        let data = prescan::prepare(data)?;
        let content = Content::decode(&data)?;

        for (index, operation) in content.operations.into_iter().enumerate() {
            let keyword = operation.operator;
            self.stack
                .extend(operation.operands.into_iter().map(Operand::Object));

            let Some(op) = classify(&keyword) else {
                self.stack.push(Operand::Keyword(keyword));
                continue;
            };

            tracing::trace!("operator {} (operation {})", keyword, index);
            match op {
                Operator::Discard(count) => {
                    self.pop(&keyword, index, count)?;
                }
                Operator::SetFont => {
                    let operands = self.pop(&keyword, index, 2)?;
                    self.font = match operands.into_iter().next() {
                        Some(Operand::Object(Object::Name(name))) => {
                            Some(String::from_utf8_lossy(&name).into_owned())
                        }
                        _ => None,
                    };
                }
                Operator::Show => {
                    let mut operands = self.pop(&keyword, index, 1)?;
                    if let Some(operand) = operands.pop() {
                        self.show(operand);
                    }
                }
                Operator::ShowSpaced => {
                    let mut operands = self.pop(&keyword, index, 3)?;
                    if let Some(operand) = operands.pop() {
                        self.show(operand);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn into_fragments(self) -> Vec<String> {
        self.fragments
    }

    fn pop(
        &mut self,
        operator: &str,
        index: usize,
        count: usize,
    ) -> Result<Vec<Operand>, InterpretError> {
        if self.stack.len() < count {
            return Err(InterpretError::StackUnderflow {
                operator: operator.to_string(),
                index,
                needed: count,
                available: self.stack.len(),
            });
        }
        let at = self.stack.len() - count;
        Ok(self.stack.split_off(at))
    }

    fn show(&mut self, operand: Operand) {
        match operand {
            Operand::Object(Object::String(raw, _)) => self.write(&raw),
            Operand::Object(Object::Array(items)) => {
                // Kerning numbers between the pieces are ignored.
                for item in items {
                    if let Object::String(raw, _) = item {
                        self.write(&raw);
                    }
                }
            }
            other => tracing::debug!("ignoring non-string show operand {:?}", other),
        }
    }

    fn write(&mut self, raw: &[u8]) {
        let text = self.decode(raw);
        if text == " " {
            // A shown space joins the previous word to the next one.
            if let Some(last) = self.fragments.last_mut() {
                if !last.ends_with(' ') {
                    last.push(' ');
                }
            }
            return;
        }
        if !text.is_empty() {
            self.fragments.push(text);
        }
    }

    fn decode(&mut self, raw: &[u8]) -> String {
        let Some(font) = self.font.as_deref() else {
            return IdentityMap.decode(raw);
        };
        let fonts = self.fonts;
        let map = self
            .char_maps
            .entry(font.to_string())
            .or_insert_with_key(|name| {
                fonts.char_map(name).unwrap_or_else(|| {
                    tracing::debug!("font '{}' has no character map, using identity", name);
                    Box::new(IdentityMap)
                })
            });
        map.decode(raw)
    }
}

/// Interprets a single content stream with the given fonts.
pub fn interpret(data: &[u8], fonts: &dyn FontLookup) -> Result<Vec<String>, InterpretError> {
    let mut interpreter = Interpreter::new(fonts);
    interpreter.process(data)?;
    Ok(interpreter.into_fragments())
}
