// src/content/cmap.rs
//! Font character maps: raw show-string bytes to Unicode text.

use crate::content::prescan;
use crate::utils::error::InterpretError;
use lopdf::content::Content;
use lopdf::{Document, Encoding, Object};
use std::collections::HashMap;

/// Decodes the bytes of a text-showing operand for one font.
pub trait CharMap {
    fn decode(&self, raw: &[u8]) -> String;
}

/// Resolves a font resource name (e.g. `F1`) to its character map.
/// `None` means the font has no usable map and the identity mapper applies.
pub trait FontLookup {
    fn char_map(&self, font: &str) -> Option<Box<dyn CharMap + '_>>;
}

/// Fallback mapper: every byte is the code point of the same value.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMap;

impl CharMap for IdentityMap {
    fn decode(&self, raw: &[u8]) -> String {
        raw.iter().map(|&b| char::from(b)).collect()
    }
}

/// A font table with no maps at all; everything decodes through [`IdentityMap`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFonts;

impl FontLookup for IdentityFonts {
    fn char_map(&self, _font: &str) -> Option<Box<dyn CharMap + '_>> {
        None
    }
}

/// An encoding resolved by lopdf from the font dictionary. Bytes lopdf
/// refuses to decode come out as Latin-1.
#[derive(Debug)]
pub struct EncodingMap<'a>(Encoding<'a>);

impl<'a> EncodingMap<'a> {
    pub fn new(encoding: Encoding<'a>) -> Self {
        Self(encoding)
    }
}

impl CharMap for EncodingMap<'_> {
    fn decode(&self, raw: &[u8]) -> String {
        match Document::decode_text(&self.0, raw) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("{:?} cannot decode {} bytes ({}), using Latin-1", self.0, raw.len(), e);
                IdentityMap.decode(raw)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CodeSpaceRange {
    low: u32,
    high: u32,
    len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RangeTarget {
    /// The last UTF-16 unit counts up with the code.
    Incrementing(Vec<u16>),
    /// One destination per code, in order.
    Listed(Vec<String>),
}

/// One `bfrange` line, kept as written and resolved per lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BfRange {
    low: u32,
    high: u32,
    target: RangeTarget,
}

impl BfRange {
    fn text(&self, code: u32) -> Option<String> {
        let offset = code - self.low;
        match &self.target {
            RangeTarget::Incrementing(units) => {
                let mut units = units.clone();
                if let Some(last) = units.last_mut() {
                    *last = last.wrapping_add(offset as u16);
                }
                Some(String::from_utf16_lossy(&units))
            }
            RangeTarget::Listed(items) => items.get(offset as usize).cloned(),
        }
    }
}

/// A parsed `/ToUnicode` CMap, for the programs lopdf's own CMap reader
/// turns down (codespaces other than `<0000> <FFFF>`, loose layout).
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeMap {
    codespaces: Vec<CodeSpaceRange>,
    chars: HashMap<u32, String>,
    ranges: Vec<BfRange>,
}

fn source_code(object: &Object) -> Option<(u32, usize)> {
    match object {
        Object::String(bytes, _) if (1..=4).contains(&bytes.len()) => Some((
            bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)),
            bytes.len(),
        )),
        _ => None,
    }
}

fn destination(object: &Object) -> Option<Vec<u16>> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    if bytes.len() == 1 {
        return Some(vec![u16::from(bytes[0])]);
    }
    Some(
        bytes
            .chunks(2)
            .map(|pair| match pair {
                [hi, lo] => u16::from_be_bytes([*hi, *lo]),
                [single] => u16::from(*single),
                _ => 0,
            })
            .collect(),
    )
}

impl ToUnicodeMap {
    /// Parses the codespace, `bfchar` and `bfrange` sections of a CMap program.
    pub fn parse(data: &[u8]) -> Result<Self, InterpretError> {
        let data = prescan::prepare(data)?;
        let program = Content::decode(&data)?;
        let mut cmap = ToUnicodeMap::default();

        // Each section's entries arrive as the operands of its `end...` keyword.
        for operation in &program.operations {
            let entries = &operation.operands;
            match operation.operator.as_str() {
                "endcodespacerange" => {
                    for pair in entries.chunks(2) {
                        if let [low, high] = pair {
                            if let (Some((low, len)), Some((high, high_len))) =
                                (source_code(low), source_code(high))
                            {
                                if len == high_len {
                                    cmap.codespaces.push(CodeSpaceRange { low, high, len });
                                }
                            }
                        }
                    }
                }
                "endbfchar" => {
                    for pair in entries.chunks(2) {
                        if let [src, dst] = pair {
                            if let (Some((code, _)), Some(units)) = (source_code(src), destination(dst)) {
                                cmap.chars.insert(code, String::from_utf16_lossy(&units));
                            }
                        }
                    }
                }
                "endbfrange" => {
                    for triple in entries.chunks(3) {
                        if let [low, high, dst] = triple {
                            cmap.insert_range(low, high, dst);
                        }
                    }
                }
                _ => {}
            }
        }

        if cmap.codespaces.is_empty() {
            cmap.codespaces.push(CodeSpaceRange {
                low: 0x00,
                high: 0xFF,
                len: 1,
            });
        }

        tracing::trace!(
            "Parsed ToUnicode CMap: {} codespace ranges, {} chars, {} ranges",
            cmap.codespaces.len(),
            cmap.chars.len(),
            cmap.ranges.len()
        );
        Ok(cmap)
    }

    fn insert_range(&mut self, low: &Object, high: &Object, dst: &Object) {
        let (Some((low, _)), Some((high, _))) = (source_code(low), source_code(high)) else {
            return;
        };
        if high < low {
            tracing::debug!("Skipping inverted bfrange <{:X}> <{:X}>", low, high);
            return;
        }
        let target = match dst {
            // <lo> <hi> [<d1> <d2> ...]
            Object::Array(items) => RangeTarget::Listed(
                items
                    .iter()
                    .map(|item| {
                        destination(item)
                            .map(|units| String::from_utf16_lossy(&units))
                            .unwrap_or_default()
                    })
                    .collect(),
            ),
            // <lo> <hi> <dst>
            other => match destination(other) {
                Some(units) if !units.is_empty() => RangeTarget::Incrementing(units),
                _ => return,
            },
        };
        self.ranges.push(BfRange { low, high, target });
    }

    fn lookup(&self, code: u32) -> Option<String> {
        if let Some(text) = self.chars.get(&code) {
            return Some(text.clone());
        }
        // Later ranges win over earlier ones.
        self.ranges
            .iter()
            .rev()
            .find(|range| range.low <= code && code <= range.high)
            .and_then(|range| range.text(code))
    }

    /// Shortest code length that falls inside a declared codespace range.
    fn next_code(&self, raw: &[u8], offset: usize) -> (u32, usize) {
        for len in 1..=4 {
            if offset + len > raw.len() {
                break;
            }
            let code = raw[offset..offset + len]
                .iter()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            if self
                .codespaces
                .iter()
                .any(|r| r.len == len && code >= r.low && code <= r.high)
            {
                return (code, len);
            }
        }
        (u32::from(raw[offset]), 1)
    }
}

impl CharMap for ToUnicodeMap {
    fn decode(&self, raw: &[u8]) -> String {
        let mut text = String::new();
        let mut i = 0;
        while i < raw.len() {
            let (code, len) = self.next_code(raw, i);
            match self.lookup(code) {
                Some(mapped) => text.push_str(&mapped),
                None if len == 1 => text.push(char::from(raw[i])),
                None => text.push(char::REPLACEMENT_CHARACTER),
            }
            i += len;
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BYTE_CMAP: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0011> <0024>
endbfchar
2 beginbfrange
<0024> <0026> <0041>
<0030> <0031> [<0066> <FB01>]
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end";

    #[test]
    fn test_identity_map_is_latin1() {
        assert_eq!(IdentityMap.decode(b"Total $1"), "Total $1");
        assert_eq!(IdentityMap.decode(&[0xE9]), "\u{e9}");
    }

    #[test]
    fn test_bfchar_and_bfrange_decoding() {
        let cmap = ToUnicodeMap::parse(TWO_BYTE_CMAP).unwrap();
        // <0024 0025 0026> -> "ABC", <0003> -> space, <0011> -> '$'
        assert_eq!(cmap.decode(&[0x00, 0x24, 0x00, 0x25, 0x00, 0x26]), "ABC");
        assert_eq!(cmap.decode(&[0x00, 0x11, 0x00, 0x03]), "$ ");
        // array-form range: <0031> -> the "fi" ligature
        assert_eq!(cmap.decode(&[0x00, 0x30, 0x00, 0x31]), "f\u{fb01}");
    }

    #[test]
    fn test_unmapped_two_byte_code_is_replacement() {
        let cmap = ToUnicodeMap::parse(TWO_BYTE_CMAP).unwrap();
        assert_eq!(cmap.decode(&[0x01, 0x00]), "\u{fffd}");
    }

    #[test]
    fn test_missing_codespace_defaults_to_single_bytes() {
        let cmap = ToUnicodeMap::parse(b"1 beginbfchar <41> <0058> endbfchar").unwrap();
        assert_eq!(cmap.decode(b"AB"), "XB");
    }

    #[test]
    fn test_full_width_bfrange_is_not_expanded() {
        let cmap = ToUnicodeMap::parse(
            b"1 begincodespacerange <00000000> <FFFFFFFF> endcodespacerange \
              1 beginbfrange <00000000> <FFFFFFFF> <0041> endbfrange",
        )
        .unwrap();
        assert_eq!(cmap.ranges.len(), 1);
        assert!(cmap.chars.is_empty());
        assert_eq!(cmap.decode(&[0, 0, 0, 2, 0, 0, 0, 0]), "CA");
    }

    #[test]
    fn test_array_range_shorter_than_span() {
        let cmap = ToUnicodeMap::parse(b"1 beginbfrange <01> <FF> [<0058> <0059>] endbfrange").unwrap();
        // Codes past the listed destinations stay unmapped and fall back to Latin-1.
        assert_eq!(cmap.decode(&[0x01, 0x02, 0x41]), "XYA");
    }

    #[test]
    fn test_deeply_nested_cmap_is_rejected() {
        let mut data = b"1 beginbfrange <01> <02> ".to_vec();
        data.extend(vec![b'['; 10_000]);
        assert!(matches!(
            ToUnicodeMap::parse(&data),
            Err(InterpretError::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_encoding_map_uses_lopdf_decoding() {
        let map = EncodingMap::new(Encoding::SimpleEncoding("UniGB-UCS2-H"));
        assert_eq!(map.decode(&[0x00, 0x41, 0x00, 0x42]), "AB");
    }

    #[test]
    fn test_encoding_map_falls_back_to_latin1() {
        let map = EncodingMap::new(Encoding::SimpleEncoding("Custom"));
        assert_eq!(map.decode(&[0x41, 0xE9]), "A\u{e9}");
    }

    #[test]
    fn test_identity_fonts_has_no_maps() {
        assert!(IdentityFonts.char_map("F1").is_none());
    }
}
