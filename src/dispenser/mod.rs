// src/dispenser/mod.rs
//! Cursor over reconstructed text fragments.
//!
//! A fragment ending in a single space is followed by the next word of the
//! same sentence; a fragment without one ends its sentence. That suffix is
//! the only sentence-boundary signal.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::str::FromStr;

// Plain decimal notation only: no exponents, digit separators, inf or nan.
static NUMERAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)$").expect("Failed to compile NUMERAL_RE")
});

/// Parses a fragment as a numeral: thousands separators removed, surrounding
/// whitespace trimmed, leading `$` signs dropped. `None` means "not a numeral",
/// which includes values too large for a [`Decimal`].
pub fn parse_numeral(text: &str) -> Option<Decimal> {
    let cleaned = text.replace(',', "");
    let cleaned = cleaned.trim().trim_start_matches('$');
    if !NUMERAL_RE.is_match(cleaned) {
        return None;
    }
    match Decimal::from_str(cleaned) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("'{}' is out of numeral range: {}", cleaned, e);
            None
        }
    }
}

/// Dispenses words, numerals and sentences from a fragment sequence.
#[derive(Debug, Clone)]
pub struct Dispenser<'a> {
    fragments: Cow<'a, [String]>,
    /// Index of the next fragment to read.
    next: usize,
    /// A sentence has been opened and not yet fully consumed.
    sentence_open: bool,
}

impl<'a> Dispenser<'a> {
    pub fn new(fragments: impl Into<Cow<'a, [String]>>) -> Self {
        Self {
            fragments: fragments.into(),
            next: 0,
            sentence_open: false,
        }
    }

    /// Builds a dispenser over a single sentence of space-separated words.
    pub fn from_sentence(text: &str) -> Self {
        let mut words: Vec<String> = text.split(' ').map(|w| format!("{} ", w)).collect();
        if let Some(last) = words.last_mut() {
            last.pop();
        }
        Self::new(words)
    }

    pub fn fragments(&self) -> &[String] {
        self.fragments.as_ref()
    }

    fn ends_sentence(&self, idx: usize) -> bool {
        !self.fragments[idx].ends_with(' ')
    }

    fn is_numeral(&self, idx: usize) -> bool {
        parse_numeral(&self.fragments[idx]).is_some()
    }

    fn last_consumed(&self) -> Option<usize> {
        self.next
            .checked_sub(1)
            .filter(|&idx| idx < self.fragments.len())
    }

    /// First fragment of the sentence containing `idx`.
    fn sentence_start(&self, mut idx: usize) -> usize {
        while idx > 0 && !self.ends_sentence(idx - 1) {
            idx -= 1;
        }
        idx
    }

    /// The current word, trimmed. Empty before the first advance.
    pub fn word(&self) -> &str {
        self.last_consumed()
            .map(|idx| self.fragments[idx].trim())
            .unwrap_or("")
    }

    /// The word before the current one, as stored.
    pub fn last_word(&self) -> &str {
        self.next
            .checked_sub(2)
            .and_then(|idx| self.fragments.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The `n` words preceding the current one, joined as they were stored.
    pub fn last_n_words(&self, n: usize) -> String {
        let Some(end) = self.last_consumed() else {
            return String::new();
        };
        if n == 0 || n > end {
            return String::new();
        }
        self.fragments[end - n..end].concat().trim().to_string()
    }

    /// Advances over one plain word of the open sentence. Numerals are left
    /// for [`Dispenser::next_numeral`].
    pub fn next_word(&mut self) -> bool {
        if self.next >= self.fragments.len() || !self.sentence_open || self.is_numeral(self.next) {
            return false;
        }
        if self.ends_sentence(self.next) || self.next + 1 == self.fragments.len() {
            self.sentence_open = false;
        }
        self.next += 1;
        true
    }

    /// Advances over the next fragment if it is a numeral of the open sentence.
    pub fn next_numeral(&mut self) -> bool {
        if self.next >= self.fragments.len() || !self.sentence_open || !self.is_numeral(self.next) {
            return false;
        }
        if self.ends_sentence(self.next) {
            self.sentence_open = false;
        }
        self.next += 1;
        true
    }

    /// Moves onto the next numeral of the open sentence so that
    /// [`Dispenser::numeral`] yields it. Leaves the cursor untouched and
    /// returns false when the sentence has no further numeral.
    pub fn jump_next_numeral(&mut self) -> bool {
        let start = self.next;
        let was_open = self.sentence_open;

        while !self.at_end_of_sentence() {
            if self.next_numeral() {
                self.next -= 1;
                self.sentence_open = true;
                break;
            }
            self.next_word();
        }

        if self.next_numeral() {
            self.sentence_open = true;
            return true;
        }
        self.next = start;
        self.sentence_open = was_open;
        false
    }

    /// Opens the sentence at the cursor, or, when one is already open, skips
    /// to the start of the sentence after it.
    pub fn next_sentence(&mut self) -> bool {
        if self.next >= self.fragments.len() {
            return false;
        }
        if !self.sentence_open {
            self.sentence_open = true;
            return true;
        }
        while self.next < self.fragments.len() {
            let boundary = self.ends_sentence(self.next);
            self.next += 1;
            if boundary {
                break;
            }
        }
        self.next < self.fragments.len()
    }

    /// Moves back to the first fragment of the current sentence and opens it.
    /// With a sentence open at the cursor that is the sentence being read;
    /// otherwise it is the one that was just consumed.
    pub fn start_of_sentence(&mut self) {
        if self.fragments.is_empty() {
            self.next = 0;
            self.sentence_open = true;
            return;
        }
        let anchor = if self.sentence_open && self.next < self.fragments.len() {
            self.next
        } else {
            self.next.saturating_sub(1)
        };
        let anchor = anchor.min(self.fragments.len() - 1);
        self.next = self.sentence_start(anchor);
        self.sentence_open = true;
    }

    /// Moves to the start of the sentence before the current one. On the
    /// first sentence the cursor stays at its start.
    pub fn last_sentence(&mut self) {
        self.start_of_sentence();
        if self.next > 0 {
            self.next = self.sentence_start(self.next - 1);
        }
    }

    /// Returns the rest of the open sentence and closes it.
    pub fn consume_sentence(&mut self) -> String {
        if !self.sentence_open {
            return String::new();
        }
        let mut sentence = String::new();
        while self.next < self.fragments.len() {
            sentence.push_str(&self.fragments[self.next]);
            let boundary = self.ends_sentence(self.next);
            self.next += 1;
            if boundary {
                break;
            }
        }
        self.sentence_open = false;
        sentence
    }

    /// Reads up to `n` sentences from the cursor without moving it.
    pub fn peek_sentences(&mut self, n: usize) -> Vec<String> {
        if n == 0 {
            return Vec::new();
        }
        let start = self.next;
        let was_open = self.sentence_open;

        let mut sentences = vec![self.consume_sentence()];
        for _ in 1..n {
            if !self.next_sentence() {
                break;
            }
            sentences.push(self.consume_sentence());
        }

        self.next = start;
        self.sentence_open = was_open;
        sentences
    }

    pub fn at_end_of_sentence(&self) -> bool {
        !self.sentence_open || self.next >= self.fragments.len()
    }

    /// Value of the current word when it is a numeral.
    pub fn numeral(&self) -> Option<Decimal> {
        self.last_consumed()
            .and_then(|idx| parse_numeral(&self.fragments[idx]))
    }

    pub fn position(&self) -> usize {
        self.next
    }

    pub fn is_sentence_open(&self) -> bool {
        self.sentence_open
    }
}
