// src/config.rs

/// Number of word positions after a sentence start within which a pending
/// label's numeral must appear.
pub const DEFAULT_NUMERAL_WINDOW: usize = 5;

/// Sentences joined together when a label may be split across lines.
pub const DEFAULT_LOOKAHEAD_SENTENCES: usize = 5;

/// Tunables for one extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub numeral_window: usize,
    pub lookahead_sentences: usize,
    /// Stop reading after this many pages (all pages when `None`).
    pub max_pages: Option<usize>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            numeral_window: DEFAULT_NUMERAL_WINDOW,
            lookahead_sentences: DEFAULT_LOOKAHEAD_SENTENCES,
            max_pages: None,
        }
    }
}
