// src/extractors/mod.rs
pub mod document;
pub mod labels;
pub mod statement;

// Re-export key extraction types for convenience
pub use document::{extract, extract_file, extract_pdf_bytes, Extraction};
pub use labels::{match_label, LabelMatch};
pub use statement::StatementExtractor;
