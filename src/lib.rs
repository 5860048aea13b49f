// src/lib.rs
//! Reads dividend and distribution statements: PDF content streams are
//! replayed into text fragments, and payment facts are picked out of the
//! resulting sentences.

pub mod config;
pub mod content;
pub mod dispenser;
pub mod document;
pub mod extractors;
pub mod statement;
pub mod storage;
pub mod utils;

pub use config::ExtractorConfig;
pub use document::{DocumentSource, PdfDocument, RawDocument};
pub use extractors::{extract, extract_file, extract_pdf_bytes, Extraction};
pub use statement::{Dollar, Field, Statement};
pub use utils::error::{ExtractError, ExtractWarning};
