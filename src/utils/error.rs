// src/utils/error.rs
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to load PDF: {0}")]
    Load(#[from] lopdf::Error), // Automatically convert lopdf errors

    #[error("Document has no pages")]
    NoPages,

    #[error("Malformed page {page}: {reason}")]
    MalformedPage { page: usize, reason: String },

    #[error("Failed to decompress content stream on page {page}: {reason}")]
    Decompress { page: usize, reason: String },
}

#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("Operator '{operator}' (operation {index}) needs {needed} operands, stack holds {available}")]
    StackUnderflow {
        operator: String,
        index: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unexpected end of content stream inside {context} (started at offset {offset})")]
    UnexpectedEof { context: &'static str, offset: usize },

    #[error("Operands nested deeper than {limit} levels at offset {offset}")]
    NestingTooDeep { offset: usize, limit: usize },

    #[error("Content stream could not be parsed: {0}")]
    Parse(#[from] lopdf::Error),
}

/// Where a document was in its processing when a fault was caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Loading,
    ReadingPages,
    Interpreting,
    Extracting,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            ProcessingStage::Loading => "loading the document",
            ProcessingStage::ReadingPages => "reading the page tree",
            ProcessingStage::Interpreting => "interpreting content streams",
            ProcessingStage::Extracting => "extracting statement fields",
        };
        f.write_str(stage)
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Document structure could not be read: {0}")]
    Document(#[from] DocumentError),

    #[error("Content stream interpretation failed on page {page}: {source}")]
    Interpret {
        page: usize,
        #[source]
        source: InterpretError,
    },

    #[error("Failed to process document while {stage}{}: {message}", page_suffix(.page))]
    Panic {
        stage: ProcessingStage,
        page: Option<usize>,
        message: String,
    },
}

fn page_suffix(page: &Option<usize>) -> String {
    page.map(|p| format!(" (page {})", p)).unwrap_or_default()
}

/// Problems that leave a field unset but never abort the document.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExtractWarning {
    #[error("Failed to parse payment date from '{text}': {reason}")]
    DateParse { text: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data processing failed: {0}")]
    Processing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_error_mentions_stage_and_page() {
        let err = ExtractError::Panic {
            stage: ProcessingStage::Interpreting,
            page: Some(2),
            message: "index out of bounds".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to process document while interpreting content streams (page 2): index out of bounds"
        );

        let err = ExtractError::Panic {
            stage: ProcessingStage::Loading,
            page: None,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to process document while loading the document: boom");
    }
}
