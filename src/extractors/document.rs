// src/extractors/document.rs
//! Per-document entry point: pages to fragments to a [`Statement`].

use crate::config::ExtractorConfig;
use crate::content::interpreter::Interpreter;
use crate::document::{DocumentSource, PdfDocument};
use crate::extractors::statement::StatementExtractor;
use crate::statement::Statement;
use crate::utils::error::{DocumentError, ExtractError, ExtractWarning, ProcessingStage};
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// Everything one document produced.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub statement: Statement,
    pub warnings: Vec<ExtractWarning>,
    /// Reconstructed text, in reading order across pages.
    pub fragments: Vec<String>,
}

type Progress = Cell<(ProcessingStage, Option<usize>)>;

/// Reconstructs the text of `doc` and extracts its statement. A panic anywhere
/// below is caught and reported with the stage and page it happened on.
pub fn extract<D: DocumentSource>(
    doc: &D,
    holders: &[String],
    config: &ExtractorConfig,
) -> Result<Extraction, ExtractError> {
    let progress: Progress = Cell::new((ProcessingStage::ReadingPages, None));
    match panic::catch_unwind(AssertUnwindSafe(|| run(doc, holders, config, &progress))) {
        Ok(result) => result,
        Err(payload) => {
            let (stage, page) = progress.get();
            let message = panic_message(payload.as_ref());
            tracing::error!("Recovered from panic while {}: {}", stage, message);
            Err(ExtractError::Panic { stage, page, message })
        }
    }
}

/// Loads an in-memory PDF and extracts its statement.
pub fn extract_pdf_bytes(
    bytes: &[u8],
    holders: &[String],
    config: &ExtractorConfig,
) -> Result<Extraction, ExtractError> {
    let doc = load_guarded(|| PdfDocument::load_mem(bytes))?;
    extract(&doc, holders, config)
}

/// Opens a PDF file and extracts its statement.
pub fn extract_file<P: AsRef<Path>>(
    path: P,
    holders: &[String],
    config: &ExtractorConfig,
) -> Result<Extraction, ExtractError> {
    let path = path.as_ref();
    let doc = load_guarded(|| PdfDocument::load(path))?;
    extract(&doc, holders, config)
}

fn load_guarded<F>(load: F) -> Result<PdfDocument, ExtractError>
where
    F: FnOnce() -> Result<PdfDocument, DocumentError>,
{
    match panic::catch_unwind(AssertUnwindSafe(load)) {
        Ok(doc) => Ok(doc?),
        Err(payload) => Err(ExtractError::Panic {
            stage: ProcessingStage::Loading,
            page: None,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn run<D: DocumentSource>(
    doc: &D,
    holders: &[String],
    config: &ExtractorConfig,
    progress: &Progress,
) -> Result<Extraction, ExtractError> {
    progress.set((ProcessingStage::ReadingPages, None));
    let pages = doc.pages()?;
    let limit = config.max_pages.unwrap_or(pages.len());
    if limit < pages.len() {
        tracing::info!("Reading {} of {} pages", limit, pages.len());
    }

    let mut fragments = Vec::new();
    for (index, page) in pages.iter().enumerate().take(limit) {
        let number = index + 1;
        progress.set((ProcessingStage::Interpreting, Some(number)));

        let fonts = doc.fonts(page)?;
        let mut interpreter = Interpreter::new(fonts.as_ref());
        for stream in doc.content_streams(page)? {
            interpreter
                .process(&stream)
                .map_err(|source| ExtractError::Interpret { page: number, source })?;
        }
        let page_fragments = interpreter.into_fragments();
        tracing::debug!("Page {}: {} fragments", number, page_fragments.len());
        fragments.extend(page_fragments);
    }

    progress.set((ProcessingStage::Extracting, None));
    let (statement, warnings) = StatementExtractor::new(*config, holders).extract(&fragments);
    Ok(Extraction {
        statement,
        warnings,
        fragments,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
