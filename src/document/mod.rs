// src/document/mod.rs
//! Access to the pages of a document: their content streams and fonts.

pub mod reader;

pub use reader::{PdfDocument, PdfPage};

use crate::content::cmap::{FontLookup, IdentityFonts};
use crate::utils::error::DocumentError;

/// What text reconstruction needs from a document.
pub trait DocumentSource {
    type Page;

    /// Pages in reading order.
    fn pages(&self) -> Result<Vec<Self::Page>, DocumentError>;

    /// The page's content streams, already decompressed, in drawing order.
    fn content_streams(&self, page: &Self::Page) -> Result<Vec<Vec<u8>>, DocumentError>;

    /// Character maps for the fonts the page's resources name.
    fn fonts<'a>(&'a self, page: &Self::Page) -> Result<Box<dyn FontLookup + 'a>, DocumentError>;
}

/// Pages given directly as content-stream bytes, decoded with identity fonts.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    pages: Vec<Vec<u8>>,
}

impl RawDocument {
    pub fn new(pages: Vec<Vec<u8>>) -> Self {
        Self { pages }
    }

    pub fn single_page(content: impl Into<Vec<u8>>) -> Self {
        Self::new(vec![content.into()])
    }
}

impl DocumentSource for RawDocument {
    type Page = usize;

    fn pages(&self) -> Result<Vec<usize>, DocumentError> {
        if self.pages.is_empty() {
            return Err(DocumentError::NoPages);
        }
        Ok((0..self.pages.len()).collect())
    }

    fn content_streams(&self, page: &usize) -> Result<Vec<Vec<u8>>, DocumentError> {
        self.pages
            .get(*page)
            .map(|content| vec![content.clone()])
            .ok_or_else(|| DocumentError::MalformedPage {
                page: page + 1,
                reason: "no such page".to_string(),
            })
    }

    fn fonts<'a>(&'a self, _page: &usize) -> Result<Box<dyn FontLookup + 'a>, DocumentError> {
        Ok(Box::new(IdentityFonts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_document_pages() {
        let doc = RawDocument::new(vec![b"(a) Tj".to_vec(), b"(b) Tj".to_vec()]);
        assert_eq!(doc.pages().unwrap(), vec![0, 1]);
        assert_eq!(doc.content_streams(&1).unwrap(), vec![b"(b) Tj".to_vec()]);
        assert!(doc.fonts(&0).unwrap().char_map("F1").is_none());
        assert!(matches!(
            doc.content_streams(&2),
            Err(DocumentError::MalformedPage { page: 3, .. })
        ));
    }

    #[test]
    fn test_empty_raw_document_has_no_pages() {
        assert!(matches!(RawDocument::default().pages(), Err(DocumentError::NoPages)));
    }
}
