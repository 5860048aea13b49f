// src/document/reader.rs
//! PDF access through lopdf.

use crate::content::cmap::{CharMap, EncodingMap, FontLookup, ToUnicodeMap};
use crate::document::DocumentSource;
use crate::utils::error::DocumentError;
use lopdf::{Dictionary, Encoding, Object, ObjectId, Stream};
use std::path::Path;

// Guards against /Parent cycles in broken page trees.
const MAX_TREE_DEPTH: usize = 64;

/// A loaded PDF with its page-tree order cached.
pub struct PdfDocument {
    inner: lopdf::Document,
    page_ids: Vec<ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfPage {
    pub id: ObjectId,
    /// 1-based page number.
    pub number: usize,
}

impl PdfDocument {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        Self::from_document(lopdf::Document::load(path)?)
    }

    pub fn load_mem(bytes: &[u8]) -> Result<Self, DocumentError> {
        Self::from_document(lopdf::Document::load_mem(bytes)?)
    }

    fn from_document(inner: lopdf::Document) -> Result<Self, DocumentError> {
        // get_pages is keyed by 1-based page number, so values come out in order
        let page_ids: Vec<ObjectId> = inner.get_pages().values().copied().collect();
        if page_ids.is_empty() {
            return Err(DocumentError::NoPages);
        }
        tracing::debug!("Loaded PDF with {} pages", page_ids.len());
        Ok(Self { inner, page_ids })
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> Result<&'a Object, lopdf::Error> {
        match obj {
            Object::Reference(id) => self.inner.get_object(*id),
            other => Ok(other),
        }
    }

    fn page_dict(&self, page: &PdfPage) -> Result<&Dictionary, DocumentError> {
        self.inner
            .get_object(page.id)
            .and_then(Object::as_dict)
            .map_err(|e| malformed(page, format!("page object is not a dictionary: {}", e)))
    }

    /// Looks `key` up on the page, then on its ancestors in the page tree.
    fn resolve_inherited(&self, page: &PdfPage, key: &[u8]) -> Result<Option<&Object>, DocumentError> {
        let mut dict = self.page_dict(page)?;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(value) = dict.get(key) {
                return self
                    .resolve(value)
                    .map(Some)
                    .map_err(|e| malformed(page, format!("unresolvable /{}: {}", String::from_utf8_lossy(key), e)));
            }
            let Ok(parent) = dict.get(b"Parent") else {
                return Ok(None);
            };
            dict = self
                .resolve(parent)
                .and_then(Object::as_dict)
                .map_err(|e| malformed(page, format!("invalid /Parent: {}", e)))?;
        }
        Err(malformed(page, "page tree is too deep".to_string()))
    }

    fn stream_bytes(&self, page: &PdfPage, stream: &Stream) -> Result<Vec<u8>, DocumentError> {
        decode_stream(stream).map_err(|e| DocumentError::Decompress {
            page: page.number,
            reason: e.to_string(),
        })
    }
}

fn malformed(page: &PdfPage, reason: String) -> DocumentError {
    DocumentError::MalformedPage {
        page: page.number,
        reason,
    }
}

fn decode_stream(stream: &Stream) -> Result<Vec<u8>, lopdf::Error> {
    if stream.dict.get(b"Filter").is_ok() {
        stream.decompressed_content()
    } else {
        Ok(stream.content.clone())
    }
}

impl DocumentSource for PdfDocument {
    type Page = PdfPage;

    fn pages(&self) -> Result<Vec<PdfPage>, DocumentError> {
        Ok(self
            .page_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| PdfPage { id, number: i + 1 })
            .collect())
    }

    fn content_streams(&self, page: &PdfPage) -> Result<Vec<Vec<u8>>, DocumentError> {
        let dict = self.page_dict(page)?;
        let Ok(contents) = dict.get(b"Contents") else {
            return Ok(Vec::new()); // blank page
        };
        let contents = self
            .resolve(contents)
            .map_err(|e| malformed(page, format!("unresolvable /Contents: {}", e)))?;

        match contents {
            Object::Stream(stream) => Ok(vec![self.stream_bytes(page, stream)?]),
            Object::Array(items) => items
                .iter()
                .map(|item| {
                    let stream = self
                        .resolve(item)
                        .and_then(Object::as_stream)
                        .map_err(|e| malformed(page, format!("/Contents entry is not a stream: {}", e)))?;
                    self.stream_bytes(page, stream)
                })
                .collect(),
            _ => Err(malformed(page, "/Contents is neither a stream nor an array".to_string())),
        }
    }

    fn fonts<'a>(&'a self, page: &PdfPage) -> Result<Box<dyn FontLookup + 'a>, DocumentError> {
        let fonts = match self.resolve_inherited(page, b"Resources")? {
            Some(resources) => {
                let resources = resources
                    .as_dict()
                    .map_err(|e| malformed(page, format!("/Resources is not a dictionary: {}", e)))?;
                match resources.get(b"Font") {
                    Ok(font) => match self.resolve(font).and_then(Object::as_dict) {
                        Ok(dict) => Some(dict),
                        Err(e) => {
                            tracing::warn!("Page {}: ignoring unreadable /Font resources: {}", page.number, e);
                            None
                        }
                    },
                    Err(_) => None,
                }
            }
            None => None,
        };
        Ok(Box::new(PageFonts {
            doc: self,
            page: page.number,
            fonts,
        }))
    }
}

/// The `/Font` resources of one page.
struct PageFonts<'a> {
    doc: &'a PdfDocument,
    page: usize,
    fonts: Option<&'a Dictionary>,
}

impl<'a> PageFonts<'a> {
    fn font_dict(&self, font: &str) -> Result<Option<&'a Dictionary>, String> {
        let doc = self.doc;
        let Some(entry) = self.fonts.and_then(|fonts| fonts.get(font.as_bytes()).ok()) else {
            return Ok(None);
        };
        doc.resolve(entry)
            .and_then(Object::as_dict)
            .map(Some)
            .map_err(|e| format!("font dictionary: {}", e))
    }

    /// lopdf decodes fonts with a named `/Encoding`; a `/ToUnicode` map it
    /// cannot read goes through [`ToUnicodeMap`] instead.
    fn encoding(&self, font: &'a Dictionary) -> Result<Option<Box<dyn CharMap + 'a>>, String> {
        let has_to_unicode = font.has(b"ToUnicode");
        let named_encoding = font.get(b"Encoding").and_then(Object::as_name).is_ok();

        if named_encoding && font.type_is(b"Font") {
            match font.get_font_encoding(&self.doc.inner) {
                Ok(encoding @ Encoding::UnicodeMapEncoding(_)) => {
                    return Ok(Some(Box::new(EncodingMap::new(encoding))));
                }
                Ok(encoding) if !has_to_unicode => {
                    return Ok(Some(Box::new(EncodingMap::new(encoding))));
                }
                Ok(encoding) => {
                    tracing::trace!("Page {}: preferring /ToUnicode over {:?}", self.page, encoding);
                }
                Err(e) => {
                    tracing::debug!("Page {}: lopdf could not resolve the font encoding: {}", self.page, e);
                }
            }
        }
        if !has_to_unicode {
            return Ok(None);
        }

        let stream = font
            .get(b"ToUnicode")
            .and_then(|obj| self.doc.resolve(obj))
            .and_then(Object::as_stream)
            .map_err(|e| format!("/ToUnicode: {}", e))?;
        let data = decode_stream(stream).map_err(|e| format!("/ToUnicode stream: {}", e))?;
        ToUnicodeMap::parse(&data)
            .map(|map| Some(Box::new(map) as Box<dyn CharMap + 'a>))
            .map_err(|e| format!("/ToUnicode CMap: {}", e))
    }
}

impl FontLookup for PageFonts<'_> {
    fn char_map(&self, font: &str) -> Option<Box<dyn CharMap + '_>> {
        let resolved = self
            .font_dict(font)
            .and_then(|dict| dict.map_or(Ok(None), |dict| self.encoding(dict)));
        match resolved {
            Ok(map) => map,
            Err(reason) => {
                tracing::warn!("Page {}: font '{}' has an unusable {}", self.page, font, reason);
                None
            }
        }
    }
}

/// Builds a small PDF for tests; each entry of `pages` lists the content
/// streams of one page. Every page shares three fonts: `/F1` has a one-byte
/// ToUnicode map sending 0x01 to 'A', `/F2` is WinAnsi encoded and `/F3` is
/// an Identity-H font whose two-byte codes 0x0024..0x0025 map to "A".."B".
#[cfg(test)]
pub(crate) fn sample_pdf(pages: &[&[&[u8]]]) -> Vec<u8> {
    use lopdf::{dictionary, Document};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let cmap_id = doc.add_object(Stream::new(
        dictionary! {},
        b"1 begincodespacerange <00> <FF> endcodespacerange 1 beginbfchar <01> <0041> endbfchar".to_vec(),
    ));
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "ToUnicode" => cmap_id,
    });
    let win_ansi_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let identity_cmap_id = doc.add_object(Stream::new(
        dictionary! {},
        b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 beginbfrange
<0024> <0025> <0041>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end
"
        .to_vec(),
    ));
    let identity_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "Arial",
        "Encoding" => "Identity-H",
        "ToUnicode" => identity_cmap_id,
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id, "F2" => win_ansi_id, "F3" => identity_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for streams in pages {
        let stream_ids: Vec<Object> = streams
            .iter()
            .map(|content| doc.add_object(Stream::new(dictionary! {}, content.to_vec())).into())
            .collect();
        let contents: Object = match stream_ids.as_slice() {
            [single] => single.clone(),
            _ => Object::Array(stream_ids),
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => contents,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save test PDF");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::interpreter::Interpreter;

    fn page_text(doc: &PdfDocument, page: &PdfPage) -> Vec<String> {
        let fonts = doc.fonts(page).unwrap();
        let mut interpreter = Interpreter::new(fonts.as_ref());
        for stream in doc.content_streams(page).unwrap() {
            interpreter.process(&stream).unwrap();
        }
        interpreter.into_fragments()
    }

    #[test]
    fn test_pages_in_tree_order() {
        let pdf = sample_pdf(&[&[b"BT (one) Tj ET"], &[b"BT (two) Tj ET"]]);
        let doc = PdfDocument::load_mem(&pdf).unwrap();
        assert_eq!(doc.page_count(), 2);
        let pages = doc.pages().unwrap();
        assert_eq!(pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(page_text(&doc, &pages[1]), vec!["two"]);
    }

    #[test]
    fn test_contents_array_and_inherited_fonts() {
        let pdf = sample_pdf(&[&[b"BT /F1 12 Tf <01> Tj ( ) Tj", b"(Amount) Tj ET"]]);
        let doc = PdfDocument::load_mem(&pdf).unwrap();
        let pages = doc.pages().unwrap();
        assert_eq!(doc.content_streams(&pages[0]).unwrap().len(), 2);
        assert_eq!(page_text(&doc, &pages[0]), vec!["A ", "Amount"]);
    }

    #[test]
    fn test_unknown_font_falls_back_to_identity() {
        let pdf = sample_pdf(&[&[b"BT /F9 12 Tf <41> Tj ET"]]);
        let doc = PdfDocument::load_mem(&pdf).unwrap();
        let pages = doc.pages().unwrap();
        assert!(doc.fonts(&pages[0]).unwrap().char_map("F9").is_none());
        assert_eq!(page_text(&doc, &pages[0]), vec!["A"]);
    }

    #[test]
    fn test_named_encoding_decoded_by_lopdf() {
        let pdf = sample_pdf(&[&[b"BT /F2 12 Tf <92> Tj ET"]]);
        let doc = PdfDocument::load_mem(&pdf).unwrap();
        let pages = doc.pages().unwrap();
        assert_eq!(page_text(&doc, &pages[0]), vec!["\u{2019}"]);
    }

    #[test]
    fn test_identity_h_font_uses_to_unicode() {
        let pdf = sample_pdf(&[&[b"BT /F3 12 Tf <00240025> Tj ET"]]);
        let doc = PdfDocument::load_mem(&pdf).unwrap();
        let pages = doc.pages().unwrap();
        assert_eq!(page_text(&doc, &pages[0]), vec!["AB"]);
    }

    #[test]
    fn test_garbage_is_a_load_error() {
        assert!(matches!(
            PdfDocument::load_mem(b"this is not a pdf"),
            Err(DocumentError::Load(_))
        ));
    }

    #[test]
    fn test_document_without_pages() {
        let pdf = sample_pdf(&[]);
        assert!(matches!(PdfDocument::load_mem(&pdf), Err(DocumentError::NoPages)));
    }
}
