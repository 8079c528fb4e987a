//! PDF byte extraction: §4.3.
//!
//! Concatenated page text (pages separated by a blank line) plus
//! `{title, author, pdf_pages}` metadata. Malformed input is a
//! non-retryable `browser_error`, never a panic.

use iris_types::{ErrorKind, IrisError, IrisResult};
use lopdf::{Document, Object};

#[derive(Debug, Clone, Default)]
pub struct PdfContent {
    pub text: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub pdf_pages: u32,
}

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn extract(data: &[u8]) -> IrisResult<PdfContent> {
        if data.len() < 10 || !data.starts_with(b"%PDF-") {
            return Err(IrisError::Browser("invalid PDF header".into()));
        }

        let document = Document::load_mem(data)
            .map_err(|e| IrisError::Browser(format!("failed to parse PDF: {e}")))?;

        let pages = document.get_pages();
        let pdf_pages = pages.len() as u32;

        let mut page_texts = Vec::with_capacity(pages.len());
        for page_number in 1..=pdf_pages {
            match document.extract_text(&[page_number]) {
                Ok(text) => page_texts.push(text),
                Err(e) => {
                    tracing::warn!(page_number, error = %e, "failed to extract PDF page text");
                }
            }
        }

        let (title, author) = extract_info(&document);

        Ok(PdfContent {
            text: page_texts.join("\n\n"),
            title,
            author,
            pdf_pages,
        })
    }
}

fn extract_info(document: &Document) -> (Option<String>, Option<String>) {
    let info_dict = document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| match obj {
            Object::Reference(id) => document.get_object(*id).ok(),
            other => Some(other),
        })
        .and_then(|obj| match obj {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        });

    let Some(dict) = info_dict else {
        return (None, None);
    };

    (dict_string(dict, b"Title"), dict_string(dict, b"Author"))
}

fn dict_string(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key).ok().and_then(|obj| match obj {
        Object::String(bytes, _) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_data_without_pdf_header() {
        let err = PdfExtractor::extract(b"not a pdf").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrowserError);
        assert!(!err.is_retryable());
    }

    #[test]
    fn rejects_truncated_header() {
        let err = PdfExtractor::extract(b"%PDF").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrowserError);
    }

    #[test]
    fn rejects_unparseable_body_despite_valid_header() {
        let data = b"%PDF-1.7\ngarbage that is not a real pdf body";
        let result = PdfExtractor::extract(data);
        assert!(result.is_err());
    }
}
