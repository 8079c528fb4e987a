pub mod links;
pub mod metadata;
pub mod structured_data;
pub mod text;

use iris_types::model::{ExtractFlags, Link, Metadata, StructuredData};
use scraper::Html;

/// Everything §4.2 asks `ContentExtractor` to produce from rendered HTML.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub text: String,
    pub metadata: Metadata,
    pub links: Vec<Link>,
    pub structured_data: StructuredData,
}

pub struct ContentExtractor;

impl ContentExtractor {
    /// `html` is the rendered DOM serialized to a string; `base_url` is the
    /// page's final URL, used to resolve relative links and the canonical
    /// metadata field.
    pub fn extract(html: &str, base_url: &str, flags: &ExtractFlags) -> ExtractedContent {
        let document = Html::parse_document(html);

        ExtractedContent {
            text: if flags.extract_text {
                text::extract_text(&document)
            } else {
                String::new()
            },
            metadata: if flags.extract_metadata {
                metadata::extract_metadata(&document)
            } else {
                Metadata::default()
            },
            links: if flags.extract_links {
                links::extract_links(&document, base_url)
            } else {
                Vec::new()
            },
            structured_data: structured_data::extract_structured_data(&document),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_disabled_extraction_targets() {
        let html = r#"<html><body><article><p>Body text</p></article><a href="https://x.com">x</a></body></html>"#;
        let flags = ExtractFlags {
            extract_text: false,
            extract_metadata: false,
            extract_links: false,
            screenshot: false,
        };
        let extracted = ContentExtractor::extract(html, "https://example.com", &flags);
        assert!(extracted.text.is_empty());
        assert!(extracted.links.is_empty());
    }

    #[test]
    fn extracts_everything_when_flags_enabled() {
        let html = r#"
            <html><head><title>T</title></head>
            <body><article><p>hello</p></article><a href="/l">L</a></body></html>
        "#;
        let flags = ExtractFlags {
            extract_text: true,
            extract_metadata: true,
            extract_links: true,
            screenshot: false,
        };
        let extracted = ContentExtractor::extract(html, "https://example.com", &flags);
        assert!(extracted.text.contains("hello"));
        assert_eq!(extracted.metadata.title.as_deref(), Some("T"));
        assert_eq!(extracted.links.len(), 1);
    }
}
