//! Metadata extraction, priority-chained per source as in §4.2:
//! OpenGraph, Twitter Cards, standard `<meta>`, `<title>`,
//! `<link rel="canonical">`, `<html lang>`.

use iris_types::model::Metadata;
use scraper::{Html, Selector};

pub fn extract_metadata(document: &Html) -> Metadata {
    Metadata {
        title: extract_title(document),
        description: extract_description(document),
        canonical_url: extract_canonical(document),
        language: extract_language(document),
        author: extract_author(document),
        published_time: extract_published_time(document),
        pdf_pages: None,
    }
}

fn first_attr(document: &Html, selectors: &[&str], attr: &str) -> Option<String> {
    for selector_str in selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                if let Some(value) = element.value().attr(attr) {
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
            }
        }
    }
    None
}

fn extract_title(document: &Html) -> Option<String> {
    first_attr(document, &["meta[property='og:title']"], "content")
        .or_else(|| first_attr(document, &["meta[name='twitter:title']"], "content"))
        .or_else(|| {
            let selector = Selector::parse("title").ok()?;
            let text: String = document.select(&selector).next()?.text().collect();
            let trimmed = text.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        })
}

fn extract_description(document: &Html) -> Option<String> {
    first_attr(document, &["meta[property='og:description']"], "content")
        .or_else(|| first_attr(document, &["meta[name='twitter:description']"], "content"))
        .or_else(|| first_attr(document, &["meta[name='description']"], "content"))
}

fn extract_canonical(document: &Html) -> Option<String> {
    first_attr(document, &["link[rel='canonical']"], "href")
}

fn extract_language(document: &Html) -> Option<String> {
    first_attr(document, &["html"], "lang")
}

fn extract_author(document: &Html) -> Option<String> {
    first_attr(
        document,
        &[
            "meta[name='author']",
            "meta[property='article:author']",
            "meta[name='twitter:creator']",
        ],
        "content",
    )
    .or_else(|| {
        let selector = Selector::parse("[itemprop='author']").ok()?;
        let text: String = document.select(&selector).next()?.text().collect();
        let trimmed = text.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

fn extract_published_time(document: &Html) -> Option<String> {
    first_attr(
        document,
        &[
            "meta[property='article:published_time']",
            "meta[property='og:published_time']",
        ],
        "content",
    )
    .or_else(|| first_attr(document, &["[itemprop='datePublished']"], "datetime"))
    .or_else(|| first_attr(document, &["time[datetime]"], "datetime"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn og_title_wins_over_title_tag() {
        let html = r#"
            <html><head>
                <title>Fallback Title</title>
                <meta property="og:title" content="OG Title">
            </head></html>
        "#;
        let doc = Html::parse_document(html);
        assert_eq!(extract_metadata(&doc).title.as_deref(), Some("OG Title"));
    }

    #[test]
    fn falls_back_to_title_tag_without_og() {
        let html = "<html><head><title>Plain Title</title></head></html>";
        let doc = Html::parse_document(html);
        assert_eq!(extract_metadata(&doc).title.as_deref(), Some("Plain Title"));
    }

    #[test]
    fn extracts_canonical_and_language() {
        let html = r#"
            <html lang="en-US"><head>
                <link rel="canonical" href="https://example.com/canon">
            </head></html>
        "#;
        let doc = Html::parse_document(html);
        let meta = extract_metadata(&doc);
        assert_eq!(meta.canonical_url.as_deref(), Some("https://example.com/canon"));
        assert_eq!(meta.language.as_deref(), Some("en-US"));
    }

    #[test]
    fn description_priority_chain() {
        let html = r#"
            <html><head>
                <meta name="description" content="plain">
                <meta name="twitter:description" content="twitter">
                <meta property="og:description" content="og">
            </head></html>
        "#;
        let doc = Html::parse_document(html);
        assert_eq!(extract_metadata(&doc).description.as_deref(), Some("og"));
    }
}
