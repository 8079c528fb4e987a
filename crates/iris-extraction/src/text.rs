//! Boilerplate-stripped plain-text extraction from rendered HTML.

use scraper::{Html, Selector};

const BOILERPLATE_SELECTORS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "form",
    ".nav", ".navigation", ".sidebar", ".ads", ".advertisement", ".footer", ".header",
];

const ARTICLE_SELECTORS: &[&str] = &["article", "main", "[role='main']", ".article-body", ".post-content"];

/// Return the page's readable text, preferring a recognizable article
/// container and falling back to `body` with boilerplate elements removed.
pub fn extract_text(document: &Html) -> String {
    for selector_str in ARTICLE_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = collect_paragraphs(element);
                if !text.trim().is_empty() {
                    return text;
                }
            }
        }
    }

    let body_selector = Selector::parse("body").expect("static selector");
    match document.select(&body_selector).next() {
        Some(body) => collect_paragraphs(body),
        None => collect_paragraphs_from_root(document),
    }
}

fn collect_paragraphs(element: scraper::ElementRef) -> String {
    let boilerplate = compile_boilerplate();
    let block_selector = Selector::parse("p, h1, h2, h3, h4, h5, h6, li, blockquote, pre")
        .expect("static selector");

    let mut blocks = Vec::new();
    'outer: for node in element.select(&block_selector) {
        for ancestor in node.ancestors() {
            if let Some(el) = scraper::ElementRef::wrap(ancestor) {
                if boilerplate.iter().any(|s| s.matches(&el)) {
                    continue 'outer;
                }
            }
        }
        let text: String = node.text().collect::<Vec<_>>().join(" ");
        let collapsed = collapse_whitespace(&text);
        if !collapsed.is_empty() {
            blocks.push(collapsed);
        }
    }

    if blocks.is_empty() {
        collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
    } else {
        blocks.join("\n\n")
    }
}

fn collect_paragraphs_from_root(document: &Html) -> String {
    collapse_whitespace(&document.root_element().text().collect::<Vec<_>>().join(" "))
}

fn compile_boilerplate() -> Vec<Selector> {
    BOILERPLATE_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
