//! Link extraction from rendered HTML.
//!
//! Unlike a crawler's link extractor, this one is not deduplicating: §4.2
//! requires document-order duplicates and the visible anchor text plus
//! `rel` attributes, since downstream consumers use both for ranking.

use iris_types::model::Link;
use scraper::{Html, Selector};
use url::Url;

pub fn extract_links(document: &Html, base_url: &str) -> Vec<Link> {
    let base = Url::parse(base_url).ok();
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let resolved = resolve(&base, href)?;
            if !is_http(&resolved) {
                return None;
            }

            let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            let rel = element
                .value()
                .attr("rel")
                .map(|r| r.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();

            Some(Link {
                href: resolved,
                text,
                rel,
            })
        })
        .collect()
}

fn resolve(base: &Option<Url>, href: &str) -> Option<String> {
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_links_against_base() {
        let html = r#"<html><body><a href="/about">About</a></body></html>"#;
        let doc = Html::parse_document(html);
        let links = extract_links(&doc, "https://example.com/page");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "https://example.com/about");
        assert_eq!(links[0].text, "About");
    }

    #[test]
    fn preserves_duplicates_in_document_order() {
        let html = r#"
            <html><body>
                <a href="https://a.com">First</a>
                <a href="https://a.com">Again</a>
            </body></html>
        "#;
        let doc = Html::parse_document(html);
        let links = extract_links(&doc, "https://example.com");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text, "First");
        assert_eq!(links[1].text, "Again");
    }

    #[test]
    fn captures_rel_attribute_tokens() {
        let html = r#"<html><body><a href="https://a.com" rel="nofollow noopener">Link</a></body></html>"#;
        let doc = Html::parse_document(html);
        let links = extract_links(&doc, "https://example.com");
        assert_eq!(links[0].rel, vec!["nofollow", "noopener"]);
    }

    #[test]
    fn drops_non_http_schemes() {
        let html = r#"
            <html><body>
                <a href="mailto:[email protected]">Mail</a>
                <a href="javascript:void(0)">JS</a>
                <a href="https://ok.com">OK</a>
            </body></html>
        "#;
        let doc = Html::parse_document(html);
        let links = extract_links(&doc, "https://example.com");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "https://ok.com/");
    }
}
