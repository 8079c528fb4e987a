//! Registrable-domain extraction used to key rate-limit buckets.
//!
//! A full public-suffix-list lookup is out of this crate's dependency
//! budget (see DESIGN.md); this uses a pragmatic last-two-labels
//! heuristic, which is wrong for multi-label public suffixes like
//! `co.uk` but correct for the overwhelming majority of hosts.

use url::Url;

pub fn registrable_domain(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    let host = url.host_str()?;

    if host.parse::<std::net::IpAddr>().is_ok() {
        return Some(host.to_string());
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return Some(host.to_string());
    }

    Some(labels[labels.len() - 2..].join("."))
}

pub fn origin(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    Some(url.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_subdomains_to_registrable_domain() {
        assert_eq!(
            registrable_domain("https://www.example.com/page"),
            Some("example.com".to_string())
        );
        assert_eq!(
            registrable_domain("https://a.b.c.example.com"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn bare_domain_is_unchanged() {
        assert_eq!(
            registrable_domain("https://example.com"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn origin_includes_scheme_and_port() {
        assert_eq!(
            origin("https://example.com:8443/path"),
            Some("https://example.com:8443".to_string())
        );
    }
}
