//! HTML link extraction
//!
//! Resolves every `<a href>` against the page URL and keeps the links that
//! point into one of the site's allowed domains.

use scraper::{Html, Selector};
use url::Url;

/// Extracts allow-listed links from an HTML document
///
/// Links are returned in document order as normalized absolute URLs: the
/// fragment is removed and only `http`/`https` links survive. Duplicates are
/// kept; the frontier deduplicates on insert.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the document was fetched from
/// * `allowed_domains` - Domains (and their subdomains) that may be followed
///
/// # Example
///
/// ```
/// use aurora_crawl::crawler::extract_links;
///
/// let html = r#"<a href="/docs">Docs</a><a href="https://other.org/">Other</a>"#;
/// let links = extract_links(html, "https://example.com/", &["example.com".to_string()]);
/// assert_eq!(links, vec!["https://example.com/docs".to_string()]);
/// ```
pub fn extract_links(html: &str, base_url: &str, allowed_domains: &[String]) -> Vec<String> {
    let base = match Url::parse(base_url) {
        Ok(base) => base,
        Err(e) => {
            tracing::debug!("Cannot resolve links against {}: {}", base_url, e);
            return Vec::new();
        }
    };

    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, &base))
        .filter(|link| {
            link.host_str()
                .map(|host| is_allowed_domain(host, allowed_domains))
                .unwrap_or(false)
        })
        .map(String::from)
        .collect()
}

/// Resolves an href against the page URL
///
/// Returns None for empty or malformed hrefs and for non-HTTP schemes
/// (`mailto:`, `javascript:`, `tel:`, `data:`). The fragment is dropped.
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }

    resolved.set_fragment(None);
    Some(resolved)
}

/// Returns true if `host` ends with one of the allowed domains
///
/// A plain case-insensitive suffix test, so `example.com` also admits
/// `www.example.com` and `badexample.com`. Ports are never part of `host`.
pub fn is_allowed_domain(host: &str, allowed_domains: &[String]) -> bool {
    let host = host.to_ascii_lowercase();

    allowed_domains.iter().any(|domain| {
        let domain = domain.trim().to_ascii_lowercase();
        !domain.is_empty() && host.ends_with(domain.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(domains: &[&str]) -> Vec<String> {
        domains.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_resolves_relative_links() {
        let html = r#"<a href="/a">A</a><a href="b">B</a><a href="../c">C</a>"#;
        let links = extract_links(html, "https://example.com/docs/index.html", &allowed(&["example.com"]));

        assert_eq!(
            links,
            vec![
                "https://example.com/a",
                "https://example.com/docs/b",
                "https://example.com/c",
            ]
        );
    }

    #[test]
    fn test_filters_foreign_domains() {
        let html = r#"
            <a href="https://example.com/x">in</a>
            <a href="https://other.org/y">out</a>
            <a href="https://example.com.evil.net/w">prefix only</a>
            <a href="https://badexample.com/z">suffix</a>
        "#;
        let links = extract_links(html, "https://example.com/", &allowed(&["example.com"]));

        assert_eq!(
            links,
            vec!["https://example.com/x", "https://badexample.com/z"]
        );
    }

    #[test]
    fn test_subdomains_allowed() {
        let html = r#"<a href="https://docs.example.com/guide">guide</a>"#;
        let links = extract_links(html, "https://example.com/", &allowed(&["example.com"]));

        assert_eq!(links, vec!["https://docs.example.com/guide"]);
    }

    #[test]
    fn test_skips_missing_empty_and_non_http_hrefs() {
        let html = r#"
            <a>no href</a>
            <a href="">empty</a>
            <a href="mailto:someone@example.com">mail</a>
            <a href="javascript:void(0)">js</a>
            <a href="http://[::1">malformed</a>
            <a href="/ok">ok</a>
        "#;
        let links = extract_links(html, "https://example.com/", &allowed(&["example.com"]));

        assert_eq!(links, vec!["https://example.com/ok"]);
    }

    #[test]
    fn test_fragments_stripped_and_duplicates_kept() {
        let html = r##"<a href="/page#top">1</a><a href="/page">2</a><a href="#section">3</a>"##;
        let links = extract_links(html, "https://example.com/page", &allowed(&["example.com"]));

        assert_eq!(
            links,
            vec![
                "https://example.com/page",
                "https://example.com/page",
                "https://example.com/page",
            ]
        );
    }

    #[test]
    fn test_no_allowed_domains_yields_nothing() {
        let html = r#"<a href="/a">A</a>"#;
        assert!(extract_links(html, "https://example.com/", &[]).is_empty());
    }

    #[test]
    fn test_invalid_base_yields_nothing() {
        let html = r#"<a href="/a">A</a>"#;
        assert!(extract_links(html, "not a url", &allowed(&["example.com"])).is_empty());
    }

    #[test]
    fn test_is_allowed_domain() {
        let domains = allowed(&["Example.com"]);

        assert!(is_allowed_domain("example.com", &domains));
        assert!(is_allowed_domain("WWW.example.com", &domains));
        assert!(is_allowed_domain("a.b.example.com", &domains));
        assert!(is_allowed_domain("badexample.com", &domains));
        assert!(is_allowed_domain("example.com", &allowed(&["ample.com"])));
        assert!(!is_allowed_domain("example.com.evil.net", &domains));
        assert!(!is_allowed_domain("example.org", &domains));
        assert!(!is_allowed_domain("example.com", &allowed(&["", "  "])));
    }
}
