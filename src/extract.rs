//! HTML text and link extraction.
//!
//! Both functions work on a page body already fetched by a
//! [`PageSession`](corpus_qa_core::browse::PageSession). Parsing is
//! synchronous; `scraper::Html` never crosses an `.await`.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Elements whose text is never visible.
const HIDDEN: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new line in rendered text.
const BLOCK: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Extract the visible text of the first selector (in preference order)
/// whose first match has any text. Returns an empty string when none do.
///
/// Invalid selectors are skipped.
pub fn extract_text(html: &str, selectors: &[String]) -> String {
    let document = Html::parse_document(html);

    for raw in selectors {
        let selector = match Selector::parse(raw) {
            Ok(s) => s,
            Err(_) => {
                tracing::warn!(selector = %raw, "ignoring invalid content selector");
                continue;
            }
        };

        if let Some(element) = document.select(&selector).next() {
            let text = visible_text(element);
            if !text.is_empty() {
                return text;
            }
        }
    }

    String::new()
}

/// Render an element's text roughly the way a browser's `innerText` does:
/// hidden elements dropped, block boundaries as newlines, runs of
/// whitespace collapsed, blank lines removed.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if HIDDEN.contains(&name) {
                    continue;
                }
                let block = BLOCK.contains(&name);
                if block {
                    out.push('\n');
                } else if matches!(name, "td" | "th") {
                    out.push(' ');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Collect anchor targets from `html` that fall under `prefix`.
///
/// Hrefs containing a fragment (`#`) are dropped. Relative hrefs are
/// resolved against `base_url`. Duplicates are removed, keeping first
/// occurrence order.
pub fn extract_links(html: &str, base_url: &str, prefix: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.contains('#') {
            continue;
        }

        let resolved = match &base {
            Some(base) => match base.join(href) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            },
            None => href.to_string(),
        };

        if resolved.starts_with(prefix) && seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors() -> Vec<String> {
        vec!["main".to_string(), "article".to_string(), "body".to_string()]
    }

    #[test]
    fn prefers_main_over_body() {
        let html = r#"<html><body><nav>Menu</nav><main><h1>VAT</h1><p>Rate is 23%.</p></main></body></html>"#;
        assert_eq!(extract_text(html, &selectors()), "VAT\nRate is 23%.");
    }

    #[test]
    fn falls_back_to_article_then_body() {
        let html = r#"<body><article>Article text</article></body>"#;
        assert_eq!(extract_text(html, &selectors()), "Article text");

        let html = r#"<body><div>Only   body
            text</div></body>"#;
        assert_eq!(extract_text(html, &selectors()), "Only body\ntext");
    }

    #[test]
    fn empty_main_falls_through() {
        let html = r#"<body><main>   </main><p>Fallback</p></body>"#;
        assert_eq!(extract_text(html, &selectors()), "Fallback");
    }

    #[test]
    fn scripts_and_styles_are_hidden() {
        let html = r#"<body><script>var x = 1;</script><style>p{}</style><p>Seen</p></body>"#;
        assert_eq!(extract_text(html, &selectors()), "Seen");
    }

    #[test]
    fn inline_elements_do_not_split_words() {
        let html = r#"<main><p><b>V</b>AT applies</p></main>"#;
        assert_eq!(extract_text(html, &selectors()), "VAT applies");
    }

    #[test]
    fn empty_document_yields_empty_text() {
        assert_eq!(extract_text("<html><body></body></html>", &selectors()), "");
    }

    #[test]
    fn invalid_selector_is_skipped() {
        let html = r#"<body><p>Text</p></body>"#;
        let sels = vec!["[[".to_string(), "body".to_string()];
        assert_eq!(extract_text(html, &sels), "Text");
    }

    #[test]
    fn links_are_scoped_deduplicated_and_fragment_free() {
        let html = r##"
            <a href="https://site.example/vat">VAT</a>
            <a href="/pit">PIT</a>
            <a href="https://site.example/vat">VAT again</a>
            <a href="#top">Top</a>
            <a href="https://site.example/cit#rates">CIT rates</a>
            <a href="https://other.example/x">Elsewhere</a>
            <a>No href</a>
        "##;
        let links = extract_links(html, "https://site.example/map/", "https://site.example/");
        assert_eq!(
            links,
            vec![
                "https://site.example/vat".to_string(),
                "https://site.example/pit".to_string(),
            ]
        );
    }
}
