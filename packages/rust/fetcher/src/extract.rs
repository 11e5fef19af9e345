//! Main-content text extraction.
//!
//! Picks the first content container (`article`, `main`, `div#content`,
//! `body`), joins its visible text nodes, collapses whitespace, and caps the
//! result at [`MAX_TEXT_CHARS`] characters.

use scraper::{ElementRef, Html, Node, Selector};

use starbrief_shared::{Result, StarbriefError};

/// Upper bound on extracted text length, in characters.
pub const MAX_TEXT_CHARS: usize = 5_000;

/// Containers tried in priority order.
const CONTENT_SELECTORS: [&str; 4] = ["article", "main", "div#content", "body"];

/// Elements whose text never counts as page content.
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Extract the main readable text from an HTML document.
pub fn extract_text(html: &str) -> Result<String> {
    let doc = Html::parse_document(html);

    let container = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| doc.select(&sel).next())
        .unwrap_or_else(|| doc.root_element());

    let text = collapse_whitespace(&visible_text(container));
    if text.is_empty() {
        return Err(StarbriefError::parse("no text found in page"));
    }

    Ok(truncate_chars(&text, MAX_TEXT_CHARS))
}

/// Concatenate text nodes under `el`, skipping script-like elements.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in el.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            parts.push(text);
        }
    }
    parts.join(" ")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_article_over_body() {
        let html = r#"<html><body>
            <nav>Menu Home About</nav>
            <article><h1>Aries</h1><p>Today   brings
            energy.</p></article>
            <footer>Copyright</footer>
        </body></html>"#;
        assert_eq!(extract_text(html).unwrap(), "Aries Today brings energy.");
    }

    #[test]
    fn falls_back_to_content_div_then_body() {
        let html = r#"<html><body><div id="content"><p>Stay calm.</p></div><p>Ads</p></body></html>"#;
        assert_eq!(extract_text(html).unwrap(), "Stay calm.");

        let html = r#"<html><body><p>Just body text</p></body></html>"#;
        assert_eq!(extract_text(html).unwrap(), "Just body text");
    }

    #[test]
    fn skips_script_and_style() {
        let html = r#"<html><body><main>
            <script>var x = 1;</script><style>.a{}</style>
            <p>Visible</p>
        </main></body></html>"#;
        assert_eq!(extract_text(html).unwrap(), "Visible");
    }

    #[test]
    fn empty_page_is_an_error() {
        let html = "<html><body><main>   </main></body></html>";
        assert!(extract_text(html).is_err());
    }

    #[test]
    fn long_text_is_truncated_on_char_boundary() {
        let body = "é".repeat(MAX_TEXT_CHARS + 100);
        let html = format!("<html><body><main>{body}</main></body></html>");
        let text = extract_text(&html).unwrap();
        assert_eq!(text.chars().count(), MAX_TEXT_CHARS);
    }
}
