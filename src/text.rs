//! Converts the email body into line-numbered plain text for the analysis
//! service. Line numbers are the only way the service can reference a
//! finding back to the source, so the collapsing rules here are load-bearing:
//! blank lines are dropped entirely (not collapsed to one) before numbering.

use crate::document::HtmlDocument;
use crate::models::{ExtractedText, TextLine};
use scraper::ElementRef;

/// Elements that terminate a visual line in rendered email clients.
const BLOCK_TAGS: &[&str] = &[
    "p", "li", "h1", "h2", "h3", "h4", "h5", "h6", "div", "tr", "table", "blockquote",
];

fn is_block_tag(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

/// Walks the subtree emitting text content, with a line break in place of
/// every `<br>` and after every block-level element.
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if name == "br" {
                out.push('\n');
            } else {
                collect_text(child_el, out);
                if is_block_tag(name) {
                    out.push('\n');
                }
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Extracts the body text as 1-based numbered lines.
///
/// Each raw line is trimmed; fully blank lines are dropped before numbering,
/// so consecutive break markers collapse to nothing and the surviving line
/// numbers are contiguous.
pub(crate) fn extract_numbered_text(document: &HtmlDocument) -> ExtractedText {
    let mut raw = String::new();
    collect_text(document.body(), &mut raw);

    let lines: Vec<TextLine> = raw
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, content)| TextLine {
            number: index + 1,
            content: content.to_string(),
        })
        .collect();

    tracing::debug!("Extracted {} non-blank text lines from body.", lines.len());
    ExtractedText { lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> ExtractedText {
        extract_numbered_text(&HtmlDocument::parse(html))
    }

    #[test]
    fn test_block_elements_break_lines() {
        let text = extract("<body><p>first</p><p>second</p></body>");
        assert_eq!(text.lines.len(), 2);
        assert_eq!(text.lines[0].content, "first");
        assert_eq!(text.lines[1].content, "second");
    }

    #[test]
    fn test_br_breaks_lines() {
        let text = extract("<body><p>one<br>two</p></body>");
        let contents: Vec<&str> = text.lines.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[test]
    fn test_blank_lines_dropped_and_numbering_contiguous() {
        // Nested block elements produce runs of break markers; the blank
        // lines they create must vanish entirely, not survive as gaps.
        let text = extract(
            "<body><div><p>alpha</p></div><div>   </div><table><tr><td>beta</td></tr></table></body>",
        );
        let numbers: Vec<usize> = text.lines.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(text.lines[0].content, "alpha");
        assert_eq!(text.lines[1].content, "beta");
    }

    #[test]
    fn test_lines_are_trimmed() {
        let text = extract("<body><p>   padded   </p></body>");
        assert_eq!(text.lines[0].content, "padded");
    }

    #[test]
    fn test_numbered_block_format() {
        let text = extract("<body><p>hello</p><p>world</p></body>");
        assert_eq!(text.numbered_block(), "(Line 1): hello\n(Line 2): world");
    }

    #[test]
    fn test_empty_body() {
        let text = extract("<body></body>");
        assert!(text.is_empty());
        assert_eq!(text.numbered_block(), "");
    }

    #[test]
    fn test_headings_and_list_items_break() {
        let text = extract("<body><h1>Title</h1><ul><li>a</li><li>b</li></ul></body>");
        let contents: Vec<&str> = text.lines.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(contents, vec!["Title", "a", "b"]);
    }
}
