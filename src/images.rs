//! Audits `<img>` elements for alt-text quality, declared dimensions and
//! estimated payload size, and checks the document language attribute.

use crate::document::HtmlDocument;
use crate::models::{AccessibilityFinding, AccessibilityKind, EstimatedSize, ImageFinding, Severity};
use once_cell::sync::Lazy;
use regex::Regex;

/// Alt text carrying no real information for screen-reader users.
static GENERIC_ALT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^image$",
        r"(?i)^photo$",
        r"(?i)^picture$",
        r"(?i)^img$",
        r"(?i)^banner$",
        r"(?i)^logo$",
        r"^\s*$",
        r"(?i)^untitled$",
        r"(?i)^screenshot$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("generic alt pattern must compile"))
    .collect()
});

fn is_generic_alt(alt: &str) -> bool {
    GENERIC_ALT_PATTERNS.iter().any(|p| p.is_match(alt))
}

/// Parses the leading digits of a dimension attribute, tolerating values
/// like "600px" or "100%" the way lenient HTML attribute parsing does.
fn parse_dimension(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Output of the image audit: per-image records in document order plus the
/// accessibility findings they generated.
#[derive(Debug, Default)]
pub(crate) struct ImageAudit {
    pub images: Vec<ImageFinding>,
    pub accessibility_issues: Vec<AccessibilityFinding>,
}

/// Inspects every `<img>` element in document order. Each image yields
/// exactly one `ImageFinding`; there is no deduplication across images.
///
/// Also emits one document-level `missing_lang` warning when the root
/// `<html>` element lacks a `lang` attribute.
pub(crate) fn audit_images(document: &HtmlDocument) -> ImageAudit {
    let mut audit = ImageAudit::default();

    for img in document.find_by_tag("img") {
        let src = img.value().attr("src").unwrap_or("").to_string();
        let alt = img.value().attr("alt").map(str::to_string);
        let width = img.value().attr("width").and_then(parse_dimension);
        let height = img.value().attr("height").and_then(parse_dimension);

        let mut issues: Vec<String> = Vec::new();

        match alt.as_deref() {
            None => {
                issues.push("Missing alt attribute".to_string());
                audit.accessibility_issues.push(AccessibilityFinding {
                    kind: AccessibilityKind::MissingAlt,
                    subject: truncate(&src, 50),
                    message: "Image is missing alt attribute".to_string(),
                    severity: Severity::Error,
                });
            }
            Some("") => {
                // Acceptable for decorative images, but flagged for review.
                // Deliberately not added to the per-image issues list.
                audit.accessibility_issues.push(AccessibilityFinding {
                    kind: AccessibilityKind::EmptyAlt,
                    subject: truncate(&src, 50),
                    message: "Empty alt - OK if decorative, otherwise needs description"
                        .to_string(),
                    severity: Severity::Warning,
                });
            }
            Some(alt_text) if is_generic_alt(alt_text) => {
                issues.push("Generic/unhelpful alt text".to_string());
                audit.accessibility_issues.push(AccessibilityFinding {
                    kind: AccessibilityKind::GenericAlt,
                    subject: alt_text.to_string(),
                    message: format!("Alt text \"{}\" is too generic", alt_text),
                    severity: Severity::Warning,
                });
            }
            Some(_) => {}
        }

        let estimated_size = match (width, height) {
            (Some(w), Some(h)) => {
                let pixels = w as u64 * h as u64;
                if pixels > 250_000 {
                    issues.push("Large image - may slow load time".to_string());
                }
                if pixels < 10_000 {
                    EstimatedSize::Small
                } else if pixels < 100_000 {
                    EstimatedSize::Medium
                } else {
                    EstimatedSize::Large
                }
            }
            _ => EstimatedSize::Unknown,
        };

        if width.is_none() || height.is_none() {
            issues.push("Missing width/height - may cause layout shift".to_string());
        }

        audit.images.push(ImageFinding {
            src,
            alt,
            width,
            height,
            estimated_size,
            issues,
        });
    }

    let html_lang = document
        .find_by_tag("html")
        .first()
        .and_then(|el| el.value().attr("lang"))
        .map(str::to_string);
    if html_lang.is_none_or(|lang| lang.is_empty()) {
        audit.accessibility_issues.push(AccessibilityFinding {
            kind: AccessibilityKind::MissingLang,
            subject: "<html>".to_string(),
            message: "Missing lang attribute on <html> element".to_string(),
            severity: Severity::Warning,
        });
    }

    tracing::debug!(
        "Image audit: {} images, {} accessibility findings.",
        audit.images.len(),
        audit.accessibility_issues.len()
    );
    audit
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
