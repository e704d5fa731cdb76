//! Extracts subject, preview and sender metadata from a submission.

use crate::document::{HtmlDocument, element_text};
use crate::models::{EmailMetadata, ReviewRequest, SubjectLineSource};

/// Preview-text candidates, probed in order; the first matching element
/// wins and later candidates are ignored even if present.
const PREVIEW_SELECTORS: &[(&str, &str, &str)] = &[
    // (tag, attribute-substring or class marker, needle)
    ("div", "style", "display:none"),
    ("div", "style", "display: none"),
];

const PREVIEW_CLASSES: &[(&str, &str)] = &[("div", "preheader"), ("span", "preheader"), ("*", "preview-text")];

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolves the subject line and its provenance. An explicitly supplied
/// header value always wins over the document `<title>`.
fn resolve_subject(
    document: &HtmlDocument,
    header_subject: Option<&str>,
) -> (Option<String>, SubjectLineSource) {
    if let Some(subject) = non_empty(header_subject) {
        return (Some(subject), SubjectLineSource::FromApiHeader);
    }

    let title = document
        .find_by_tag("title")
        .first()
        .map(|el| element_text(el).trim().to_string())
        .filter(|t| !t.is_empty());

    match title {
        Some(title) => (Some(title), SubjectLineSource::FromTitleTag),
        None => (None, SubjectLineSource::NotAvailable),
    }
}

/// Finds the hidden preheader/preview text, if any.
fn resolve_preview_text(document: &HtmlDocument) -> Option<String> {
    let first_match = PREVIEW_SELECTORS
        .iter()
        .find_map(|(tag, attr, needle)| {
            document
                .find_by_attribute_substring(tag, attr, needle)
                .into_iter()
                .next()
        })
        .or_else(|| {
            PREVIEW_CLASSES.iter().find_map(|(tag, class)| {
                document.find_by_class(tag, class).into_iter().next()
            })
        })?;

    let text = element_text(&first_match).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

/// Builds the normalized metadata record from the submission fields and the
/// parsed document.
pub(crate) fn extract_metadata(document: &HtmlDocument, request: &ReviewRequest) -> EmailMetadata {
    let sender_name = non_empty(request.sender_name.as_deref());
    let from_email = non_empty(request.from_email.as_deref());
    let reply_to_email = non_empty(request.reply_to_email.as_deref());

    let full_from_address = match (&sender_name, &from_email) {
        (Some(name), Some(email)) => Some(format!("\"{}\" <{}>", name, email)),
        (None, Some(email)) => Some(email.clone()),
        (Some(name), None) => Some(name.clone()),
        (None, None) => None,
    };

    let (subject_line, subject_line_source) =
        resolve_subject(document, request.subject_line_from_header.as_deref());
    let preview_text = resolve_preview_text(document);

    tracing::debug!(
        "Extracted metadata: subject={:?} ({:?}), preview={}",
        subject_line,
        subject_line_source,
        preview_text.is_some()
    );

    EmailMetadata {
        sender_name,
        from_email,
        full_from_address,
        reply_to_email,
        subject_line,
        subject_line_source,
        preview_text,
    }
}
