//! Defines the core data structures used in the email-auditor application.

use serde::{Deserialize, Serialize};

/// Where the subject line used for analysis came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SubjectLineSource {
    /// Supplied explicitly alongside the HTML (e.g., an email header field).
    FromApiHeader,
    /// Fell back to the document's `<title>` tag.
    FromTitleTag,
    /// Neither a header value nor a usable `<title>` was present.
    NotAvailable,
}

/// Sender and envelope details extracted from the submission and the HTML.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub(crate) struct EmailMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_email: Option<String>,
    /// Combined display form, `"Name" <email>` when both parts are known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_from_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_line: Option<String>,
    pub subject_line_source: SubjectLineSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_text: Option<String>,
}

impl Default for SubjectLineSource {
    fn default() -> Self {
        SubjectLineSource::NotAvailable
    }
}

/// A single non-blank line of body text, numbered for the analysis service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextLine {
    /// 1-based index, contiguous over non-blank lines only.
    pub number: usize,
    pub content: String,
}

/// The line-numbered plain-text rendition of the email body.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub(crate) struct ExtractedText {
    pub lines: Vec<TextLine>,
}

impl ExtractedText {
    /// Renders the `(Line N): content` block handed to the analysis service.
    pub(crate) fn numbered_block(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("(Line {}): {}", line.number, line.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Rough payload-size bucket derived from declared image dimensions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum EstimatedSize {
    Small,
    Medium,
    Large,
    Unknown,
}

/// Per-image audit record, one per `<img>` element in document order.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct ImageFinding {
    pub src: String,
    /// `None` means the attribute is absent; `Some("")` is an explicit
    /// decorative marker. The two are audited differently.
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub estimated_size: EstimatedSize,
    pub issues: Vec<String>,
}

/// Severity attached to accessibility and compatibility findings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Severity {
    Error,
    Warning,
}

/// The kind of accessibility problem detected.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AccessibilityKind {
    MissingAlt,
    EmptyAlt,
    GenericAlt,
    MissingLang,
    LowContrastRisk,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct AccessibilityFinding {
    pub kind: AccessibilityKind,
    /// What the finding refers to (an image src, alt text, or element name).
    pub subject: String,
    pub message: String,
    pub severity: Severity,
}

/// A static prediction that a CSS construct will misrender in a named client.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct CompatibilityFinding {
    pub client: String,
    pub issue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_property: Option<String>,
    /// Snippet of the CSS that triggered the rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Either `"<style> tag"` or `"<tagname> inline style"`.
    pub location: String,
    pub severity: Severity,
}

/// A unique outbound link collected from the document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkRecord {
    pub href: String,
    /// Anchor text, truncated to 50 characters; `"[no text]"` when empty.
    pub text: String,
}

/// One violated UTM or staging rule for a specific link.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct UtmFinding {
    pub link: String,
    pub message: String,
}

/// An add-to-calendar link detected in the document.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct CalendarLink {
    pub text: String,
    pub href: String,
}

/// Presence record for compliance links (unsubscribe, privacy policy).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub(crate) struct LinkPresence {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Outcome of probing a single link.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LinkStatus {
    Ok,
    Error,
    Redirect,
    Timeout,
    Skipped,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct LinkValidationResult {
    pub url: String,
    pub text: String,
    pub status: LinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Advisory entry for dark-mode image handling. Always manual-review.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct DarkModeCheck {
    pub images_potentially_missing_dark_mode_variant: Vec<String>,
    pub details: String,
}

impl Default for DarkModeCheck {
    fn default() -> Self {
        Self {
            images_potentially_missing_dark_mode_variant: Vec::new(),
            details: "Manual verification recommended for dark mode compatibility.".to_string(),
        }
    }
}

/// Aggregate of every deterministic finding produced by the pipeline.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct TechnicalChecks {
    pub utm_issues: Vec<UtmFinding>,
    pub staging_link_issues: Vec<UtmFinding>,
    pub unsubscribe_link: LinkPresence,
    pub privacy_policy_link: LinkPresence,
    pub dark_mode_image_check: DarkModeCheck,
    pub add_to_calendar_links: Vec<CalendarLink>,
    pub images: Vec<ImageFinding>,
    pub total_images: usize,
    /// Images whose alt attribute is absent entirely (empty alt not counted).
    pub images_without_alt: usize,
    pub accessibility_issues: Vec<AccessibilityFinding>,
    pub compatibility_issues: Vec<CompatibilityFinding>,
    pub subject_line_length: usize,
    pub preview_text_length: usize,
    pub link_validation: Vec<LinkValidationResult>,
    /// Count of the full unique link set, including links beyond the probe cap.
    pub total_links: usize,
    pub broken_links: usize,
    /// True iff at least one link was validated and none came back
    /// `error` or `timeout`. Redirects and skips do not count as broken.
    pub all_links_resolved: bool,
}

/// A typo or grammar issue reported by the analysis service.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct TextIssue {
    pub error: String,
    pub suggestion: String,
    pub line: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SignatureVerdict {
    Yes,
    No,
    NotApplicable,
    InsufficientData,
}

/// Whether the signature in the body matches the declared sender.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct SignatureMatch {
    #[serde(rename = "match")]
    pub verdict: SignatureVerdict,
    pub details: Option<String>,
}

/// The schema-validated qualitative critique returned by the analysis
/// service, or a degraded placeholder when the service is unavailable.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct QualitativeAnalysis {
    pub typos: Vec<TextIssue>,
    pub grammar_errors: Vec<TextIssue>,
    pub tone_analysis: String,
    pub suggestions: Vec<String>,
    /// Overall quality score, 0-100 inclusive.
    pub overall_score: u8,
    pub subject_line_analysis: Option<String>,
    pub preview_text_analysis: Option<String>,
    pub paragraph_spacing_analysis: String,
    pub signature_to_from_name_match: SignatureMatch,
}

impl QualitativeAnalysis {
    /// Placeholder returned when the text-analysis step fails entirely.
    /// The deterministic technical checks are still delivered alongside it.
    pub(crate) fn unavailable() -> Self {
        Self {
            typos: Vec::new(),
            grammar_errors: Vec::new(),
            tone_analysis: "Automated style analysis unavailable - check analysis API key configuration".to_string(),
            suggestions: vec!["Configure OPENAI_API_KEY in the environment or config file".to_string()],
            overall_score: 0,
            subject_line_analysis: None,
            preview_text_analysis: None,
            paragraph_spacing_analysis: "Automated style analysis unavailable".to_string(),
            signature_to_from_name_match: SignatureMatch {
                verdict: SignatureVerdict::InsufficientData,
                details: None,
            },
        }
    }
}

/// Top-level result of one analysis invocation. Built once, never mutated.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct AnalysisResult {
    pub technical_checks: TechnicalChecks,
    pub qualitative_analysis: QualitativeAnalysis,
    pub extracted: EmailMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Input to the review pipeline.
#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct ReviewRequest {
    pub email_html_content: String,
    pub sender_name: Option<String>,
    pub from_email: Option<String>,
    pub reply_to_email: Option<String>,
    pub subject_line_from_header: Option<String>,
}

/// Result of the HTML optimization action.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OptimizeResult {
    pub optimized_html: String,
    pub changes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
