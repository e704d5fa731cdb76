//! Core orchestration for reviewing and optimizing email HTML.

use crate::analysis::{
    AnalysisClient, TextFragment, build_critique_prompt, build_rewrite_prompt, parse_rewrite_plan,
    RewritePlan,
};
use crate::compat::audit_compatibility;
use crate::config::Config;
use crate::document::HtmlDocument;
use crate::error::{AppError, Result};
use crate::images::{ImageAudit, audit_images};
use crate::links::{LinkAudit, audit_links};
use crate::metadata::extract_metadata;
use crate::models::{
    AnalysisResult, CompatibilityFinding, DarkModeCheck, EmailMetadata, ExtractedText,
    LinkValidationResult, OptimizeResult, QualitativeAnalysis, ReviewRequest, SignatureMatch,
    SignatureVerdict, TechnicalChecks,
};
use crate::text::extract_numbered_text;
use crate::validator::{all_links_resolved, broken_link_count, validate_links};
use reqwest::Client;
use std::sync::Arc;

/// Tags whose direct text is considered for the rewrite action.
const TEXT_BEARING_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "span", "a", "div", "button",
    "strong", "em", "b", "i",
];

/// Everything derived synchronously from the parsed document. The document
/// itself never leaves `run_static_checks`, so nothing non-Send crosses an
/// await point.
pub(crate) struct StaticChecks {
    pub text: ExtractedText,
    pub metadata: EmailMetadata,
    pub image_audit: ImageAudit,
    pub compatibility: Vec<CompatibilityFinding>,
    pub link_audit: LinkAudit,
}

/// Parses the HTML once and runs every deterministic extractor against it.
pub(crate) fn run_static_checks(config: &Config, request: &ReviewRequest) -> StaticChecks {
    let document = HtmlDocument::parse(&request.email_html_content);

    StaticChecks {
        text: extract_numbered_text(&document),
        metadata: extract_metadata(&document, request),
        image_audit: audit_images(&document),
        compatibility: audit_compatibility(&document),
        link_audit: audit_links(
            &document,
            &config.required_utm_source,
            &config.trusted_domains,
        ),
    }
}

/// Merges all deterministic findings plus the link-validation results into
/// the `TechnicalChecks` aggregate.
pub(crate) fn assemble_technical_checks(
    metadata: &EmailMetadata,
    image_audit: ImageAudit,
    compatibility: Vec<CompatibilityFinding>,
    link_audit: LinkAudit,
    link_validation: Vec<LinkValidationResult>,
) -> TechnicalChecks {
    let broken_links = broken_link_count(&link_validation);
    let resolved = all_links_resolved(&link_validation);
    let images_without_alt = image_audit
        .images
        .iter()
        .filter(|img| img.alt.is_none())
        .count();

    TechnicalChecks {
        utm_issues: link_audit.utm_issues,
        staging_link_issues: link_audit.staging_link_issues,
        unsubscribe_link: link_audit.unsubscribe_link,
        privacy_policy_link: link_audit.privacy_policy_link,
        dark_mode_image_check: DarkModeCheck::default(),
        add_to_calendar_links: link_audit.add_to_calendar_links,
        total_images: image_audit.images.len(),
        images_without_alt,
        images: image_audit.images,
        accessibility_issues: image_audit.accessibility_issues,
        compatibility_issues: compatibility,
        subject_line_length: metadata
            .subject_line
            .as_deref()
            .map(|s| s.chars().count())
            .unwrap_or(0),
        preview_text_length: metadata
            .preview_text
            .as_deref()
            .map(|s| s.chars().count())
            .unwrap_or(0),
        link_validation,
        total_links: link_audit.links.len(),
        broken_links,
        all_links_resolved: resolved,
    }
}

/// Domain rule: the designated no-reply address carries no personal
/// signature, so the signature-match verdict is forced to not-applicable
/// regardless of what the analysis service said.
fn apply_no_reply_override(
    no_reply_address: &str,
    metadata: &EmailMetadata,
    analysis: &mut QualitativeAnalysis,
) {
    if metadata.reply_to_email.as_deref() == Some(no_reply_address) {
        analysis.signature_to_from_name_match = SignatureMatch {
            verdict: SignatureVerdict::NotApplicable,
            details: Some("Signature check bypassed for no-reply address.".to_string()),
        };
    }
}

/// Direct-text nodes (excluding nested-element text) from the fixed set of
/// text-bearing tags, in document order.
pub(crate) fn extract_text_fragments(html: &str) -> Vec<TextFragment> {
    let document = HtmlDocument::parse(html);
    let mut fragments = Vec::new();

    for element in document.find_by_tags(TEXT_BEARING_TAGS) {
        let mut direct_text = String::new();
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                direct_text.push_str(text);
            }
        }
        let direct_text = direct_text.trim();
        if direct_text.chars().count() > 3 {
            fragments.push(TextFragment {
                id: format!("node_{}", fragments.len()),
                original: direct_text.to_string(),
            });
        }
    }
    fragments
}

/// Replaces each rewritten fragment in the raw HTML by literal text match.
///
/// This is a best-effort substitution, not a DOM-aware replacement: every
/// occurrence of a duplicated fragment is replaced identically. That is an
/// accepted limitation of the rewrite action.
fn apply_rewrites(
    original_html: &str,
    fragments: &[TextFragment],
    plan: RewritePlan,
) -> OptimizeResult {
    let mut optimized = original_html.to_string();
    for fragment in fragments {
        if let Some(rewrite) = plan.rewrites.get(&fragment.id) {
            if rewrite != &fragment.original {
                optimized = optimized.replace(&fragment.original, rewrite);
            }
        }
    }
    OptimizeResult {
        optimized_html: optimized,
        changes: plan.changes,
        error: None,
    }
}

/// Orchestrates the full analysis pipeline with shared HTTP clients.
#[derive(Debug, Clone)]
pub(crate) struct EmailAuditor {
    config: Arc<Config>,
    probe_client: Client,
    analysis: AnalysisClient,
}

impl EmailAuditor {
    /// Creates a new auditor with a redirect-disabled probe client and the
    /// text-analysis client, both shared across invocations.
    pub(crate) fn new(config: Arc<Config>) -> Result<Self> {
        let probe_client = Client::builder()
            .user_agent(&config.probe_user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let analysis_http = Client::builder().build()?;
        let analysis = AnalysisClient::new(
            analysis_http,
            &config.api_base_url,
            config.api_key.clone(),
            config.analysis_timeout,
        );

        Ok(Self {
            config,
            probe_client,
            analysis,
        })
    }

    /// Runs the full review: deterministic checks, concurrent link
    /// validation, then the qualitative critique with tiered fallback.
    ///
    /// Text-analysis failures never discard the deterministic findings: the
    /// result degrades to a placeholder critique plus a top-level error.
    pub(crate) async fn review(&self, request: ReviewRequest) -> Result<AnalysisResult> {
        if request.email_html_content.trim().is_empty() {
            return Err(AppError::MissingInput(
                "Email HTML content is required.".to_string(),
            ));
        }

        tracing::info!(target: "review_task", "Starting email review.");
        let checks = run_static_checks(&self.config, &request);
        let StaticChecks {
            text,
            metadata,
            image_audit,
            compatibility,
            link_audit,
        } = checks;

        let link_validation = validate_links(
            &self.probe_client,
            &link_audit.links,
            self.config.max_probed_links,
            self.config.probe_timeout,
        )
        .await;

        let technical_checks = assemble_technical_checks(
            &metadata,
            image_audit,
            compatibility,
            link_audit,
            link_validation,
        );

        let prompt = build_critique_prompt(
            &metadata,
            technical_checks.subject_line_length,
            technical_checks.preview_text_length,
            &text.numbered_block(),
        );

        match self.run_critique_with_fallback(&prompt).await {
            Ok(mut qualitative) => {
                apply_no_reply_override(&self.config.no_reply_address, &metadata, &mut qualitative);
                Ok(AnalysisResult {
                    technical_checks,
                    qualitative_analysis: qualitative,
                    extracted: metadata,
                    error: None,
                })
            }
            Err(e) => {
                tracing::warn!(target: "review_task", "Text analysis unavailable: {}", e);
                Ok(AnalysisResult {
                    technical_checks,
                    qualitative_analysis: QualitativeAnalysis::unavailable(),
                    extracted: metadata,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Tries each configured model tier in order until one returns a valid
    /// critique. A missing API key is terminal; no tier can succeed.
    async fn run_critique_with_fallback(&self, prompt: &str) -> Result<QualitativeAnalysis> {
        let mut last_error = AppError::Analysis("no analysis model configured".to_string());

        for model in &self.config.analysis_models {
            match self.analysis.generate_critique(model, prompt).await {
                Ok(result) => {
                    tracing::info!(target: "review_task", "Critique completed using model {}", model);
                    return Ok(result);
                }
                Err(AppError::MissingApiKey) => return Err(AppError::MissingApiKey),
                Err(e) => {
                    tracing::warn!(
                        target: "review_task",
                        "Model {} failed: {}. Trying next tier.", model, e
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Rewrites the email copy against the style guide and splices the
    /// rewritten fragments back into the raw HTML.
    pub(crate) async fn optimize(&self, email_html: &str) -> OptimizeResult {
        if email_html.trim().is_empty() {
            return OptimizeResult {
                optimized_html: String::new(),
                changes: Vec::new(),
                error: Some("Email HTML content is required.".to_string()),
            };
        }
        if self.config.api_key.is_none() {
            return OptimizeResult {
                optimized_html: String::new(),
                changes: Vec::new(),
                error: Some(AppError::MissingApiKey.to_string()),
            };
        }

        let fragments = extract_text_fragments(email_html);
        if fragments.is_empty() {
            tracing::debug!(target: "optimize_task", "No rewritable text fragments found.");
            return OptimizeResult {
                optimized_html: email_html.to_string(),
                changes: Vec::new(),
                error: None,
            };
        }

        let prompt = build_rewrite_prompt(&fragments);
        let mut last_error: Option<AppError> = None;

        for model in &self.config.analysis_models {
            match self.analysis.generate_text(model, &prompt).await {
                Ok(content) => {
                    return match parse_rewrite_plan(&content) {
                        Ok(plan) => {
                            tracing::info!(
                                target: "optimize_task",
                                "Applying {} rewrites from model {}.",
                                plan.rewrites.len(),
                                model
                            );
                            apply_rewrites(email_html, &fragments, plan)
                        }
                        Err(e) => {
                            tracing::error!(target: "optimize_task", "Unparseable rewrite plan: {}", e);
                            OptimizeResult {
                                optimized_html: email_html.to_string(),
                                changes: Vec::new(),
                                error: Some("Failed to parse optimization response".to_string()),
                            }
                        }
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        target: "optimize_task",
                        "Model {} failed: {}. Trying next tier.", model, e
                    );
                    last_error = Some(e);
                }
            }
        }

        OptimizeResult {
            optimized_html: email_html.to_string(),
            changes: Vec::new(),
            error: Some(
                last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Optimization failed".to_string()),
            ),
        }
    }
}
