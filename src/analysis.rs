//! Client for the text-analysis service (an OpenAI-compatible
//! chat-completions endpoint) plus the prompt builders and response
//! parsing for the critique and rewrite calls.

use crate::error::{AppError, Result};
use crate::models::{EmailMetadata, QualitativeAnalysis};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Version marker for the embedded style guide, quoted in every prompt so
/// critique output can be traced back to the guide revision it used.
pub(crate) const STYLE_GUIDE_VERSION: &str = "house-style/3";

/// The prescriptive brand style guide the critique is graded against.
const STYLE_GUIDE: &str = r#"HOUSE STYLE GUIDE PRINCIPLES:

1. KEEP SENTENCES SHORT - Write short, declarative sentences. Every time you use a comma, consider a period instead. Remove filler words.

2. VARY SENTENCE LENGTH - Short sentences for impact, longer ones to build momentum. Mix phrasing to avoid sounding robotic.

3. WRITE LIKE YOU SPEAK - No corporate jargon or marketing fluff. Use simple words (facilitate -> help, utilize -> use, commence -> start).

4. BE SPECIFIC AND BENEFIT-DRIVEN - Back statements with facts or data. Use "best", "bigger", "faster" only with context (e.g., "6x faster imports"). Lead with the benefit, not the feature.

5. BE CONFIDENT BUT CLIPPED - Drop "I think", "maybe", "could". Bold but humble. Professional and matter-of-fact.

6. HIGHLIGHT CUSTOMERS - Use customer quotes to show value instead of telling. Let customers do the talking.

7. SAY "YOU" MORE THAN "WE" - Make it about the reader. Less "we did", more "you can".

8. USE ACTIVE VOICE - Avoid passive constructions with "has", "was", "by", or words ending in "-ed". Test: if adding "...by monkeys" makes sense, the sentence is passive.

9. USE POSITIVE PHRASING - Say what something IS rather than what it ISN'T.

10. NEVER USE EXCLAMATION POINTS - Not in company messaging. Ever. Let substance create impact, not punctuation.

11. MAKE IT SCANNABLE - Bullet points, short paragraphs, clear hierarchy, one idea per paragraph. Lead with the most important information.

12. ACTION-ORIENTED LANGUAGE - Start with strong verbs: Build, Ship, Scale, Protect, Monitor. Make the reader the hero doing the action.

13. TECHNICAL PRECISION WITHOUT JARGON - Use technical terms when they are the clearest option; define complex concepts immediately. No buzzwords.

14. STRIP QUALIFIERS AND HEDGING - Remove "basically", "essentially", "probably", "might", "should". State facts directly.

15. COLON CLARITY - Connect concepts with colons: "Thing: What it does"."#;

/// A direct-text node extracted for the rewrite action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextFragment {
    /// Stable identifier handed to the service ("node_0", "node_1", ...).
    pub id: String,
    pub original: String,
}

/// The structured rewrite map returned by the optimize call.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct RewritePlan {
    #[serde(default)]
    pub rewrites: HashMap<String, String>,
    #[serde(default)]
    pub changes: Vec<String>,
}

#[derive(Serialize, Debug)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionMessage {
    content: Option<String>,
}

/// Thin chat-completions client. Credentials are an explicit constructor
/// input; a missing key fails fast on the first call instead of surfacing
/// as an opaque HTTP 401.
#[derive(Debug, Clone)]
pub(crate) struct AnalysisClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl AnalysisClient {
    pub(crate) fn new(
        http: Client,
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }

    /// Sends one prompt to the given model and returns the raw completion
    /// text.
    pub(crate) async fn generate_text(&self, model: &str, prompt: &str) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AppError::MissingApiKey);
        };

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: 0.2,
        };

        tracing::debug!(target: "analysis_task", "Requesting completion from model {}", model);
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(AppError::Analysis(format!(
                "model {} returned HTTP {}: {}",
                model, status, snippet
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Analysis(format!("invalid completion payload: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Analysis("completion contained no choices".to_string()))
    }

    /// Runs the critique prompt and parses the schema-validated result.
    pub(crate) async fn generate_critique(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<QualitativeAnalysis> {
        let content = self.generate_text(model, prompt).await?;
        parse_critique_content(&content)
    }
}

/// Parses (and validates) a critique completion. The content may arrive
/// wrapped in a markdown code fence; the fence is stripped first.
pub(crate) fn parse_critique_content(content: &str) -> Result<QualitativeAnalysis> {
    let cleaned = strip_code_fence(content);
    let analysis: QualitativeAnalysis = serde_json::from_str(cleaned)
        .map_err(|e| AppError::Analysis(format!("critique did not match schema: {}", e)))?;
    if analysis.overall_score > 100 {
        return Err(AppError::Analysis(format!(
            "critique score {} is out of range",
            analysis.overall_score
        )));
    }
    Ok(analysis)
}

/// Parses a rewrite completion into the node-id -> rewritten-text map.
pub(crate) fn parse_rewrite_plan(content: &str) -> Result<RewritePlan> {
    serde_json::from_str(strip_code_fence(content))
        .map_err(|e| AppError::Analysis(format!("rewrite plan did not parse: {}", e)))
}

/// Strips a surrounding markdown code fence (```json ... ``` or a bare
/// ``` ... ```), returning the inner text.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// Builds the critique prompt: style guide, extracted metadata and the
/// line-numbered body text, with an explicit JSON output contract.
pub(crate) fn build_critique_prompt(
    metadata: &EmailMetadata,
    subject_line_length: usize,
    preview_text_length: usize,
    numbered_text: &str,
) -> String {
    let subject = metadata.subject_line.as_deref().unwrap_or("Not Provided");
    let preview = metadata.preview_text.as_deref().unwrap_or("Not Provided");
    let from = metadata
        .full_from_address
        .as_deref()
        .unwrap_or("Sender Not Provided");
    let reply_to = metadata.reply_to_email.as_deref().unwrap_or("Not Provided");

    format!(
        r#"You are an Email Quality Assurance agent for the marketing team. Analyze the following email content with extreme attention to detail using the official style guide ({version}).

{style_guide}

---

The provided email body text has line numbers like "(Line X): text". When reporting typos or grammar errors, you MUST reference these line numbers and provide suggested corrections.

Be careful NOT to flag:
- Code snippets or technical terms (like API names, CLI commands)
- List markers or structural HTML elements
- Intentional stylistic choices that align with the guidelines

---

Email Content for Analysis:
Subject: {subject} ({subject_len} characters)
Preview Text: {preview} ({preview_len} characters)
From: {from}
Reply-To: {reply_to}

Email Body Text (with line numbers):
---
{body}
---

Perform these checks using the style guide above:

1. Typos & Spelling: find all typos with line number and suggested correction.
2. Grammar Errors: find all grammatical issues with line number and correction. Pay special attention to passive voice, wordy constructions, hedging qualifiers (basically, essentially, probably, might), and exclamation points (flag ALL of them).
3. Tone Analysis: evaluate against ALL 15 style principles. Be specific about sentence length, active voice, second-person usage, specificity, positive phrasing, scannability, action verbs and stripped qualifiers.
4. Suggestions: actionable improvements, each formatted as "Original phrase" -> "Improved phrase", with line numbers where applicable.
5. Overall Score (0-100): grammar/spelling 15, active voice & second person 15, clarity & conciseness 15, action-oriented language 15, no exclamation points 10 (any exclamation point scores 0 here), scannability & structure 15, specific & benefit-driven content 15.
6. Subject Line Analysis: clear, concise, action-oriented, benefit-driven? Ideal 30-50 chars (current: {subject_len}). Check for exclamation points.
7. Preview Text Analysis: complements the subject, adds value, creates curiosity? Ideal 40-90 chars (current: {preview_len}).
8. Paragraph Spacing: short paragraphs, one idea each, clear hierarchy?
9. Signature Match: does the signature in the body match "{from}"?

Respond with ONLY a valid JSON object (no markdown fence) of this exact shape:
{{
  "typos": [{{"error": "...", "suggestion": "...", "line": 1}}],
  "grammar_errors": [{{"error": "...", "suggestion": "...", "line": 1}}],
  "tone_analysis": "...",
  "suggestions": ["..."],
  "overall_score": 0,
  "subject_line_analysis": "..." or null,
  "preview_text_analysis": "..." or null,
  "paragraph_spacing_analysis": "...",
  "signature_to_from_name_match": {{"match": "yes" | "no" | "not_applicable" | "insufficient_data", "details": "..." or null}}
}}

"overall_score" must be an integer between 0 and 100."#,
        version = STYLE_GUIDE_VERSION,
        style_guide = STYLE_GUIDE,
        subject = subject,
        subject_len = subject_line_length,
        preview = preview,
        preview_len = preview_text_length,
        from = from,
        reply_to = reply_to,
        body = numbered_text,
    )
}

/// Builds the batch rewrite prompt for the optimize action.
pub(crate) fn build_rewrite_prompt(fragments: &[TextFragment]) -> String {
    let numbered_content = fragments
        .iter()
        .map(|f| format!("[{}]: {}", f.id, f.original))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a copy editor applying the house style guide ({version}) to email content.

{style_guide}

Below is the email text content with node identifiers. Rewrite EACH piece of text to follow the style guide while preserving the meaning.

RULES:
- Keep text approximately the same length (don't expand significantly)
- Preserve any product names, company names, URLs, or technical terms exactly
- Remove all exclamation points
- Convert passive voice to active voice
- Make language more direct and action-oriented
- Use "you" more than "we"
- Strip qualifiers (basically, essentially, probably)
- Keep the same general structure

INPUT TEXT:
{content}

OUTPUT FORMAT:
Return a JSON object with two fields:
1. "rewrites": an object mapping each node identifier to its rewritten text
   Example: {{ "node_0": "Rewritten text here", "node_1": "Another rewritten text" }}
2. "changes": an array of strings describing the key changes made
   Example: ["Converted passive voice to active in node_0", "Removed exclamation point in node_3"]

Only include nodes that were actually changed. If text is already good, don't include it.
Respond with ONLY valid JSON, no markdown."#,
        version = STYLE_GUIDE_VERSION,
        style_guide = STYLE_GUIDE,
        content = numbered_content,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SignatureVerdict, SubjectLineSource};

    const VALID_CRITIQUE: &str = r#"{
        "typos": [{"error": "teh", "suggestion": "the", "line": 3}],
        "grammar_errors": [],
        "tone_analysis": "Clear and direct.",
        "suggestions": ["\"We built\" -> \"You get\""],
        "overall_score": 84,
        "subject_line_analysis": "Concise.",
        "preview_text_analysis": null,
        "paragraph_spacing_analysis": "Short paragraphs throughout.",
        "signature_to_from_name_match": {"match": "yes", "details": null}
    }"#;

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```json\n{}\n```  "), "{}");
    }

    #[test]
    fn test_parse_critique_valid() {
        let critique = parse_critique_content(VALID_CRITIQUE).unwrap();
        assert_eq!(critique.overall_score, 84);
        assert_eq!(critique.typos.len(), 1);
        assert_eq!(critique.typos[0].line, 3);
        assert_eq!(
            critique.signature_to_from_name_match.verdict,
            SignatureVerdict::Yes
        );
    }

    #[test]
    fn test_parse_critique_accepts_fenced_payload() {
        let fenced = format!("```json\n{}\n```", VALID_CRITIQUE);
        assert!(parse_critique_content(&fenced).is_ok());
    }

    #[test]
    fn test_parse_critique_rejects_out_of_range_score() {
        let bad = VALID_CRITIQUE.replace("\"overall_score\": 84", "\"overall_score\": 140");
        assert!(parse_critique_content(&bad).is_err());
    }

    #[test]
    fn test_parse_critique_rejects_missing_fields() {
        assert!(parse_critique_content(r#"{"typos": []}"#).is_err());
        assert!(parse_critique_content("not json at all").is_err());
    }

    #[test]
    fn test_parse_rewrite_plan() {
        let plan = parse_rewrite_plan(
            r#"```json
            {"rewrites": {"node_0": "Ship faster."}, "changes": ["Removed exclamation point in node_0"]}
            ```"#,
        )
        .unwrap();
        assert_eq!(plan.rewrites.get("node_0").unwrap(), "Ship faster.");
        assert_eq!(plan.changes.len(), 1);
    }

    #[test]
    fn test_parse_rewrite_plan_tolerates_missing_fields() {
        let plan = parse_rewrite_plan(r#"{"rewrites": {}}"#).unwrap();
        assert!(plan.rewrites.is_empty());
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn test_parse_rewrite_plan_malformed_is_error() {
        assert!(parse_rewrite_plan("Sure! Here are the rewrites:").is_err());
    }

    #[test]
    fn test_critique_prompt_includes_metadata_and_body() {
        let metadata = EmailMetadata {
            subject_line: Some("Ship your next launch".to_string()),
            subject_line_source: SubjectLineSource::FromTitleTag,
            preview_text: Some("A faster path to production".to_string()),
            full_from_address: Some("\"Jane\" <jane@northwind.com>".to_string()),
            reply_to_email: Some("jane@northwind.com".to_string()),
            ..EmailMetadata::default()
        };
        let prompt = build_critique_prompt(&metadata, 21, 27, "(Line 1): Hello");
        assert!(prompt.contains("Subject: Ship your next launch (21 characters)"));
        assert!(prompt.contains("Reply-To: jane@northwind.com"));
        assert!(prompt.contains("(Line 1): Hello"));
        assert!(prompt.contains(STYLE_GUIDE_VERSION));
        assert!(prompt.contains("\"overall_score\""));
    }

    #[test]
    fn test_rewrite_prompt_lists_fragments() {
        let fragments = vec![
            TextFragment {
                id: "node_0".to_string(),
                original: "We are excited to announce!".to_string(),
            },
            TextFragment {
                id: "node_1".to_string(),
                original: "Basically a better workflow.".to_string(),
            },
        ];
        let prompt = build_rewrite_prompt(&fragments);
        assert!(prompt.contains("[node_0]: We are excited to announce!"));
        assert!(prompt.contains("[node_1]: Basically a better workflow."));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_fast() {
        let client = AnalysisClient::new(
            Client::new(),
            "https://api.openai.com/v1",
            None,
            Duration::from_secs(5),
        );
        let err = client.generate_text("gpt-4o", "hello").await.unwrap_err();
        assert!(matches!(err, AppError::MissingApiKey));
    }
}
