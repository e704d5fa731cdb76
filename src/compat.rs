//! Scans CSS found in `<style>` blocks and inline `style` attributes
//! against a fixed table of constructs known to misrender in legacy email
//! clients.

use crate::document::{HtmlDocument, element_text};
use crate::models::{CompatibilityFinding, Severity};
use once_cell::sync::Lazy;
use regex::Regex;

/// One entry of the hazard table: a CSS construct, the clients that
/// mishandle it, and the issue description reported for each.
pub(crate) struct CssRule {
    pub pattern: Regex,
    pub clients: &'static [&'static str],
    pub issue: &'static str,
}

/// The rule table, evaluated in this fixed order. Kept as data so the
/// ruleset stays unit-testable independently of the traversal.
pub(crate) static EMAIL_CLIENT_CSS_RULES: Lazy<Vec<CssRule>> = Lazy::new(|| {
    let rule = |pattern: &str, clients: &'static [&'static str], issue: &'static str| CssRule {
        pattern: Regex::new(pattern).expect("css hazard pattern must compile"),
        clients,
        issue,
    };
    vec![
        rule(r"(?i)flex|flexbox", &["Outlook"], "Flexbox not supported"),
        rule(r"(?i)grid", &["Outlook", "Gmail"], "CSS Grid not fully supported"),
        rule(
            r"(?i)position:\s*absolute",
            &["Outlook"],
            "Absolute positioning unreliable",
        ),
        rule(
            r"(?i)position:\s*fixed",
            &["Outlook", "Gmail"],
            "Fixed positioning not supported",
        ),
        rule(
            r"(?i)background-image",
            &["Outlook"],
            "Background images need VML fallback",
        ),
        rule(
            r"(?i)max-width",
            &["Outlook"],
            "max-width may need MSO conditional",
        ),
        rule(
            r"(?i)border-radius",
            &["Outlook 2007-2019"],
            "Border radius not supported",
        ),
        rule(r"(?i)box-shadow", &["Outlook"], "Box shadow not supported"),
        rule(
            r"(?i)@media",
            &["Gmail App"],
            "Media queries stripped in Gmail App",
        ),
        rule(
            r"(?i)rgba?\(",
            &["Outlook 2007-2013"],
            "RGBA colors may not render",
        ),
    ]
});

const STYLE_TAG_LOCATION: &str = "<style> tag";

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// Scans every `<style>` block and every inline `style` attribute.
///
/// Findings from `<style>` blocks are deduplicated on (client, issue,
/// location); inline-style findings are emitted for every matching element
/// with no deduplication. The asymmetry is intentional: a style block
/// defines a rule once, while each inline occurrence is a distinct fix site.
pub(crate) fn audit_compatibility(document: &HtmlDocument) -> Vec<CompatibilityFinding> {
    let mut findings: Vec<CompatibilityFinding> = Vec::new();

    for style_el in document.find_by_tag("style") {
        let style_text = element_text(&style_el);
        for rule in EMAIL_CLIENT_CSS_RULES.iter() {
            let Some(matched) = rule.pattern.find(&style_text) else {
                continue;
            };
            // Use the first line containing the construct as context.
            let context_line = style_text
                .lines()
                .find(|line| rule.pattern.is_match(line))
                .map(|line| truncate(line.trim(), 80))
                .filter(|line| !line.is_empty())
                .unwrap_or_else(|| matched.as_str().to_string());

            for client in rule.clients {
                let duplicate = findings.iter().any(|f| {
                    f.client == *client && f.issue == rule.issue && f.location == STYLE_TAG_LOCATION
                });
                if duplicate {
                    continue;
                }
                findings.push(CompatibilityFinding {
                    client: client.to_string(),
                    issue: rule.issue.to_string(),
                    css_property: Some(matched.as_str().to_string()),
                    context: Some(context_line.clone()),
                    location: STYLE_TAG_LOCATION.to_string(),
                    severity: Severity::Warning,
                });
            }
        }
    }

    for element in document.find_by_attribute("style") {
        let inline_style = element.value().attr("style").unwrap_or("");
        let tag_name = element.value().name();
        for rule in EMAIL_CLIENT_CSS_RULES.iter() {
            let Some(matched) = rule.pattern.find(inline_style) else {
                continue;
            };
            let context = if inline_style.chars().count() > 60 {
                format!("{}...", truncate(inline_style, 60))
            } else {
                inline_style.to_string()
            };
            for client in rule.clients {
                findings.push(CompatibilityFinding {
                    client: client.to_string(),
                    issue: rule.issue.to_string(),
                    css_property: Some(matched.as_str().to_string()),
                    context: Some(context.clone()),
                    location: format!("<{}> inline style", tag_name),
                    severity: Severity::Warning,
                });
            }
        }
    }

    tracing::debug!("Compatibility audit produced {} findings.", findings.len());
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audit(html: &str) -> Vec<CompatibilityFinding> {
        audit_compatibility(&HtmlDocument::parse(html))
    }

    #[test]
    fn test_rule_table_order_and_coverage() {
        let rules = &*EMAIL_CLIENT_CSS_RULES;
        assert_eq!(rules.len(), 10);
        assert!(rules[0].pattern.is_match("display: flex"));
        assert!(rules[8].pattern.is_match("@media (max-width: 600px)"));
        assert!(rules[9].pattern.is_match("color: rgb(0,0,0)"));
        assert!(rules[9].pattern.is_match("color: rgba(0,0,0,0.5)"));
    }

    #[test]
    fn test_style_block_finding_with_context_line() {
        let findings = audit(
            "<head><style>\n.wrapper { color: black; }\n.row { display: flex; }\n</style></head><body></body>",
        );
        let flex = findings
            .iter()
            .find(|f| f.issue == "Flexbox not supported")
            .expect("flexbox finding");
        assert_eq!(flex.client, "Outlook");
        assert_eq!(flex.location, "<style> tag");
        assert_eq!(flex.context.as_deref(), Some(".row { display: flex; }"));
        assert_eq!(flex.severity, Severity::Warning);
    }

    #[test]
    fn test_style_block_findings_deduplicated() {
        // The same construct in two style blocks reports once per client.
        let findings = audit(
            "<head><style>.a { display: flex; }</style>\
             <style>.b { display: flex; }</style></head><body></body>",
        );
        let flex_count = findings
            .iter()
            .filter(|f| f.issue == "Flexbox not supported")
            .count();
        assert_eq!(flex_count, 1);
    }

    #[test]
    fn test_inline_findings_not_deduplicated() {
        let findings = audit(
            r#"<body><div style="display:flex">a</div><div style="display:flex">b</div></body>"#,
        );
        let flex_count = findings
            .iter()
            .filter(|f| f.issue == "Flexbox not supported")
            .count();
        assert_eq!(flex_count, 2);
        assert!(findings.iter().all(|f| f.location == "<div> inline style"));
    }

    #[test]
    fn test_one_rule_fans_out_to_multiple_clients() {
        let findings = audit(r#"<body><div style="position: fixed">x</div></body>"#);
        let clients: Vec<&str> = findings
            .iter()
            .filter(|f| f.issue == "Fixed positioning not supported")
            .map(|f| f.client.as_str())
            .collect();
        assert_eq!(clients, vec!["Outlook", "Gmail"]);
    }

    #[test]
    fn test_style_block_and_inline_locations_differ() {
        let findings = audit(
            r#"<head><style>.x { display: flex; }</style></head>
               <body><div style="position:fixed">x</div></body>"#,
        );
        assert!(findings
            .iter()
            .any(|f| f.client == "Outlook" && f.location == "<style> tag"));
        assert!(findings
            .iter()
            .any(|f| f.client == "Outlook" && f.location == "<div> inline style"));
        assert!(findings
            .iter()
            .any(|f| f.client == "Gmail" && f.location == "<div> inline style"));
    }

    #[test]
    fn test_long_inline_style_context_is_truncated_with_ellipsis() {
        let long_style = format!("display:flex; padding: 1px; {}", "margin-left: 2px; ".repeat(5));
        let findings = audit(&format!(r#"<body><div style="{}">x</div></body>"#, long_style));
        let context = findings[0].context.as_deref().unwrap();
        assert!(context.ends_with("..."));
        assert_eq!(context.chars().count(), 63);
    }

    #[test]
    fn test_malformed_css_produces_no_findings() {
        let findings = audit("<head><style>@#$%^ not css at all {{{</style></head><body></body>");
        assert!(findings.is_empty());
    }
}
