//! Collects outbound links and audits them for UTM compliance, staging
//! leakage, calendar links and required compliance links.

use crate::document::{HtmlDocument, element_text};
use crate::models::{CalendarLink, LinkPresence, LinkRecord, UtmFinding};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Hostname/path shapes that indicate a non-production environment, plus
/// the ephemeral-deployment domain suffix previews are published under.
static STAGING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)staging\.",
        r"(?i)dev\.",
        r"(?i)test\.",
        r"(?i)/staging/",
        r"(?i)vercel\.app",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("staging pattern must compile"))
    .collect()
});

/// Anchor-text markers for the required unsubscribe link. Matched with a
/// case-sensitive contains; first matching anchor wins.
const UNSUBSCRIBE_MARKERS: &[&str] = &["unsubscribe", "manage preferences", "subscription settings"];

/// Anchor-text markers for the privacy-policy link.
const PRIVACY_MARKERS: &[&str] = &["privacy policy", "Privacy Policy"];

/// Output of the link audit.
#[derive(Debug, Default)]
pub(crate) struct LinkAudit {
    /// Unique qualifying links, first-seen document order.
    pub links: Vec<LinkRecord>,
    pub utm_issues: Vec<UtmFinding>,
    pub staging_link_issues: Vec<UtmFinding>,
    pub add_to_calendar_links: Vec<CalendarLink>,
    pub unsubscribe_link: LinkPresence,
    pub privacy_policy_link: LinkPresence,
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

fn first_query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Walks every `<a>` element, keeping only absolute http/https hrefs.
///
/// Each unique href is checked once: the three UTM rules are independent
/// (a single link can violate all three), the staging heuristic is
/// suppressed when any trusted production marker appears anywhere in the
/// href, and calendar links are collected separately. Unparseable URLs are
/// silently excluded from the UTM and staging checks.
pub(crate) fn audit_links(
    document: &HtmlDocument,
    required_utm_source: &str,
    trusted_domains: &[String],
) -> LinkAudit {
    let mut audit = LinkAudit::default();
    let mut seen_hrefs: HashSet<String> = HashSet::new();

    for anchor in document.find_by_tag("a") {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !(href.starts_with("http://") || href.starts_with("https://")) {
            continue;
        }
        if !seen_hrefs.insert(href.to_string()) {
            continue;
        }

        let link_text = truncate(element_text(&anchor).trim(), 50);
        audit.links.push(LinkRecord {
            href: href.to_string(),
            text: if link_text.is_empty() {
                "[no text]".to_string()
            } else {
                link_text.clone()
            },
        });

        let Ok(url) = Url::parse(href) else {
            tracing::debug!("Skipping UTM/staging checks for unparseable URL: {}", href);
            continue;
        };

        if first_query_param(&url, "utm_medium").as_deref() != Some("email") {
            audit.utm_issues.push(UtmFinding {
                link: href.to_string(),
                message: "Missing or incorrect 'utm_medium=email'.".to_string(),
            });
        }
        if first_query_param(&url, "utm_source").as_deref() != Some(required_utm_source) {
            audit.utm_issues.push(UtmFinding {
                link: href.to_string(),
                message: format!("Missing or incorrect 'utm_source={}'.", required_utm_source),
            });
        }
        if first_query_param(&url, "utm_campaign").is_none_or(|v| v.is_empty()) {
            audit.utm_issues.push(UtmFinding {
                link: href.to_string(),
                message: "Missing or empty 'utm_campaign' parameter.".to_string(),
            });
        }

        if STAGING_PATTERNS.iter().any(|p| p.is_match(href)) {
            // The staging shapes also match production documentation
            // subdomains; trusted markers anywhere in the href suppress.
            let trusted = trusted_domains.iter().any(|d| href.contains(d.as_str()));
            if !trusted {
                audit.staging_link_issues.push(UtmFinding {
                    link: href.to_string(),
                    message: "Link may contain a staging identifier.".to_string(),
                });
            }
        }

        if href.ends_with(".ics")
            || link_text.to_lowercase().contains("add to calendar")
            || href.contains("addevent.com")
        {
            audit.add_to_calendar_links.push(CalendarLink {
                text: link_text,
                href: href.to_string(),
            });
        }
    }

    audit.unsubscribe_link = find_first_marker_link(document, UNSUBSCRIBE_MARKERS);
    audit.privacy_policy_link = find_first_marker_link(document, PRIVACY_MARKERS);

    tracing::debug!(
        "Link audit: {} unique links, {} UTM issues, {} staging issues.",
        audit.links.len(),
        audit.utm_issues.len(),
        audit.staging_link_issues.len()
    );
    audit
}

/// First anchor (document order) whose visible text contains any marker.
/// Later matches are ignored.
fn find_first_marker_link(document: &HtmlDocument, markers: &[&str]) -> LinkPresence {
    match document.find_by_text_substrings("a", markers).first() {
        Some(anchor) => LinkPresence {
            found: true,
            text: Some(element_text(anchor).trim().to_string()),
            href: anchor.value().attr("href").map(str::to_string),
        },
        None => LinkPresence::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "northwind";
    const TRUSTED: &[&str] = &["northwind.com", "northwindlabs.io"];

    fn audit(html: &str) -> LinkAudit {
        let trusted: Vec<String> = TRUSTED.iter().map(|s| s.to_string()).collect();
        audit_links(&HtmlDocument::parse(html), SOURCE, &trusted)
    }

    fn compliant_href(base: &str) -> String {
        format!(
            "{}?utm_medium=email&utm_source=northwind&utm_campaign=spring",
            base
        )
    }

    #[test]
    fn test_non_http_links_excluded() {
        let result = audit(
            r#"<body><a href="mailto:x@y.com">mail</a><a href="tel:+123">call</a>
               <a href="https://northwind.com/a?utm_medium=email&utm_source=northwind&utm_campaign=c">ok</a></body>"#,
        );
        assert_eq!(result.links.len(), 1);
        assert!(result.links[0].href.starts_with("https://"));
    }

    #[test]
    fn test_links_unique_by_href_first_text_wins() {
        let html = format!(
            r#"<body><a href="{0}">First label</a><a href="{0}">Second label</a></body>"#,
            compliant_href("https://northwind.com/x")
        );
        let result = audit(&html);
        assert_eq!(result.links.len(), 1);
        assert_eq!(result.links[0].text, "First label");
    }

    #[test]
    fn test_fully_compliant_link_produces_no_utm_findings() {
        let html = format!(
            r#"<body><a href="{}">ok</a></body>"#,
            compliant_href("https://northwind.com/x")
        );
        assert!(audit(&html).utm_issues.is_empty());
    }

    #[test]
    fn test_each_utm_violation_is_independent() {
        // Flipping one parameter at a time yields exactly one finding each.
        let wrong_medium =
            "https://northwind.com/x?utm_medium=social&utm_source=northwind&utm_campaign=c";
        let wrong_source =
            "https://northwind.com/x?utm_medium=email&utm_source=other&utm_campaign=c";
        let no_campaign = "https://northwind.com/x?utm_medium=email&utm_source=northwind";

        for href in [wrong_medium, wrong_source, no_campaign] {
            let result = audit(&format!(r#"<body><a href="{}">x</a></body>"#, href));
            assert_eq!(result.utm_issues.len(), 1, "href: {}", href);
        }
    }

    #[test]
    fn test_bare_link_violates_all_three_utm_rules() {
        let result = audit(r#"<body><a href="https://northwind.com/x">x</a></body>"#);
        assert_eq!(result.utm_issues.len(), 3);
        assert!(result.utm_issues[1]
            .message
            .contains("utm_source=northwind"));
    }

    #[test]
    fn test_empty_campaign_is_a_violation() {
        let result = audit(
            r#"<body><a href="https://northwind.com/x?utm_medium=email&utm_source=northwind&utm_campaign=">x</a></body>"#,
        );
        assert_eq!(result.utm_issues.len(), 1);
        assert!(result.utm_issues[0].message.contains("utm_campaign"));
    }

    #[test]
    fn test_staging_link_flagged() {
        let result = audit(r#"<body><a href="https://staging.example.com/x">x</a></body>"#);
        assert_eq!(result.staging_link_issues.len(), 1);
        assert_eq!(
            result.staging_link_issues[0].message,
            "Link may contain a staging identifier."
        );
    }

    #[test]
    fn test_trusted_marker_suppresses_staging_finding() {
        let result = audit(
            r#"<body><a href="https://staging.example.com/x?ref=northwind.com">x</a></body>"#,
        );
        assert!(result.staging_link_issues.is_empty());
    }

    #[test]
    fn test_docs_subdomain_on_trusted_domain_not_flagged() {
        let result = audit(r#"<body><a href="https://dev.northwind.com/docs">docs</a></body>"#);
        assert!(result.staging_link_issues.is_empty());
    }

    #[test]
    fn test_ephemeral_deployment_domain_flagged() {
        let result = audit(r#"<body><a href="https://my-preview.vercel.app/page">x</a></body>"#);
        assert_eq!(result.staging_link_issues.len(), 1);
    }

    #[test]
    fn test_calendar_link_detection() {
        let result = audit(concat!(
            r#"<body><a href="https://northwind.com/event.ics">ics</a>"#,
            r#"<a href="https://northwind.com/e">Add to Calendar</a>"#,
            r#"<a href="https://www.addevent.com/e/abc">save the date</a></body>"#,
        ));
        assert_eq!(result.add_to_calendar_links.len(), 3);
    }

    #[test]
    fn test_unsubscribe_first_match_wins() {
        let result = audit(concat!(
            r#"<body><a href="https://northwind.com/prefs">manage preferences</a>"#,
            r#"<a href="https://northwind.com/unsub">unsubscribe</a></body>"#,
        ));
        assert!(result.unsubscribe_link.found);
        assert_eq!(
            result.unsubscribe_link.href.as_deref(),
            Some("https://northwind.com/prefs")
        );
    }

    #[test]
    fn test_privacy_policy_case_variants() {
        let lower = audit(r#"<body><a href="/p">our privacy policy</a></body>"#);
        assert!(lower.privacy_policy_link.found);
        let title = audit(r#"<body><a href="/p">Privacy Policy</a></body>"#);
        assert!(title.privacy_policy_link.found);
        let missing = audit(r#"<body><a href="/p">PRIVACY</a></body>"#);
        assert!(!missing.privacy_policy_link.found);
    }

    #[test]
    fn test_anchor_text_truncated_to_fifty_chars() {
        let long_text = "a".repeat(80);
        let html = format!(
            r#"<body><a href="{}">{}</a></body>"#,
            compliant_href("https://northwind.com/x"),
            long_text
        );
        let result = audit(&html);
        assert_eq!(result.links[0].text.chars().count(), 50);
    }

    #[test]
    fn test_empty_anchor_text_placeholder() {
        let html = format!(
            r#"<body><a href="{}"></a></body>"#,
            compliant_href("https://northwind.com/x")
        );
        assert_eq!(audit(&html).links[0].text, "[no text]");
    }
}
