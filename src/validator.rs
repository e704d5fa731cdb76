//! Probes collected links over the network, concurrently and with
//! per-request timeouts. One link's failure never affects another's result.

use crate::models::{LinkRecord, LinkStatus, LinkValidationResult};
use reqwest::Client;
use std::time::Duration;

/// Probes at most the first `max_links` entries of the unique link list.
///
/// All probes run concurrently and the batch waits for every probe to
/// settle; results come back in input order, not completion order. Links
/// beyond the cap are never probed (the caller still reports the full link
/// count separately).
pub(crate) async fn validate_links(
    client: &Client,
    links: &[LinkRecord],
    max_links: usize,
    timeout: Duration,
) -> Vec<LinkValidationResult> {
    let probes = links
        .iter()
        .take(max_links)
        .map(|link| probe_link(client, link, timeout));
    let results = futures::future::join_all(probes).await;

    tracing::info!(
        "Validated {} of {} links ({} broken).",
        results.len(),
        links.len(),
        broken_link_count(&results)
    );
    results
}

/// Issues a single HEAD request with manual redirect handling.
///
/// The client passed in must be built with redirects disabled and the
/// distinct link-check user-agent; this function only adds the per-request
/// timeout and maps the outcome onto a `LinkValidationResult`.
async fn probe_link(
    client: &Client,
    link: &LinkRecord,
    timeout: Duration,
) -> LinkValidationResult {
    // Non-HTTP schemes are resolved immediately without a network call.
    if !link.href.starts_with("http") {
        return LinkValidationResult {
            url: link.href.clone(),
            text: link.text.clone(),
            status: LinkStatus::Skipped,
            status_code: None,
            redirect_url: None,
            error: Some("Non-HTTP link".to_string()),
        };
    }

    match client.head(&link.href).timeout(timeout).send().await {
        Ok(response) => {
            let status_code = response.status().as_u16();

            if (300..400).contains(&status_code) {
                let redirect_url = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                return LinkValidationResult {
                    url: link.href.clone(),
                    text: link.text.clone(),
                    status: LinkStatus::Redirect,
                    status_code: Some(status_code),
                    redirect_url,
                    error: None,
                };
            }

            if (200..300).contains(&status_code) {
                return LinkValidationResult {
                    url: link.href.clone(),
                    text: link.text.clone(),
                    status: LinkStatus::Ok,
                    status_code: Some(status_code),
                    redirect_url: None,
                    error: None,
                };
            }

            LinkValidationResult {
                url: link.href.clone(),
                text: link.text.clone(),
                status: LinkStatus::Error,
                status_code: Some(status_code),
                redirect_url: None,
                error: Some(format!("HTTP {}", status_code)),
            }
        }
        Err(e) if e.is_timeout() => LinkValidationResult {
            url: link.href.clone(),
            text: link.text.clone(),
            status: LinkStatus::Timeout,
            status_code: None,
            redirect_url: None,
            error: Some(format!("Request timed out ({}s)", timeout.as_secs())),
        },
        Err(e) => LinkValidationResult {
            url: link.href.clone(),
            text: link.text.clone(),
            status: LinkStatus::Error,
            status_code: None,
            redirect_url: None,
            error: Some(e.to_string()),
        },
    }
}

/// Links whose probe ended in `error` or `timeout`. Redirects and skips
/// are not broken.
pub(crate) fn broken_link_count(results: &[LinkValidationResult]) -> usize {
    results
        .iter()
        .filter(|r| matches!(r.status, LinkStatus::Error | LinkStatus::Timeout))
        .count()
}

/// True iff at least one link was validated and none of them is broken.
pub(crate) fn all_links_resolved(results: &[LinkValidationResult]) -> bool {
    !results.is_empty() && broken_link_count(results) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(href: &str) -> LinkRecord {
        LinkRecord {
            href: href.to_string(),
            text: "link".to_string(),
        }
    }

    fn result(status: LinkStatus) -> LinkValidationResult {
        LinkValidationResult {
            url: "https://example.com".to_string(),
            text: "link".to_string(),
            status,
            status_code: None,
            redirect_url: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_non_http_links_skipped_without_network() {
        let client = Client::new();
        let links = vec![record("mailto:team@northwind.com"), record("ftp://files")];
        let results =
            validate_links(&client, &links, 20, Duration::from_secs(5)).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == LinkStatus::Skipped));
        assert_eq!(results[0].error.as_deref(), Some("Non-HTTP link"));
    }

    #[tokio::test]
    async fn test_probe_cap_limits_batch_and_preserves_order() {
        let client = Client::new();
        let links: Vec<LinkRecord> = (0..25)
            .map(|i| record(&format!("mailto:user{}@northwind.com", i)))
            .collect();
        let results =
            validate_links(&client, &links, 20, Duration::from_secs(5)).await;
        assert_eq!(results.len(), 20);
        assert_eq!(results[0].url, "mailto:user0@northwind.com");
        assert_eq!(results[19].url, "mailto:user19@northwind.com");
    }

    #[test]
    fn test_broken_link_count_ignores_redirects_and_skips() {
        let results = vec![
            result(LinkStatus::Ok),
            result(LinkStatus::Redirect),
            result(LinkStatus::Skipped),
            result(LinkStatus::Error),
            result(LinkStatus::Timeout),
        ];
        assert_eq!(broken_link_count(&results), 2);
        assert!(!all_links_resolved(&results));
    }

    #[test]
    fn test_all_links_resolved_truth_table() {
        assert!(!all_links_resolved(&[]));
        assert!(all_links_resolved(&[result(LinkStatus::Ok)]));
        assert!(all_links_resolved(&[
            result(LinkStatus::Ok),
            result(LinkStatus::Redirect)
        ]));
        assert!(!all_links_resolved(&[result(LinkStatus::Timeout)]));
    }
}
