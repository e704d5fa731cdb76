//! API server exposing the email-review pipeline for programmatic
//! submission (email-parsing webhooks, CI checks).

use crate::config::Config;
use crate::models::ReviewRequest;
use crate::reviewer::EmailAuditor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use warp::{Filter, Rejection, Reply, http::StatusCode};

/// Inbound submission. Field names are camelCase to stay drop-in
/// compatible with common email-parsing webhook payloads.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct IngestPayload {
    html_content: Option<String>,
    /// Accepted for completeness; analysis always derives from the HTML.
    #[allow(dead_code)]
    text_content: Option<String>,
    sender: Option<String>,
    subject: Option<String>,
    reply_to: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    success: bool,
    message: String,
}

fn error_reply(
    status: StatusCode,
    error: &str,
    details: Option<String>,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            error: error.to_string(),
            details,
        }),
        status,
    )
}

/// Start the API server
pub(crate) async fn start_api_server(config: Arc<Config>, port: u16) -> anyhow::Result<()> {
    let auditor = Arc::new(EmailAuditor::new(config.clone())?);
    let auditor_filter = warp::any().map(move || auditor.clone());

    // Limit concurrent analyses
    let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
    let semaphore_filter = warp::any().map(move || semaphore.clone());

    let expected_key = config.ingest_api_key.clone();
    let key_filter = warp::any().map(move || expected_key.clone());

    // Health check endpoint
    let health = warp::path("health").and(warp::get()).map(|| {
        warp::reply::json(&HealthResponse {
            success: true,
            message: "Email Auditor API is running".to_string(),
        })
    });

    // Self-describing payload documentation
    let describe = warp::path("ingest").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "message": "Email Auditor API - POST email HTML content for analysis",
            "version": env!("CARGO_PKG_VERSION"),
            "expectedPayload": {
                "htmlContent": "string (required) - The HTML content of the email",
                "textContent": "string (optional) - Plain text version",
                "sender": "string (optional) - Sender email address",
                "subject": "string (optional) - Email subject line",
                "replyTo": "string (optional) - Reply-to address",
            },
            "authentication": "Set x-api-key header if an ingest API key is configured",
        }))
    });

    // Analysis submission endpoint
    let ingest = warp::path("ingest")
        .and(warp::post())
        .and(warp::header::optional::<String>("x-api-key"))
        .and(warp::body::json())
        .and(auditor_filter)
        .and(semaphore_filter)
        .and(key_filter)
        .and_then(handle_ingest);

    let routes = health
        .or(describe)
        .or(ingest)
        .with(warp::cors().allow_any_origin())
        .recover(handle_rejection);

    tracing::info!("Starting API server on port {}", port);
    warp::serve(routes).run(([0, 0, 0, 0], port)).await;

    Ok(())
}

/// Handle a single analysis submission
async fn handle_ingest(
    api_key: Option<String>,
    payload: IngestPayload,
    auditor: Arc<EmailAuditor>,
    semaphore: Arc<Semaphore>,
    expected_key: Option<String>,
) -> Result<impl Reply, Rejection> {
    // Validate the shared secret when one is configured.
    if let Some(expected) = expected_key.as_deref() {
        if api_key.as_deref() != Some(expected) {
            return Ok(error_reply(StatusCode::UNAUTHORIZED, "Unauthorized", None));
        }
    }

    let html_content = payload
        .html_content
        .as_deref()
        .map(str::trim)
        .filter(|html| !html.is_empty());
    let Some(html_content) = html_content else {
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            "HTML content of the email is required.",
            None,
        ));
    };

    let Ok(_permit) = semaphore.acquire().await else {
        return Ok(error_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server error",
            None,
        ));
    };

    tracing::info!(
        "Ingesting email for analysis (sender: {:?}, subject: {:?})",
        payload.sender,
        payload.subject
    );

    let request = ReviewRequest {
        email_html_content: html_content.to_string(),
        sender_name: None,
        from_email: None,
        reply_to_email: payload.reply_to.clone(),
        subject_line_from_header: payload.subject.clone(),
    };

    match auditor.review(request).await {
        Ok(result) => {
            tracing::info!(
                "Email analyzed (score: {}, broken links: {})",
                result.qualitative_analysis.overall_score,
                result.technical_checks.broken_links
            );
            Ok(warp::reply::with_status(
                warp::reply::json(&result),
                StatusCode::OK,
            ))
        }
        Err(e) => {
            tracing::error!("Error processing ingested email: {}", e);
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process email.",
                Some(e.to_string()),
            ))
        }
    }
}

/// Handle API rejections
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    if err.is_not_found() {
        Ok(error_reply(StatusCode::NOT_FOUND, "Not Found", None))
    } else {
        Ok(error_reply(StatusCode::BAD_REQUEST, "Bad request", None))
    }
}
