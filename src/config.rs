//! Defines the configuration settings for the email-auditor application.
//!
//! The built `Config` is passed into the orchestrator explicitly; business
//! logic never reads the environment on its own.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Global command line options, merged over the file configuration.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct GlobalArgs {
    /// Path to configuration file (TOML format)
    #[arg(long, env = "EMAIL_AUDITOR_CONFIG", global = true)]
    pub config_file: Option<String>,

    /// API key for the text-analysis service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Shared secret expected in the x-api-key header of the ingest endpoint
    #[arg(long, env = "EMAIL_INGEST_API_KEY", hide_env_values = true, global = true)]
    pub ingest_api_key: Option<String>,

    /// Required utm_source value for outbound links
    #[arg(long, env = "EMAIL_AUDITOR_UTM_SOURCE", global = true)]
    pub utm_source: Option<String>,

    /// Maximum number of links probed per analysis
    #[arg(long, env = "EMAIL_AUDITOR_MAX_PROBES", global = true)]
    pub max_probes: Option<usize>,

    /// Per-link probe timeout in seconds
    #[arg(long, env = "EMAIL_AUDITOR_PROBE_TIMEOUT", global = true)]
    pub probe_timeout: Option<u64>,
}

/// TOML Configuration file structure
#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    links: Option<LinksConfig>,
    brand: Option<BrandConfig>,
    analysis: Option<AnalysisConfig>,
    server: Option<ServerConfig>,
}

#[derive(Deserialize, Debug, Default)]
struct LinksConfig {
    probe_timeout: Option<u64>,
    max_probed_links: Option<usize>,
    probe_user_agent: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct BrandConfig {
    required_utm_source: Option<String>,
    trusted_domains: Option<Vec<String>>,
    no_reply_address: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct AnalysisConfig {
    api_base_url: Option<String>,
    models: Option<Vec<String>>,
    request_timeout: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
struct ServerConfig {
    max_concurrency: Option<usize>,
}

/// Application configuration settings.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// Timeout for each individual link probe.
    pub probe_timeout: Duration,
    /// Maximum number of unique links probed per analysis.
    pub max_probed_links: usize,
    /// User agent identifying the link-check probes.
    pub probe_user_agent: String,
    /// The utm_source value every tracked link must carry.
    pub required_utm_source: String,
    /// Production domain markers that suppress the staging-link heuristic.
    pub trusted_domains: Vec<String>,
    /// Reply-to address for which the signature check is not applicable.
    pub no_reply_address: String,
    /// Base URL of the OpenAI-compatible text-analysis endpoint.
    pub api_base_url: String,
    /// Credential for the text-analysis service; absence degrades analysis.
    pub api_key: Option<String>,
    /// Model tiers tried in order until one succeeds.
    pub analysis_models: Vec<String>,
    /// Timeout for each text-analysis request.
    pub analysis_timeout: Duration,
    /// Shared secret for the ingestion endpoint; no check when unset.
    pub ingest_api_key: Option<String>,
    /// Maximum concurrent analyses handled by the API server.
    pub max_concurrency: usize,
}

impl Config {
    pub(crate) fn default() -> Self {
        Config {
            probe_timeout: Duration::from_secs(5),
            max_probed_links: 20,
            probe_user_agent: "email-auditor-linkcheck/1.0".to_string(),
            required_utm_source: "northwind".to_string(),
            trusted_domains: vec![
                "northwind.com".to_string(),
                "northwindlabs.io".to_string(),
            ],
            no_reply_address: "no-reply@northwind.com".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            analysis_models: vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()],
            analysis_timeout: Duration::from_secs(60),
            ingest_api_key: None,
            max_concurrency: 8,
        }
    }
}

/// Load configuration from a TOML file
fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() {
        tracing::warn!("Configuration file {} not found, using defaults", file_path);
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::info!("Loaded configuration from {}", file_path);
    Ok(config)
}

fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    if let Some(links) = &file_config.links {
        if let Some(timeout) = links.probe_timeout {
            config.probe_timeout = Duration::from_secs(timeout);
        }
        if let Some(max) = links.max_probed_links {
            config.max_probed_links = max;
        }
        if let Some(agent) = &links.probe_user_agent {
            config.probe_user_agent = agent.clone();
        }
    }

    if let Some(brand) = &file_config.brand {
        if let Some(source) = &brand.required_utm_source {
            config.required_utm_source = source.clone();
        }
        if let Some(domains) = &brand.trusted_domains {
            config.trusted_domains = domains.clone();
        }
        if let Some(address) = &brand.no_reply_address {
            config.no_reply_address = address.clone();
        }
    }

    if let Some(analysis) = &file_config.analysis {
        if let Some(base_url) = &analysis.api_base_url {
            config.api_base_url = base_url.clone();
        }
        if let Some(models) = &analysis.models {
            config.analysis_models = models.clone();
        }
        if let Some(timeout) = analysis.request_timeout {
            config.analysis_timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(server) = &file_config.server {
        if let Some(concurrency) = server.max_concurrency {
            config.max_concurrency = concurrency;
        }
    }
}

/// Apply command line arguments to the Config instance
fn apply_cli_args(config: &mut Config, args: &GlobalArgs) {
    if let Some(ref key) = args.api_key {
        config.api_key = Some(key.clone());
    }
    if let Some(ref key) = args.ingest_api_key {
        config.ingest_api_key = Some(key.clone());
    }
    if let Some(ref source) = args.utm_source {
        config.required_utm_source = source.clone();
    }
    if let Some(max) = args.max_probes {
        config.max_probed_links = max;
    }
    if let Some(timeout) = args.probe_timeout {
        config.probe_timeout = Duration::from_secs(timeout);
    }
}

fn validate_config(config: &mut Config) {
    if config.max_probed_links == 0 {
        config.max_probed_links = 1;
        tracing::warn!("Max probed links was set to 0. Setting to 1.");
    }

    if config.probe_timeout.is_zero() {
        config.probe_timeout = Duration::from_secs(5);
        tracing::warn!("Probe timeout was zero. Setting to 5 seconds.");
    }

    if config.analysis_models.is_empty() {
        config.analysis_models = vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()];
        tracing::warn!("Analysis model list was empty. Restoring default tiers.");
    }

    if config.trusted_domains.is_empty() {
        tracing::warn!(
            "Trusted domain list is empty. Staging-link findings will never be suppressed."
        );
    }

    if config.max_concurrency == 0 {
        config.max_concurrency = 1;
        tracing::warn!("Concurrency was set to 0. Setting to 1.");
    }

    if config.api_key.is_none() {
        tracing::warn!(
            "No analysis API key configured. Reviews will return degraded qualitative analysis."
        );
    }
}

pub(crate) fn build_config(args: &GlobalArgs) -> anyhow::Result<Config> {
    let mut config = Config::default();

    if let Some(ref file_path) = args.config_file {
        let file_config = load_config_file(file_path)?;
        apply_file_config(&mut config, &file_config);
    } else {
        for path in ["./email-auditor.toml", "./config.toml"].iter() {
            if Path::new(path).exists() {
                match load_config_file(path) {
                    Ok(file_config) => {
                        apply_file_config(&mut config, &file_config);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load configuration from {}: {}", path, e);
                    }
                }
            }
        }
    }

    apply_cli_args(&mut config, args);
    validate_config(&mut config);

    tracing::debug!("Final configuration: {:?}", config);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_probed_links, 20);
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.analysis_models.len(), 2);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_file_config_overrides_defaults() {
        let file_config: ConfigFile = toml::from_str(
            r#"
            [links]
            probe_timeout = 10
            max_probed_links = 5

            [brand]
            required_utm_source = "acme"
            trusted_domains = ["acme.com"]

            [analysis]
            models = ["gpt-4o-mini"]
            "#,
        )
        .unwrap();
        let mut config = Config::default();
        apply_file_config(&mut config, &file_config);
        assert_eq!(config.probe_timeout, Duration::from_secs(10));
        assert_eq!(config.max_probed_links, 5);
        assert_eq!(config.required_utm_source, "acme");
        assert_eq!(config.trusted_domains, vec!["acme.com".to_string()]);
        assert_eq!(config.analysis_models, vec!["gpt-4o-mini".to_string()]);
        // Untouched sections keep their defaults.
        assert_eq!(config.no_reply_address, "no-reply@northwind.com");
    }

    #[test]
    fn test_cli_args_win_over_file() {
        let mut config = Config::default();
        let args = GlobalArgs {
            utm_source: Some("acme".to_string()),
            max_probes: Some(3),
            api_key: Some("sk-test".to_string()),
            ..GlobalArgs::default()
        };
        apply_cli_args(&mut config, &args);
        assert_eq!(config.required_utm_source, "acme");
        assert_eq!(config.max_probed_links, 3);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_validation_fixes_degenerate_values() {
        let mut config = Config::default();
        config.max_probed_links = 0;
        config.probe_timeout = Duration::ZERO;
        config.analysis_models.clear();
        config.max_concurrency = 0;
        validate_config(&mut config);
        assert_eq!(config.max_probed_links, 1);
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert!(!config.analysis_models.is_empty());
        assert_eq!(config.max_concurrency, 1);
    }
}
