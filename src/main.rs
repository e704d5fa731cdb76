use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

mod analysis;
mod api;
mod compat;
mod config;
mod document;
mod error;
mod images;
mod links;
mod metadata;
mod models;
mod reviewer;
mod text;
mod validator;

#[derive(Parser)]
#[command(author, version, about = "Audit marketing email HTML for link, accessibility, client-compatibility and style issues", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: config::GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an email HTML file and emit the full analysis result as JSON
    Review {
        /// Path to the email HTML file
        input: PathBuf,

        /// Subject line as it would arrive in the email header
        #[arg(long)]
        subject: Option<String>,

        /// Sender display name
        #[arg(long)]
        sender_name: Option<String>,

        /// From address
        #[arg(long)]
        from_email: Option<String>,

        /// Reply-to address
        #[arg(long)]
        reply_to: Option<String>,

        /// Write the JSON result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rewrite the email copy against the house style guide
    Optimize {
        /// Path to the email HTML file
        input: PathBuf,

        /// Write the optimized HTML to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(config::build_config(&cli.global)?);

    match cli.command {
        Commands::Review {
            input,
            subject,
            sender_name,
            from_email,
            reply_to,
            output,
        } => {
            info!("Reviewing email from {}", input.display());
            let html = std::fs::read_to_string(&input)?;
            let auditor = reviewer::EmailAuditor::new(config)?;
            let request = models::ReviewRequest {
                email_html_content: html,
                sender_name,
                from_email,
                reply_to_email: reply_to,
                subject_line_from_header: subject,
            };
            let result = auditor.review(request).await?;
            if let Some(error) = &result.error {
                tracing::warn!("Review completed with degraded analysis: {}", error);
            }
            let json = serde_json::to_string_pretty(&result)?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Optimize { input, output } => {
            info!("Optimizing email from {}", input.display());
            let html = std::fs::read_to_string(&input)?;
            let auditor = reviewer::EmailAuditor::new(config)?;
            let result = auditor.optimize(&html).await;
            if let Some(error) = &result.error {
                anyhow::bail!("Optimization failed: {}", error);
            }
            for change in &result.changes {
                info!("Change: {}", change);
            }
            write_output(output.as_deref(), &result.optimized_html)?;
        }
        Commands::Serve { port } => {
            info!("Starting API server on port {}", port);
            api::start_api_server(config, port).await?;
        }
    }

    Ok(())
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)?;
            info!("Wrote output to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
