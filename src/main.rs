//! # Mailscout CLI
//!
//! Command-line interface for the Mailscout library (`mailscout_core`).
//! This binary parses arguments, sets up configuration, and runs either a
//! single email discovery (optionally streaming progress events to stdout)
//! or a bulk dispatch of a prepared batch file.

use mailscout_core::{
    discover_email, discover_email_streaming, dispatch_batch, sse_frame, BulkSendItem,
    ConfigBuilder, DiscoveryRequest, Person,
};

// Dependencies specific to the CLI binary
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Discovers professional email addresses and dispatches outreach batches.",
    long_about = "Mailscout finds email addresses from a name and company domain using \
pattern generation, verification, and bounded web research, and can dispatch prepared \
batches of up to 25 messages through the mail API."
)]
struct AppArgs {
    /// Name of the person to find an email for (enables discovery mode). Requires --domain.
    #[arg(long, env = "MAILSCOUT_NAME", requires = "domain")]
    name: Option<String>,

    /// Company domain or website URL to search against. Requires --name.
    #[arg(long, env = "MAILSCOUT_DOMAIN", requires = "name")]
    domain: Option<String>,

    /// Company display name used in research queries (defaults to the domain).
    #[arg(long, env = "MAILSCOUT_COMPANY")]
    company: Option<String>,

    /// Role or title of the person, recorded alongside the request.
    #[arg(long, env = "MAILSCOUT_ROLE")]
    role: Option<String>,

    /// A known address at the same company, used to seed the pattern order.
    #[arg(long, env = "MAILSCOUT_KNOWN_PATTERN")]
    known_pattern: Option<String>,

    /// Print progress as SSE frames on stdout instead of a final summary.
    #[arg(long, default_value = "false")]
    stream: bool,

    /// Path to a batch JSON file of prepared messages (enables dispatch mode).
    #[arg(long, env = "MAILSCOUT_SEND", conflicts_with = "name")]
    send: Option<String>,

    /// Path to the output JSON file where dispatch results will be saved.
    #[arg(
        short,
        long,
        default_value = "results.json",
        env = "MAILSCOUT_OUTPUT"
    )]
    output: String,

    /// Path to a configuration file (TOML format) to load settings from. CLI args override file settings.
    #[arg(long, env = "MAILSCOUT_CONFIG")]
    config_file: Option<String>,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "MAILSCOUT_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// API key for the email verification service.
    #[arg(long, env = "MAILSCOUT_VERIFICATION_API_KEY")]
    verification_api_key: Option<String>,

    /// API key for the web search service.
    #[arg(long, env = "MAILSCOUT_SEARCH_API_KEY")]
    search_api_key: Option<String>,

    /// Sender address for dispatched mail.
    #[arg(long, env = "MAILSCOUT_SENDER_EMAIL")]
    sender_email: Option<String>,

    /// Access token for the mail API.
    #[arg(long, env = "MAILSCOUT_ACCESS_TOKEN")]
    access_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")?;

    tracing::info!("Mailscout CLI v{} starting...", env!("CARGO_PKG_VERSION"));

    let args = AppArgs::parse();
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let mut config_builder = ConfigBuilder::new();

    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if let Some(t) = args.request_timeout {
        config_builder = config_builder.request_timeout(Duration::from_secs(t));
    }
    if let Some(ref key) = args.verification_api_key {
        config_builder = config_builder.verification_api_key(key);
    }
    if let Some(ref key) = args.search_api_key {
        config_builder = config_builder.search_api_key(key);
    }
    if let Some(ref sender) = args.sender_email {
        config_builder = config_builder.mail_sender_email(sender);
    }
    if let Some(ref token) = args.access_token {
        config_builder = config_builder.mail_access_token(token);
    }

    let config = match config_builder.build() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Err(anyhow::anyhow!("Failed to build configuration: {}", e));
        }
    };
    tracing::debug!("Effective configuration loaded: {:?}", *config);

    if let Some(ref batch_path) = args.send {
        return run_dispatch_mode(config, batch_path, &args.output).await;
    }

    match (args.name.as_deref(), args.domain.as_deref()) {
        (Some(name), Some(domain)) => {
            run_discovery_mode(config, &args, name, domain).await
        }
        _ => Err(anyhow::anyhow!(
            "No mode selected: pass --name and --domain for discovery, or --send for dispatch. See --help."
        )),
    }
}

/// Single-contact discovery. With --stream, every progress event is printed
/// as an SSE frame as it happens; otherwise only the final report is shown.
async fn run_discovery_mode(
    config: Arc<mailscout_core::Config>,
    args: &AppArgs,
    name: &str,
    domain: &str,
) -> Result<()> {
    let mut person = Person::new(name);
    person.role = args.role.clone();
    let request = DiscoveryRequest {
        person,
        company: args.company.clone().unwrap_or_else(|| domain.to_string()),
        domain: domain.to_string(),
        known_pattern: args.known_pattern.clone(),
    };

    tracing::info!("Starting discovery for '{}' @ {}", name, request.domain);

    let report = if args.stream {
        discover_email_streaming(
            config,
            &request,
            "cli",
            CancellationToken::new(),
            |event| print!("{}", sse_frame(&event)),
        )
        .await?
    } else {
        discover_email(config, &request).await?
    };

    if !args.stream {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Bulk dispatch of a prepared batch file. Results are written to the output
/// path and summarized on stdout.
async fn run_dispatch_mode(
    config: Arc<mailscout_core::Config>,
    batch_path: &str,
    output_path: &str,
) -> Result<()> {
    let file = File::open(batch_path)
        .with_context(|| format!("Failed to open batch file '{}'", batch_path))?;
    let items: Vec<BulkSendItem> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse batch file '{}'", batch_path))?;

    tracing::info!("Loaded {} items from '{}'.", items.len(), batch_path);

    let pb = ProgressBar::new(items.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} | {msg}")
            .context("Failed to set progress bar template")?
            .progress_chars("=> "),
    );
    pb.set_message("Dispatching batch...");

    let report = dispatch_batch(config, items).await?;

    pb.set_position(report.summary.total as u64);
    pb.finish_with_message(format!(
        "Dispatched {} of {} ({} failed)",
        report.summary.sent, report.summary.total, report.summary.failed
    ));

    tracing::info!("Saving results to '{}'...", output_path);
    let out = File::create(output_path)
        .with_context(|| format!("Failed to create output file '{}'", output_path))?;
    serde_json::to_writer_pretty(BufWriter::new(out), &report)
        .context("Failed to serialize dispatch report")?;
    tracing::info!("Results saved successfully.");

    if report.summary.failed > 0 {
        for result in report.results.iter().filter(|r| !r.success) {
            tracing::warn!(
                "Failed to send to <{}> ({}): {}",
                result.to,
                result.client_id,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    Ok(())
}
