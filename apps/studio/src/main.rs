use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use studio::cache::ResultCache;
use studio::compiler::{OutputFormat, RemoteCompiler};
use studio::config::Config;
use studio::export::{export_document, suggested_filename};
use studio::models::ResumeSnapshot;

const USAGE: &str = "studio <resume.json> [output-path] [--source]";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (errors on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Studio exporter v{}", env!("CARGO_PKG_VERSION"));

    let args = CliArgs::parse(std::env::args().skip(1))?;

    let raw = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let snapshot: ResumeSnapshot =
        serde_json::from_slice(&raw).context("Input is not a valid resume document")?;

    let compiler =
        RemoteCompiler::with_timeout(&config.render_service_url, config.preview.compile_timeout);
    if !compiler.is_available().await {
        warn!(
            url = %config.render_service_url,
            "Render service did not answer the availability probe"
        );
    }

    let cache = ResultCache::new(config.preview.freshness_window, config.preview.cache_capacity);
    let policy = config.preview.retry_policy();

    let outcome = export_document(
        &compiler,
        &cache,
        &policy,
        &snapshot,
        args.format,
        config.preview.degrade_to_source,
    )
    .await?;
    if outcome.degraded {
        warn!("PDF rendering unavailable, exported source instead");
    }

    // Default output lands next to the input file.
    let output = args.output.unwrap_or_else(|| {
        let name = suggested_filename(&snapshot, outcome.document.format);
        match args.input.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
            _ => PathBuf::from(name),
        }
    });
    tokio::fs::write(&output, &outcome.document.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        bytes = outcome.document.bytes.len(),
        "Exported {} to {}",
        outcome.document.format,
        output.display()
    );

    Ok(())
}

struct CliArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    format: OutputFormat,
}

impl CliArgs {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut input = None;
        let mut output = None;
        let mut format = OutputFormat::Pdf;
        for arg in args {
            if arg == "--source" {
                format = OutputFormat::Source;
            } else if arg.starts_with('-') {
                bail!("Unknown flag '{arg}' (usage: {USAGE})");
            } else if input.is_none() {
                input = Some(PathBuf::from(arg));
            } else if output.is_none() {
                output = Some(PathBuf::from(arg));
            } else {
                bail!("Unexpected argument '{arg}' (usage: {USAGE})");
            }
        }
        let input = input.with_context(|| format!("usage: {USAGE}"))?;
        Ok(Self {
            input,
            output,
            format,
        })
    }
}
