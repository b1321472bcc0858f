// document-toolkit/src/main.rs

use anyhow::Context;
use document_toolkit::config::Config;
use document_toolkit::output::ArtifactWriter;
use document_toolkit::ToolHandler;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Print to stderr BEFORE logging initialization to catch early failures
    eprintln!("Starting document-toolkit...");

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("FATAL: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.service.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        service = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        request = %config.job.request_path,
        output_dir = %config.output.dir,
        "Starting document toolkit"
    );

    let request = tokio::fs::read(&config.job.request_path)
        .await
        .with_context(|| format!("Failed to read request file {}", config.job.request_path))?;

    let handler = ToolHandler::new(&config.render);
    let response = handler.handle_message(&request).await;

    let writer = ArtifactWriter::new(&config.output.dir)
        .with_context(|| format!("Failed to prepare output directory {}", config.output.dir))?;
    let written = writer
        .write_response(&response)
        .context("Failed to write response artifacts")?;

    match response.status.as_str() {
        "error" => {
            error!(
                request_id = %response.request_id,
                error = response.error.as_deref().unwrap_or("unknown error"),
                "Request failed"
            );
            anyhow::bail!(
                "{} request failed: {}",
                response.tool,
                response.error.unwrap_or_default()
            );
        }
        status => {
            info!(
                request_id = %response.request_id,
                status,
                files = written.len(),
                "Request processed"
            );
        }
    }

    Ok(())
}
