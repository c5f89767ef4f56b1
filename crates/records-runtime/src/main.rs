//! # Records Runtime
//!
//! Entry point: reads newline-delimited JSON commands from stdin and writes one
//! JSON response per line to stdout. Logs go to stderr.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use records_runtime::config::log_level_from_env;
use records_runtime::{load_config, CommandProcessor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging: RUST_LOG directives win over RM_LOG_LEVEL
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level_from_env().to_string().to_lowercase()))
        .context("invalid log filter")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config();

    info!("===========================================");
    info!("  Records Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let processor = CommandProcessor::new(config.reconciler);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read command")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = processor.handle_line(&line).await;
        let mut encoded = serde_json::to_string(&response).context("failed to encode response")?;
        encoded.push('\n');
        stdout
            .write_all(encoded.as_bytes())
            .await
            .context("failed to write response")?;
        stdout.flush().await?;
        handled += 1;
    }

    info!(commands = handled, "Input closed, shutting down");
    Ok(())
}
