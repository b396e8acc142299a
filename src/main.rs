//! One-shot Feishu bot probe.
//!
//! Credentials come from `FEISHU_APP_ID` / `FEISHU_APP_SECRET` (and
//! optionally `FEISHU_DOMAIN`). Prints the probe result as JSON on
//! stdout and exits non-zero when the bot is unreachable.

use anyhow::{Context, Result};
use tracing::info;

use feishu_probe::{ProbeSettings, Prober};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feishu_probe=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!("🤖 Feishu probe v{}", env!("CARGO_PKG_VERSION"));

    let settings = ProbeSettings::from_env().context("Invalid probe settings")?;
    let prober = Prober::new(settings);

    let result = prober.probe(None).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to encode probe result")?
    );

    if !result.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}
