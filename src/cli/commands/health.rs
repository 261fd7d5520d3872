use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde_json::Value;

use crate::cli::{utils, OutputFormat};

#[derive(Debug, Args)]
pub struct HealthArgs {
    #[arg(long, default_value = "http://127.0.0.1:8000", help = "Server base URL")]
    pub url: String,

    #[arg(long, default_value_t = 5, help = "Request timeout in seconds")]
    pub timeout: u64,
}

pub async fn handle(args: HealthArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let endpoint = format!("{}/health", args.url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let response = client
        .get(&endpoint)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", endpoint))?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        utils::output_success(&output_format, &format!("{} is healthy", args.url), Some(body))
    } else {
        utils::output_error(&output_format, &format!("{} reported {}", args.url, status), Some("SERVER_UNHEALTHY"))?;
        anyhow::bail!("server unhealthy: {}", status)
    }
}
