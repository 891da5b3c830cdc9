use anyhow::{bail, Context};
use clap::Parser;
use damage_reporter::core::detection::{decode_data_url, to_data_url};
use damage_reporter::utils::logger;
use serde_json::{json, Value};
use std::path::PathBuf;

/// 將本機影像送到 `/ws/detect-image` 並保存偵測結果
#[derive(Debug, Parser)]
#[command(name = "detect_image")]
#[command(about = "Send a local image to a running damage-reporter for one-shot detection")]
struct Args {
    /// Image file to send (JPEG or PNG)
    #[arg(short, long)]
    image: PathBuf,

    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Where to write the visualized result
    #[arg(short, long, default_value = "detect_result.jpg")]
    output: PathBuf,

    #[arg(long, default_value_t = -6.2, allow_hyphen_values = true)]
    lat: f64,

    #[arg(long, default_value_t = 106.816666, allow_hyphen_values = true)]
    lon: f64,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let image = std::fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    tracing::info!("📤 Sending {} ({} bytes)", args.image.display(), image.len());

    let payload = json!({
        "image": to_data_url(&image),
        "location": { "lat": args.lat, "lon": args.lon },
    });

    let url = format!("{}/ws/detect-image", args.server.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .json(&payload)
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?;

    let status = response.status();
    let body: Value = response.json().await.context("invalid JSON response")?;
    if !status.is_success() {
        bail!("server returned {}: {}", status, body);
    }

    let Some(result_image) = body.get("result_image").and_then(Value::as_str) else {
        bail!("response has no result_image: {}", body);
    };
    let result = decode_data_url(result_image)?;
    std::fs::write(&args.output, &result)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!("✅ Result saved to: {}", args.output.display());
    println!("🧠 Label: {}", body.get("label").unwrap_or(&Value::Null));
    if let Some(report_id) = body.get("report_id").and_then(Value::as_i64) {
        println!("📝 Report created: {}", report_id);
    }
    Ok(())
}
