use std::error::Error;

use filing_anchors::{process_archive, PipelineConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "pipeline.yaml";

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = PipelineConfig::from_file(&config_path)?;

    let manifest = process_archive(&config)?;
    tracing::info!(
        config = %config_path,
        archive = %manifest.archive,
        segments = manifest.segments.len(),
        written = manifest.written(),
        "run_complete"
    );

    Ok(())
}

/// `RUST_LOG` picks the filter (default `info`); `FILING_ANCHORS_LOG_JSON=1`
/// switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("FILING_ANCHORS_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
