//! Downloads the face model assets into the configured directory.

use empa::EmpaConfig;
use empa::models::ModelAssets;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EmpaConfig::from_file(Path::new(&path))
            .map_err(|e| anyhow::anyhow!("failed to load {path}: {e}"))?,
        None => {
            let default_path = EmpaConfig::default_config_path();
            if default_path.exists() {
                EmpaConfig::from_file(&default_path)
                    .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?
            } else {
                EmpaConfig::default()
            }
        }
    };

    let assets = ModelAssets::new(&config.vision);
    let fetched = assets
        .fetch_missing()
        .map_err(|e| anyhow::anyhow!("fetch failed: {e}"))?;

    if fetched == 0 {
        println!("all model assets already present in {}", assets.dir().display());
    } else {
        println!("fetched {fetched} asset(s) into {}", assets.dir().display());
    }
    Ok(())
}
