//! Face model asset management.
//!
//! The detector loads its ONNX assets from a local directory so startup
//! never touches the network. `empa-fetch-models` populates that directory
//! from a HuggingFace repo; `verify` reports what is missing for the
//! startup banner.

use crate::config::VisionConfig;
use crate::error::{EmpaError, Result};
use crate::face::detector::{DETECTOR_ONNX, EXPRESSION_ONNX};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Assets the expression detector requires.
pub const REQUIRED_FILES: &[&str] = &[DETECTOR_ONNX, EXPRESSION_ONNX];

/// Face model assets rooted at the configured directory.
pub struct ModelAssets {
    dir: PathBuf,
    repo_id: String,
}

impl ModelAssets {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            dir: config.model_dir.clone(),
            repo_id: config.model_repo.clone(),
        }
    }

    /// The assets directory.
    #[must_use]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Required files not present in the assets directory.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        REQUIRED_FILES
            .iter()
            .copied()
            .filter(|name| !self.dir.join(name).exists())
            .collect()
    }

    /// Check that every required asset is present.
    ///
    /// # Errors
    ///
    /// Returns an error naming the missing files.
    pub fn verify(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            return Ok(());
        }
        Err(EmpaError::Model(format!(
            "missing model assets in {}: {} (run empa-fetch-models)",
            self.dir.display(),
            missing.join(", ")
        )))
    }

    /// Download any missing assets from the configured repo.
    ///
    /// Returns the number of files downloaded. Files already present are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a download
    /// fails.
    pub fn fetch_missing(&self) -> Result<usize> {
        let missing = self.missing();
        if missing.is_empty() {
            info!("all model assets present in {}", self.dir.display());
            return Ok(0);
        }

        std::fs::create_dir_all(&self.dir)?;

        let api = hf_hub::api::sync::Api::new()
            .map_err(|e| EmpaError::Model(format!("failed to create HF API: {e}")))?;
        let repo = api.model(self.repo_id.clone());

        for name in &missing {
            let bar = ProgressBar::new_spinner();
            bar.set_message(format!("downloading {}/{name}", self.repo_id));
            bar.enable_steady_tick(Duration::from_millis(120));

            let cached = repo.get(name).map_err(|e| {
                EmpaError::Model(format!(
                    "failed to download {name} from {}: {e}",
                    self.repo_id
                ))
            })?;
            std::fs::copy(&cached, self.dir.join(name))?;

            bar.finish_with_message(format!("{name} done"));
        }

        info!(
            "fetched {} model asset(s) into {}",
            missing.len(),
            self.dir.display()
        );
        Ok(missing.len())
    }
}
