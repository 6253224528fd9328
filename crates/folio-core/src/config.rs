// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Settings for extraction and reassembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Constant downscale factor applied to every page when rendering
    /// thumbnails (PDF points or image pixels).
    pub thumbnail_scale: f32,
    /// JPEG quality (1-100) for encoded thumbnails.
    pub thumbnail_jpeg_quality: u8,
    /// Upper bound on the total number of pages in one extraction batch.
    pub max_pages_per_batch: usize,
    /// Upper bound on the size of a single uploaded file.
    pub max_file_bytes: u64,
    /// PDF version written into the output header.
    pub output_pdf_version: String,
    /// Flate-compress uncompressed streams before saving the output.
    pub compress_output: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thumbnail_scale: 0.5,
            thumbnail_jpeg_quality: 80,
            max_pages_per_batch: 2000,
            max_file_bytes: 200 * 1024 * 1024,
            output_pdf_version: "1.7".into(),
            compress_output: true,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Missing keys take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.thumbnail_scale > 0.0 && self.thumbnail_scale <= 1.0) {
            return Err(FolioError::Config(format!(
                "thumbnail_scale must be in (0, 1], got {}",
                self.thumbnail_scale
            )));
        }
        if !(1..=100).contains(&self.thumbnail_jpeg_quality) {
            return Err(FolioError::Config(format!(
                "thumbnail_jpeg_quality must be 1-100, got {}",
                self.thumbnail_jpeg_quality
            )));
        }
        if self.max_pages_per_batch == 0 {
            return Err(FolioError::Config("max_pages_per_batch must be > 0".into()));
        }
        if self.max_file_bytes == 0 {
            return Err(FolioError::Config("max_file_bytes must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"max_pages_per_batch": 10}"#).unwrap();
        assert_eq!(config.max_pages_per_batch, 10);
        assert_eq!(config.thumbnail_jpeg_quality, 80);
    }

    #[test]
    fn rejects_zero_scale() {
        let config = PipelineConfig {
            thumbnail_scale: 0.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(FolioError::Config(_))));
    }
}
