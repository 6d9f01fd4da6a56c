//! Model asset manifest
//!
//! The manifest lives at `<asset_path>/<manifest_name>` and names the detector
//! weights relative to the asset directory:
//!
//! ```json
//! { "detector": { "file": "seeta_fd_frontal_v1.0.bin", "min_face_size": 40, "score_threshold": 2.0 } }
//! ```

use crate::errors::DetectorError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub detector: DetectorAsset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorAsset {
    /// Weights file, relative to the asset directory
    pub file: String,
    #[serde(default = "default_min_face_size")]
    pub min_face_size: u32,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
}

fn default_min_face_size() -> u32 {
    40
}

fn default_score_threshold() -> f64 {
    2.0
}

impl AssetManifest {
    /// Read and parse the manifest. Any failure means the assets are unusable.
    pub fn load(base: &Path, manifest_name: &str) -> Result<Self, DetectorError> {
        let path = base.join(manifest_name);
        let contents = fs::read_to_string(&path).map_err(|e| {
            DetectorError::AssetLoad(format!("cannot read manifest {:?}: {}", path, e))
        })?;

        let manifest: AssetManifest = serde_json::from_str(&contents).map_err(|e| {
            DetectorError::AssetLoad(format!("malformed manifest {:?}: {}", path, e))
        })?;

        if manifest.detector.file.trim().is_empty() {
            return Err(DetectorError::AssetLoad(
                "manifest does not name a detector file".to_string(),
            ));
        }

        Ok(manifest)
    }

    pub fn detector_path(&self, base: &Path) -> PathBuf {
        base.join(&self.detector.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_manifest_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"detector":{"file":"weights.bin"}}"#,
        )
        .unwrap();

        let manifest = AssetManifest::load(dir.path(), "manifest.json").unwrap();
        assert_eq!(manifest.detector.min_face_size, 40);
        assert_eq!(manifest.detector_path(dir.path()), dir.path().join("weights.bin"));
    }

    #[test]
    fn test_missing_or_malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AssetManifest::load(dir.path(), "manifest.json"),
            Err(DetectorError::AssetLoad(_))
        ));

        fs::write(dir.path().join("manifest.json"), "not json").unwrap();
        assert!(AssetManifest::load(dir.path(), "manifest.json").is_err());

        fs::write(dir.path().join("manifest.json"), r#"{"detector":{"file":" "}}"#).unwrap();
        assert!(AssetManifest::load(dir.path(), "manifest.json").is_err());
    }
}
