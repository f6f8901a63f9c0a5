//! Model file locations.

use crate::detector::{DetectionStrategy, FaceDetector};
use crate::pipeline::PipelineError;
use crate::recognizer::FaceRecognizer;
use std::path::{Path, PathBuf};

pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// `$XDG_DATA_HOME/facewatch/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facewatch")
        .join("models")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
}

impl ModelPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            detector: dir.join(SCRFD_MODEL_FILE),
            recognizer: dir.join(ARCFACE_MODEL_FILE),
        }
    }

    /// Load both models. Fails fast if either file is missing.
    pub fn load(
        &self,
        strategy: DetectionStrategy,
    ) -> Result<(FaceDetector, FaceRecognizer), PipelineError> {
        let detector = FaceDetector::load(&self.detector, strategy)?;
        let recognizer = FaceRecognizer::load(&self.recognizer)?;
        Ok((detector, recognizer))
    }
}
