//! Grow the dataset from live frames.

use chrono::{DateTime, Local};
use facewatch_core::UNKNOWN_LABEL;
use facewatch_hw::frame::encode_jpeg;
use image::RgbImage;
use std::path::{Path, PathBuf};

const JPEG_QUALITY: u8 = 95;

/// Saves frames under `<dataset>/<label>/`.
#[derive(Debug, Clone)]
pub struct DatasetExtender {
    root: PathBuf,
}

impl DatasetExtender {
    /// Creates `<root>/unknown` up front.
    pub fn new(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root.join(UNKNOWN_LABEL))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// `<root>/<label>/<label>_YYYYmmdd_HHMMSS.jpg`
    pub fn path_for(&self, label: &str, at: DateTime<Local>) -> PathBuf {
        self.root
            .join(label)
            .join(format!("{label}_{}.jpg", at.format("%Y%m%d_%H%M%S")))
    }

    /// Save `image` for `label`. Failures are logged, never returned.
    pub fn save(&self, label: &str, image: &RgbImage) -> Option<PathBuf> {
        let path = self.path_for(label, Local::now());
        match self.write(&path, image) {
            Ok(()) => {
                tracing::info!(%label, path = %path.display(), "extended dataset");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(%label, path = %path.display(), error = %e, "failed to extend dataset");
                None
            }
        }
    }

    pub fn save_unknown(&self, image: &RgbImage) -> Option<PathBuf> {
        self.save(UNKNOWN_LABEL, image)
    }

    fn write(&self, path: &Path, image: &RgbImage) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, encode_jpeg(image, JPEG_QUALITY)?)?;
        Ok(())
    }
}
