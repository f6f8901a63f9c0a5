//! Enrollment: build an [`EncodingDatabase`] from a labelled image tree.
//!
//! Layout is one directory per identity; the label of an image is the name
//! of the directory that directly contains it.
//!
//! ```text
//! dataset/
//!   alice/img01.jpg
//!   alice/img02.jpg
//!   bob/2024/img01.png   -> label "2024"
//!   unknown/...          -> never enrolled
//! ```

use crate::database::EncodingDatabase;
use crate::detector::Detector;
use crate::pipeline::{self, PipelineError};
use crate::recognizer::{Encoder, RecognizerError};
use crate::types::{EnrollmentRecord, UNKNOWN_LABEL};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// File extensions treated as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("dataset directory not found: {0}")]
    DatasetNotFound(PathBuf),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Summary of one enrollment run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrollReport {
    pub images: usize,
    pub skipped: usize,
    pub records: usize,
    pub labels: BTreeSet<String>,
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|known| e.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Every image file under `root`, sorted by path. Unreadable entries are skipped.
pub fn list_images(root: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_image(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    images.sort();
    images
}

/// Identity label for an image: its parent directory's name.
pub fn label_for(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()?
        .to_str()
        .map(str::to_string)
}

pub struct Enroller<D, E> {
    detector: D,
    encoder: E,
}

impl<D: Detector, E: Encoder> Enroller<D, E> {
    pub fn new(detector: D, encoder: E) -> Self {
        Self { detector, encoder }
    }

    /// Recompute the whole database from `root`. Nothing is merged with an
    /// existing database.
    pub fn enroll_dir(&mut self, root: &Path) -> Result<(EncodingDatabase, EnrollReport), EnrollError> {
        if !root.is_dir() {
            return Err(EnrollError::DatasetNotFound(root.to_path_buf()));
        }

        let paths = list_images(root);
        tracing::info!(root = %root.display(), images = paths.len(), "quantifying faces");

        let mut db = EncodingDatabase::new();
        let mut report = EnrollReport::default();
        let total = paths.len();

        for (i, path) in paths.iter().enumerate() {
            report.images += 1;
            let Some(label) = label_for(path) else {
                report.skipped += 1;
                continue;
            };
            if label == UNKNOWN_LABEL {
                tracing::debug!(path = %path.display(), "skipping reserved unknown folder");
                report.skipped += 1;
                continue;
            }

            let image = match image::open(path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable image");
                    report.skipped += 1;
                    continue;
                }
            };

            let faces = match pipeline::encode_faces(&mut self.detector, &mut self.encoder, &image) {
                Ok(faces) => faces,
                Err(PipelineError::Recognizer(
                    e @ (RecognizerError::NoLandmarks | RecognizerError::DegenerateLandmarks),
                )) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping image with unalignable face");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            tracing::info!(
                progress = %format!("{}/{total}", i + 1),
                path = %path.display(),
                %label,
                faces = faces.len(),
                "processed image"
            );

            for (_, embedding) in faces {
                db.push(EnrollmentRecord {
                    label: label.clone(),
                    embedding,
                    source: Some(path.display().to_string()),
                });
                report.records += 1;
                report.labels.insert(label.clone());
            }
        }

        Ok((db, report))
    }
}
