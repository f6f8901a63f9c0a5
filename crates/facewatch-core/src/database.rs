//! Persisted encoding database: the full set of enrolled (embedding, label) records.
//!
//! Stored as a single JSON document. Enrollment always rewrites the whole
//! file; the live loop loads it once, read-only.

use crate::types::EnrollmentRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DATABASE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("encoding database not found: {0} — run `facewatch encode` first")]
    NotFound(PathBuf),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt encoding database {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("unsupported encoding database version {found} (expected {expected})", expected = DATABASE_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("encoding database was built by a different encoder: {0} — re-run `facewatch encode`")]
    Incompatible(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingDatabase {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub records: Vec<EnrollmentRecord>,
}

impl Default for EncodingDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodingDatabase {
    pub fn new() -> Self {
        Self {
            version: DATABASE_VERSION,
            created_at: Utc::now(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: EnrollmentRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[EnrollmentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embedding dimension shared by every record, `None` when empty.
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.dim())
    }

    /// Record count per label, sorted by label.
    pub fn label_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.label.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Reject records the live encoder cannot be compared against. Untagged
    /// records are accepted on dimension alone.
    pub fn check_compatible(&self, dimension: usize, model_version: &str) -> Result<(), DatabaseError> {
        if let Some(found) = self.dimension().filter(|d| *d != dimension) {
            return Err(DatabaseError::Incompatible(format!(
                "embeddings have {found} values, encoder produces {dimension}"
            )));
        }
        let foreign = self.records.iter().find_map(|r| {
            r.embedding
                .model_version
                .as_deref()
                .filter(|v| *v != model_version)
        });
        if let Some(found) = foreign {
            return Err(DatabaseError::Incompatible(format!(
                "model version '{found}', encoder is '{model_version}'"
            )));
        }
        Ok(())
    }

    /// Load and validate a database file. Any failure here is fatal to the caller.
    pub fn load(path: &Path) -> Result<Self, DatabaseError> {
        let bytes = fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DatabaseError::NotFound(path.to_path_buf())
            } else {
                DatabaseError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        let db: EncodingDatabase =
            serde_json::from_slice(&bytes).map_err(|e| DatabaseError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if db.version != DATABASE_VERSION {
            return Err(DatabaseError::UnsupportedVersion { found: db.version });
        }
        db.validate().map_err(|reason| DatabaseError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;

        tracing::info!(
            path = %path.display(),
            records = db.len(),
            labels = db.label_counts().len(),
            dimension = ?db.dimension(),
            "loaded encoding database"
        );
        Ok(db)
    }

    /// Write the whole database, replacing any existing file at `path`.
    ///
    /// Writes to a sibling temp file first and renames it into place, so a
    /// crash mid-write never leaves a truncated database behind.
    pub fn save(&self, path: &Path) -> Result<(), DatabaseError> {
        let io_err = |source| DatabaseError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let bytes = serde_json::to_vec(self).map_err(|e| DatabaseError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;

        tracing::info!(path = %path.display(), records = self.len(), "saved encoding database");
        Ok(())
    }

    fn validate(&self) -> Result<(), String> {
        let Some(dim) = self.dimension() else {
            return Ok(());
        };
        if dim == 0 {
            return Err("zero-length embedding".into());
        }
        for (i, record) in self.records.iter().enumerate() {
            if record.embedding.dim() != dim {
                return Err(format!(
                    "record {i} ({}) has {}-dim embedding, expected {dim}",
                    record.label,
                    record.embedding.dim()
                ));
            }
            if record.embedding.values.iter().any(|v| !v.is_finite()) {
                return Err(format!("record {i} ({}) has non-finite values", record.label));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;
    use tempfile::TempDir;

    fn sample() -> EncodingDatabase {
        let mut db = EncodingDatabase::new();
        db.push(EnrollmentRecord::new("alice", Embedding::new(vec![0.1, 0.2, 0.3])));
        db.push(EnrollmentRecord::new("bob", Embedding::new(vec![0.4, 0.5, 0.6])));
        let mut with_source = EnrollmentRecord::new("alice", Embedding::new(vec![0.7, 0.8, 0.9]));
        with_source.source = Some("dataset/alice/img01.jpg".into());
        db.push(with_source);
        db
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model").join("encodings.json");

        let db = sample();
        db.save(&path).unwrap();
        let loaded = EncodingDatabase::load(&path).unwrap();

        assert_eq!(loaded, db);
        assert!(!dir.path().join("model").join("encodings.json.tmp").exists());
    }

    #[test]
    fn test_save_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encodings.json");

        sample().save(&path).unwrap();
        let mut smaller = EncodingDatabase::new();
        smaller.push(EnrollmentRecord::new("carol", Embedding::new(vec![1.0])));
        smaller.save(&path).unwrap();

        let loaded = EncodingDatabase::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.records()[0].label, "carol");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = EncodingDatabase::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encodings.json");
        fs::write(&path, b"\x80\x04pickle?").unwrap();
        let err = EncodingDatabase::load(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::Corrupt { .. }));
    }

    #[test]
    fn test_load_rejects_mixed_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encodings.json");
        let mut db = EncodingDatabase::new();
        db.push(EnrollmentRecord::new("alice", Embedding::new(vec![0.1, 0.2])));
        db.push(EnrollmentRecord::new("bob", Embedding::new(vec![0.1])));
        db.save(&path).unwrap();

        let err = EncodingDatabase::load(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::Corrupt { .. }));
    }

    #[test]
    fn test_label_counts() {
        let db = sample();
        let counts = db.label_counts();
        assert_eq!(counts.get("alice"), Some(&2));
        assert_eq!(counts.get("bob"), Some(&1));
        assert_eq!(db.dimension(), Some(3));
    }

    #[test]
    fn test_check_compatible() {
        let db = sample();
        assert!(db.check_compatible(3, "w600k_r50").is_ok());
        assert!(EncodingDatabase::new().check_compatible(512, "w600k_r50").is_ok());

        let err = db.check_compatible(512, "w600k_r50").unwrap_err();
        assert!(matches!(err, DatabaseError::Incompatible(_)));
    }

    #[test]
    fn test_check_compatible_rejects_other_model() {
        let mut db = EncodingDatabase::new();
        let mut current = Embedding::new(vec![0.1, 0.2]);
        current.model_version = Some("w600k_r50".into());
        let mut older = Embedding::new(vec![0.3, 0.4]);
        older.model_version = Some("glint360k_r100".into());
        db.push(EnrollmentRecord::new("alice", current));
        db.push(EnrollmentRecord::new("bob", older));

        let err = db.check_compatible(2, "w600k_r50").unwrap_err();
        assert!(err.to_string().contains("glint360k_r100"), "{err}");
    }
}
