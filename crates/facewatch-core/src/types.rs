use serde::{Deserialize, Serialize};

/// Label reported for a face that matched no enrolled identity.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-Union with another box, 0.0 for disjoint or empty boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);

        let overlap = (right - left).max(0.0) * (bottom - top).max(0.0);
        let union = self.area() + other.area() - overlap;
        if union > 0.0 { overlap / union } else { 0.0 }
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One enrolled face: an embedding and the identity it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub label: String,
    pub embedding: Embedding,
    /// Image the embedding was extracted from, kept for provenance only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl EnrollmentRecord {
    pub fn new(label: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            label: label.into(),
            embedding,
            source: None,
        }
    }
}

/// Outcome of matching one probe embedding against the enrollment database.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    /// Matched label, `None` when the face is unknown.
    pub label: Option<String>,
    /// Distance reported for display; lower is closer.
    pub distance: f32,
}

impl Identification {
    pub fn known(label: impl Into<String>, distance: f32) -> Self {
        Self {
            label: Some(label.into()),
            distance,
        }
    }

    pub fn unknown(distance: f32) -> Self {
        Self { label: None, distance }
    }

    pub fn is_known(&self) -> bool {
        self.label.is_some()
    }

    /// Display name: the matched label or [`UNKNOWN_LABEL`].
    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

/// A face located in a frame together with its identification.
#[derive(Debug, Clone)]
pub struct RecognizedFace {
    pub bbox: BoundingBox,
    pub identity: Identification,
}
