//! Face detection: the [`Detector`] capability and its SCRFD implementation.
//!
//! SCRFD runs via ONNX Runtime with 3-stride anchor-free decoding and NMS.
//! The detection strategy picks the network input size, trading accuracy
//! on small faces for speed.

use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download from insightface and place in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Locates faces in an RGB frame.
pub trait Detector: Send {
    /// Detected faces, most confident first. An empty vec is not an error.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError>;
}

impl<T: Detector + ?Sized> Detector for Box<T> {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        (**self).detect(image)
    }
}

/// Speed/accuracy tradeoff for detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionStrategy {
    /// 320px network input. Misses small, distant faces.
    #[default]
    Fast,
    /// 640px network input.
    Accurate,
}

impl DetectionStrategy {
    pub fn input_size(self) -> usize {
        match self {
            DetectionStrategy::Fast => 320,
            DetectionStrategy::Accurate => 640,
        }
    }
}

impl FromStr for DetectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" | "hog" => Ok(DetectionStrategy::Fast),
            "accurate" | "cnn" => Ok(DetectionStrategy::Accurate),
            other => Err(format!(
                "unknown detection method '{other}' (expected 'fast' or 'accurate')"
            )),
        }
    }
}

impl fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetectionStrategy::Fast => "fast",
            DetectionStrategy::Accurate => "accurate",
        })
    }
}

/// Where a frame landed inside the square network input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, input: usize) -> (Self, u32, u32) {
        let scale = (input as f32 / width as f32).min(input as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, input as u32);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, input as u32);
        let letterbox = Letterbox {
            scale,
            pad_x: ((input as u32 - new_w) / 2) as f32,
            pad_y: ((input as u32 - new_h) / 2) as f32,
        };
        (letterbox, new_w, new_h)
    }

    /// Map a point from network input space back to frame space.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output tensor indices for one stride: (score, bbox, kps).
type StrideOutputs = (usize, usize, usize);

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    input_size: usize,
    stride_outputs: [StrideOutputs; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path, strategy: DetectionStrategy) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides × score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_outputs = map_stride_outputs(&output_names);
        tracing::info!(
            path = %model_path.display(),
            %strategy,
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        Ok(Self {
            session,
            input_size: strategy.input_size(),
            stride_outputs,
        })
    }

    fn preprocess(&self, image: &RgbImage) -> (Array4<f32>, Letterbox) {
        let size = self.input_size;
        let (letterbox, new_w, new_h) = Letterbox::fit(image.width(), image.height(), size);
        let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

        // Padding stays at 0.0, which is SCRFD_MEAN after normalization.
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        let (off_x, off_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (tx, ty) = (off_x + x as usize, off_y + y as usize);
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = (pixel[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
            }
        }

        (tensor, letterbox)
    }
}

impl Detector for FaceDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let (input, letterbox) = self.preprocess(image);
        let cells = self.input_size;
        let stride_outputs = self.stride_outputs;
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (slot, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = stride_outputs[slot];
            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[kps_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            let grid = StrideGrid {
                stride,
                cols: cells / stride,
                rows: cells / stride,
            };
            candidates.extend(grid.decode(scores, bboxes, kps, &letterbox));
        }

        let faces = suppress_overlaps(candidates, SCRFD_NMS_THRESHOLD);
        tracing::trace!(faces = faces.len(), "SCRFD detection");
        Ok(faces)
    }
}

/// Resolve which output tensors hold scores, boxes and keypoints per stride.
///
/// Exports either name them "score_8", "bbox_16", "kps_32", ... or use
/// opaque numeric names in the standard order [scores×3, bboxes×3, kps×3].
fn map_stride_outputs(names: &[String]) -> [StrideOutputs; 3] {
    let position = |kind: &str, stride: usize| {
        let wanted = format!("{kind}_{stride}");
        names.iter().position(|n| *n == wanted)
    };

    let named: Option<Vec<StrideOutputs>> = SCRFD_STRIDES
        .iter()
        .map(|&s| Some((position("score", s)?, position("bbox", s)?, position("kps", s)?)))
        .collect();

    match named {
        Some(found) => [found[0], found[1], found[2]],
        None => {
            tracing::debug!(?names, "SCRFD outputs unnamed, using positional mapping");
            [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
        }
    }
}

/// Anchor grid for one SCRFD stride.
struct StrideGrid {
    stride: usize,
    cols: usize,
    rows: usize,
}

impl StrideGrid {
    fn decode(
        &self,
        scores: &[f32],
        bboxes: &[f32],
        kps: &[f32],
        letterbox: &Letterbox,
    ) -> Vec<BoundingBox> {
        let stride = self.stride as f32;
        let anchors = self.rows * self.cols * SCRFD_ANCHORS_PER_CELL;

        (0..anchors.min(scores.len()))
            .filter(|&i| scores[i] > SCRFD_CONFIDENCE_THRESHOLD)
            .filter_map(|i| {
                let cell = i / SCRFD_ANCHORS_PER_CELL;
                let ax = (cell % self.cols) as f32 * stride;
                let ay = (cell / self.cols) as f32 * stride;

                let d = bboxes.get(i * 4..i * 4 + 4)?;
                let (x1, y1) = letterbox.unmap(ax - d[0] * stride, ay - d[1] * stride);
                let (x2, y2) = letterbox.unmap(ax + d[2] * stride, ay + d[3] * stride);

                let landmarks = kps.get(i * 10..i * 10 + 10).map(|k| {
                    std::array::from_fn(|p| {
                        letterbox.unmap(ax + k[p * 2] * stride, ay + k[p * 2 + 1] * stride)
                    })
                });

                Some(BoundingBox {
                    x: x1,
                    y: y1,
                    width: x2 - x1,
                    height: y2 - y1,
                    confidence: scores[i],
                    landmarks,
                })
            })
            .collect()
    }
}

/// Greedy non-maximum suppression; output sorted by confidence, highest first.
fn suppress_overlaps(mut candidates: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<BoundingBox> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
