//! Annotated frame output: `camera_image` events and the preview file.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use facewatch_core::{Event, RecognizedFace};
use facewatch_hw::frame::{encode_jpeg, FrameError};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;
const JPEG_QUALITY: u8 = 80;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Encode(#[from] FrameError),
    #[error("failed to write preview {path}: {source}")]
    Preview {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Turns a processed frame and its faces into output.
pub trait Renderer: Send {
    /// Returns an event to emit, if this renderer streams frames.
    fn render(
        &mut self,
        image: &RgbImage,
        faces: &[RecognizedFace],
    ) -> Result<Option<Event>, RenderError>;
}

/// Draws face boxes, then streams the JPEG as a `camera_image` event and/or
/// writes it to a preview file.
#[derive(Debug, Default)]
pub struct FrameRenderer {
    stream: bool,
    preview: Option<PathBuf>,
}

impl FrameRenderer {
    pub fn new(stream: bool, preview: Option<PathBuf>) -> Self {
        Self { stream, preview }
    }

    fn is_enabled(&self) -> bool {
        self.stream || self.preview.is_some()
    }

    fn write_preview(path: &Path, jpeg: &[u8]) -> Result<(), RenderError> {
        let err = |source: std::io::Error| RenderError::Preview {
            path: path.to_path_buf(),
            source,
        };
        // Write beside and rename so viewers never see a half-written file.
        let tmp = path.with_extension("jpg.tmp");
        std::fs::write(&tmp, jpeg).map_err(err)?;
        std::fs::rename(&tmp, path).map_err(err)
    }
}

impl Renderer for FrameRenderer {
    fn render(
        &mut self,
        image: &RgbImage,
        faces: &[RecognizedFace],
    ) -> Result<Option<Event>, RenderError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let mut annotated = image.clone();
        for face in faces {
            draw_box(&mut annotated, face);
        }
        let jpeg = encode_jpeg(&annotated, JPEG_QUALITY)?;

        if let Some(path) = &self.preview {
            Self::write_preview(path, &jpeg)?;
        }

        Ok(self.stream.then(|| Event::CameraImage {
            image: STANDARD.encode(&jpeg),
        }))
    }
}

/// Outline a face box, clipped to the image.
pub fn draw_box(image: &mut RgbImage, face: &RecognizedFace) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let clamp_x = |v: f32| (v.max(0.0) as u32).min(w - 1);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(h - 1);
    let bbox = &face.bbox;
    let (x0, y0) = (clamp_x(bbox.x), clamp_y(bbox.y));
    let (x1, y1) = (clamp_x(bbox.x + bbox.width), clamp_y(bbox.y + bbox.height));

    for t in 0..BOX_THICKNESS {
        for x in x0..=x1 {
            image.put_pixel(x, (y0 + t).min(y1), BOX_COLOR);
            image.put_pixel(x, y1.saturating_sub(t).max(y0), BOX_COLOR);
        }
        for y in y0..=y1 {
            image.put_pixel((x0 + t).min(x1), y, BOX_COLOR);
            image.put_pixel(x1.saturating_sub(t).max(x0), y, BOX_COLOR);
        }
    }
}
