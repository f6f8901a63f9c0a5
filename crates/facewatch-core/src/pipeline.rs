//! Detect → encode → match over one image.

use crate::detector::{Detector, DetectorError};
use crate::matcher::Matcher;
use crate::recognizer::{Encoder, RecognizerError};
use crate::types::{BoundingBox, Embedding, EnrollmentRecord, RecognizedFace};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// One embedding per detected face. No faces means an empty vec.
pub fn encode_faces<D, E>(
    detector: &mut D,
    encoder: &mut E,
    image: &RgbImage,
) -> Result<Vec<(BoundingBox, Embedding)>, PipelineError>
where
    D: Detector + ?Sized,
    E: Encoder + ?Sized,
{
    let faces = detector.detect(image)?;
    let mut encoded = Vec::with_capacity(faces.len());
    for face in faces {
        let embedding = encoder.encode(image, &face)?;
        encoded.push((face, embedding));
    }
    Ok(encoded)
}

/// Locate, encode and identify every face in `image`.
pub fn recognize_faces<D, E>(
    detector: &mut D,
    encoder: &mut E,
    matcher: &dyn Matcher,
    gallery: &[EnrollmentRecord],
    image: &RgbImage,
) -> Result<Vec<RecognizedFace>, PipelineError>
where
    D: Detector + ?Sized,
    E: Encoder + ?Sized,
{
    let recognized = encode_faces(detector, encoder, image)?
        .into_iter()
        .map(|(bbox, embedding)| RecognizedFace {
            identity: matcher.identify(&embedding, gallery),
            bbox,
        })
        .collect();
    Ok(recognized)
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Deterministic stand-ins for the ONNX models.
    //!
    //! Faces are "found" at every pixel whose red channel is 255; the
    //! embedding is that pixel's green and blue channels scaled to [0, 1].

    use super::*;
    use image::Rgb;

    pub struct MarkerDetector;

    impl Detector for MarkerDetector {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
            Ok(image
                .enumerate_pixels()
                .filter(|(_, _, p)| p[0] == 255)
                .map(|(x, y, _)| BoundingBox {
                    x: x as f32,
                    y: y as f32,
                    width: 1.0,
                    height: 1.0,
                    confidence: 1.0,
                    landmarks: None,
                })
                .collect())
        }
    }

    pub struct MarkerEncoder;

    impl Encoder for MarkerEncoder {
        fn encode(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, RecognizerError> {
            let p = image.get_pixel(face.x as u32, face.y as u32);
            Ok(Embedding::new(vec![p[1] as f32 / 255.0, p[2] as f32 / 255.0]))
        }
    }

    pub fn marker(image: &mut RgbImage, x: u32, y: u32, g: u8, b: u8) {
        image.put_pixel(x, y, Rgb([255, g, b]));
    }
}
