//! Frame type and image preparation: YUYV conversion, brightness/contrast,
//! rotation, resizing, JPEG encoding.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u32,
    pub timestamp: std::time::Instant,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u32) -> Self {
        Self {
            image,
            sequence,
            timestamp: std::time::Instant::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Convert packed YUYV (4:2:2, BT.601 limited range) to RGB.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (u, v) = (chunk[1] as i32 - 128, chunk[3] as i32 - 128);
        for y in [chunk[0], chunk[2]] {
            let c = 298 * (y as i32 - 16);
            let channel = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
            rgb.push(channel(c + 409 * v));
            rgb.push(channel(c - 100 * u - 208 * v));
            rgb.push(channel(c + 516 * u));
        }
    }

    // Length is exactly width * height * 3 by construction.
    RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        expected,
        actual: yuyv.len(),
    })
}

/// Rotation applied to every captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Rotate180,
    CounterClockwise90,
}

impl Rotation {
    /// `0` = 90° clockwise, `1` = 180°, `2` = 90° counter-clockwise;
    /// anything else (conventionally `-1`) means no rotation.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Rotation::Clockwise90,
            1 => Rotation::Rotate180,
            2 => Rotation::CounterClockwise90,
            _ => Rotation::None,
        }
    }

    pub fn apply(self, image: RgbImage) -> RgbImage {
        match self {
            Rotation::None => image,
            Rotation::Clockwise90 => imageops::rotate90(&image),
            Rotation::Rotate180 => imageops::rotate180(&image),
            Rotation::CounterClockwise90 => imageops::rotate270(&image),
        }
    }
}

/// `out = px * (1 + contrast / 100) + brightness`, saturating.
pub fn adjust_brightness_contrast(image: &mut RgbImage, brightness: f32, contrast: f32) {
    if brightness == 0.0 && contrast == 0.0 {
        return;
    }
    let gain = 1.0 + contrast / 100.0;
    for value in image.iter_mut() {
        *value = (*value as f32 * gain + brightness).round().clamp(0.0, 255.0) as u8;
    }
}

/// Resize to `width` keeping the aspect ratio. `None` when no resize is
/// needed (width 0 or already that wide).
pub fn resize_to_width(image: &RgbImage, width: u32) -> Option<RgbImage> {
    if width == 0 || width == image.width() || image.width() == 0 {
        return None;
    }
    let ratio = width as f32 / image.width() as f32;
    let height = ((image.height() as f32 * ratio) as u32).max(1);
    Some(imageops::resize(image, width, height, FilterType::Triangle))
}

/// Per-frame preparation settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramePrep {
    pub brightness: f32,
    pub contrast: f32,
    pub rotation: Rotation,
    /// Width detection runs at; 0 keeps the captured width.
    pub process_width: u32,
}

/// A frame after preparation.
pub struct PreparedFrame {
    /// Adjusted and rotated, at capture resolution.
    pub full: RgbImage,
    /// Downscaled copy for detection, when a resize was needed.
    scaled: Option<RgbImage>,
}

impl PreparedFrame {
    /// The image detection should run on.
    pub fn processed(&self) -> &RgbImage {
        self.scaled.as_ref().unwrap_or(&self.full)
    }
}

impl FramePrep {
    pub fn prepare(&self, mut image: RgbImage) -> PreparedFrame {
        adjust_brightness_contrast(&mut image, self.brightness, self.contrast);
        let full = self.rotation.apply(image);
        let scaled = resize_to_width(&full, self.process_width);
        PreparedFrame { full, scaled }
    }
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, FrameError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(image)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_yuyv_to_rgb_black_and_white() {
        // 2x1 image: white (Y=235) then black (Y=16), neutral chroma.
        let yuyv = vec![235, 128, 16, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_yuyv_to_rgb_red_dominant() {
        let yuyv = vec![82, 90, 82, 240];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        let p = rgb.get_pixel(0, 0);
        assert!(p[0] > 200 && p[1] < 40 && p[2] < 40, "{p:?}");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let result = yuyv_to_rgb(&[100, 128], 2, 1);
        assert!(matches!(result, Err(FrameError::InvalidLength { expected: 4, actual: 2 })));
    }

    #[test]
    fn test_rotation_codes() {
        assert_eq!(Rotation::from_code(-1), Rotation::None);
        assert_eq!(Rotation::from_code(0), Rotation::Clockwise90);
        assert_eq!(Rotation::from_code(1), Rotation::Rotate180);
        assert_eq!(Rotation::from_code(2), Rotation::CounterClockwise90);
        assert_eq!(Rotation::from_code(7), Rotation::None);
    }

    #[test]
    fn test_rotation_dimensions_and_corner() {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));

        let cw = Rotation::Clockwise90.apply(image.clone());
        assert_eq!(cw.dimensions(), (2, 4));
        // Top-left moves to top-right when rotating clockwise.
        assert_eq!(cw.get_pixel(1, 0), &Rgb([255, 0, 0]));

        let flipped = Rotation::Rotate180.apply(image.clone());
        assert_eq!(flipped.get_pixel(3, 1), &Rgb([255, 0, 0]));

        let ccw = Rotation::CounterClockwise90.apply(image);
        assert_eq!(ccw.get_pixel(0, 3), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_brightness_contrast() {
        let mut image = RgbImage::from_pixel(1, 1, Rgb([100, 200, 10]));
        adjust_brightness_contrast(&mut image, 10.0, 50.0);
        // 100*1.5+10 = 160, 200*1.5+10 saturates, 10*1.5+10 = 25
        assert_eq!(image.get_pixel(0, 0), &Rgb([160, 255, 25]));

        let mut darker = RgbImage::from_pixel(1, 1, Rgb([5, 5, 5]));
        adjust_brightness_contrast(&mut darker, -20.0, 0.0);
        assert_eq!(darker.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_resize_to_width() {
        let image = RgbImage::new(1920, 1080);
        let small = resize_to_width(&image, 500).unwrap();
        assert_eq!(small.dimensions(), (500, 281));
        assert!(resize_to_width(&image, 0).is_none());
        assert!(resize_to_width(&image, 1920).is_none());
    }

    #[test]
    fn test_prepare_keeps_full_frame() {
        let prep = FramePrep {
            rotation: Rotation::Clockwise90,
            process_width: 50,
            ..FramePrep::default()
        };
        let prepared = prep.prepare(RgbImage::new(200, 100));
        assert_eq!(prepared.full.dimensions(), (100, 200));
        assert_eq!(prepared.processed().dimensions(), (50, 100));

        let passthrough = FramePrep::default().prepare(RgbImage::new(20, 10));
        assert_eq!(passthrough.processed().dimensions(), (20, 10));
    }

    #[test]
    fn test_encode_jpeg_magic() {
        let jpeg = encode_jpeg(&RgbImage::new(16, 16), 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
