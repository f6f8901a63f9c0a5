//! Frame sources: anything the recognition loop can pull frames from.

use crate::camera::{Camera, CameraError};
use crate::frame::Frame;
use std::path::{Path, PathBuf};

/// A blocking supplier of frames.
pub trait FrameSource: Send {
    /// Block until the next frame is available.
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// Recognition was paused; release what can be released.
    fn pause(&mut self) {}

    /// Recognition resumed after [`pause`](Self::pause).
    fn resume(&mut self) {}

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

impl FrameSource for Camera {
    fn capture(&mut self) -> Result<Frame, CameraError> {
        self.capture_frame()
    }

    fn describe(&self) -> String {
        format!("{} ({}x{} {:?})", self.device_path, self.width, self.height, self.fourcc)
    }
}

const FOLDER_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Replays the images of a directory in sorted order, looping forever.
///
/// Stands in for a camera on machines without one.
pub struct ImageFolderSource {
    dir: PathBuf,
    images: Vec<PathBuf>,
    next: usize,
    sequence: u32,
}

impl ImageFolderSource {
    pub fn open(dir: &Path) -> Result<Self, CameraError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::DeviceNotFound(format!("{}: {e}", dir.display())))?;

        let mut images: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| FOLDER_EXTENSIONS.iter().any(|k| e.eq_ignore_ascii_case(k)))
            })
            .collect();
        images.sort();

        if images.is_empty() {
            return Err(CameraError::EmptySource(dir.display().to_string()));
        }
        tracing::info!(dir = %dir.display(), images = images.len(), "replaying image folder");

        Ok(Self {
            dir: dir.to_path_buf(),
            images,
            next: 0,
            sequence: 0,
        })
    }
}

impl FrameSource for ImageFolderSource {
    fn capture(&mut self) -> Result<Frame, CameraError> {
        let path = &self.images[self.next];
        self.next = (self.next + 1) % self.images.len();

        let image = image::open(path)
            .map_err(|e| CameraError::CaptureFailed(format!("{}: {e}", path.display())))?
            .to_rgb8();
        self.sequence = self.sequence.wrapping_add(1);
        Ok(Frame::new(image, self.sequence))
    }

    fn describe(&self) -> String {
        format!("{} ({} images)", self.dir.display(), self.images.len())
    }
}

/// Open a frame source by name: a directory replays its images, anything
/// else is treated as a V4L2 device path.
pub fn open_source(source: &str, width: u32, height: u32) -> Result<Box<dyn FrameSource>, CameraError> {
    let path = Path::new(source);
    if path.is_dir() {
        Ok(Box::new(ImageFolderSource::open(path)?))
    } else {
        Ok(Box::new(Camera::open(source, width, height)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_folder_source_cycles_in_order() {
        let dir = TempDir::new().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([10, 0, 0])).save(dir.path().join("a.png")).unwrap();
        RgbImage::from_pixel(4, 4, Rgb([20, 0, 0])).save(dir.path().join("b.png")).unwrap();
        std::fs::write(dir.path().join("readme.txt"), "skip me").unwrap();

        let mut source = ImageFolderSource::open(dir.path()).unwrap();
        let reds: Vec<u8> = (0..3)
            .map(|_| source.capture().unwrap().image.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(reds, vec![10, 20, 10]);
        assert!(source.describe().contains("2 images"));
    }

    #[test]
    fn test_folder_source_empty_dir() {
        let dir = TempDir::new().unwrap();
        let err = ImageFolderSource::open(dir.path()).err().unwrap();
        assert!(matches!(err, CameraError::EmptySource(_)));
    }

    #[test]
    fn test_open_source_missing_device() {
        let err = open_source("/dev/facewatch-missing", 640, 480).err().unwrap();
        assert!(matches!(err, CameraError::DeviceNotFound(_)));
    }
}
