//! facewatch-hw — Frame acquisition and preparation.
//!
//! Provides V4L2-based camera access, an image-folder replay source, and the
//! per-frame brightness/contrast, rotation and resize steps.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, PixelFormat};
pub use frame::{Frame, FramePrep, PreparedFrame, Rotation};
pub use source::{open_source, FrameSource, ImageFolderSource};
