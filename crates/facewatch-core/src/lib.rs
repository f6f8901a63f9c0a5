//! facewatch-core — enrollment database, identity matching and session tracking.
//!
//! Face detection (SCRFD) and encoding (ArcFace) run via ONNX Runtime behind
//! the [`Detector`] and [`Encoder`] traits, so everything above them can be
//! driven by fakes in tests.

pub mod alignment;
pub mod database;
pub mod detector;
pub mod enroll;
pub mod event;
pub mod matcher;
pub mod models;
pub mod pipeline;
pub mod recognizer;
pub mod session;
pub mod types;

pub use database::{DatabaseError, EncodingDatabase};
pub use detector::{DetectionStrategy, Detector, DetectorError, FaceDetector};
pub use enroll::{EnrollError, EnrollReport, Enroller};
pub use event::{Event, EventWriter};
pub use matcher::{DistanceMatcher, MatchPolicy, Matcher, VoteMatcher, DEFAULT_TOLERANCE};
pub use models::{default_model_dir, ModelPaths};
pub use pipeline::{encode_faces, recognize_faces, PipelineError};
pub use recognizer::{
    Encoder, FaceRecognizer, RecognizerError, ARCFACE_EMBEDDING_DIM, ARCFACE_MODEL_VERSION,
};
pub use session::{SessionDiff, SessionTracker};
pub use types::{BoundingBox, Embedding, EnrollmentRecord, Identification, RecognizedFace, UNKNOWN_LABEL};
