use clap::{ArgAction, Parser};
use facewatch_core::{DetectionStrategy, MatchPolicy};
use facewatch_hw::{FramePrep, Rotation};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Daemon configuration: command-line flags with `FACEWATCH_*` environment
/// fallbacks.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "facewatchd",
    version,
    about = "Watch a camera and emit login/logout events for recognized faces"
)]
pub struct Config {
    /// Path to the serialized encoding database.
    #[arg(long, env = "FACEWATCH_ENCODINGS", default_value = "model/encodings.json")]
    pub encodings: PathBuf,

    /// Directory containing the ONNX model files.
    #[arg(long, env = "FACEWATCH_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Face detection strategy: fast (hog) or accurate (cnn).
    #[arg(long, env = "FACEWATCH_DETECTION_METHOD", default_value = "fast")]
    pub detection_method: DetectionStrategy,

    /// Identity matching policy: distance or vote.
    #[arg(long, env = "FACEWATCH_MATCH_POLICY", default_value = "distance")]
    pub match_policy: MatchPolicy,

    /// Maximum embedding distance for a positive match (distance policy).
    #[arg(long, env = "FACEWATCH_TOLERANCE", default_value_t = facewatch_core::DEFAULT_TOLERANCE)]
    pub tolerance: f32,

    /// V4L2 device path, or a directory of images to replay.
    #[arg(long, env = "FACEWATCH_SOURCE", default_value = "/dev/video0")]
    pub source: String,

    /// Requested capture resolution as WIDTH,HEIGHT.
    #[arg(long, env = "FACEWATCH_RESOLUTION", default_value = "1920,1080")]
    pub resolution: Resolution,

    /// Width frames are resized to before detection; 0 disables resizing.
    #[arg(long, env = "FACEWATCH_PROCESS_WIDTH", default_value_t = 500)]
    pub process_width: u32,

    #[arg(long, env = "FACEWATCH_BRIGHTNESS", default_value_t = 0.0, allow_negative_numbers = true)]
    pub brightness: f32,

    #[arg(long, env = "FACEWATCH_CONTRAST", default_value_t = 0.0, allow_negative_numbers = true)]
    pub contrast: f32,

    /// -1 none, 0 = 90° clockwise, 1 = 180°, 2 = 90° counter-clockwise.
    #[arg(long, env = "FACEWATCH_ROTATE", default_value_t = -1, allow_negative_numbers = true)]
    pub rotate: i32,

    /// Milliseconds between recognition cycles.
    #[arg(long, env = "FACEWATCH_INTERVAL", default_value_t = 2000)]
    pub interval: u64,

    /// Save frames of newly logged-in people into the dataset.
    #[arg(
        long,
        env = "FACEWATCH_EXTEND_DATASET",
        default_value = "false",
        value_parser = parse_bool,
        action = ArgAction::Set
    )]
    pub extend_dataset: bool,

    /// Dataset root used by --extend-dataset.
    #[arg(long, env = "FACEWATCH_DATASET", default_value = "dataset")]
    pub dataset: PathBuf,

    /// Emit annotated frames as camera_image events.
    #[arg(
        long,
        env = "FACEWATCH_OUTPUT_MM",
        default_value = "false",
        value_parser = parse_bool,
        action = ArgAction::Set
    )]
    pub output_mm: bool,

    /// Write the annotated frame to this JPEG file every cycle.
    #[arg(long, env = "FACEWATCH_PREVIEW")]
    pub preview: Option<PathBuf>,

    /// Only recognize between `start` and `stop` lines on stdin.
    #[arg(
        long,
        env = "FACEWATCH_RUN_ONLY_ON_NOTIFICATION",
        default_value = "false",
        value_parser = parse_bool,
        action = ArgAction::Set
    )]
    pub run_only_on_notification: bool,
}

impl Config {
    pub fn model_dir(&self) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(facewatch_core::default_model_dir)
    }

    pub fn frame_prep(&self) -> FramePrep {
        FramePrep {
            brightness: self.brightness,
            contrast: self.contrast,
            rotation: Rotation::from_code(self.rotate),
            process_width: self.process_width,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }
}

/// Capture resolution parsed from `WIDTH,HEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(',')
            .ok_or_else(|| format!("expected WIDTH,HEIGHT, got '{s}'"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("invalid dimension '{v}' in '{s}'"))
        };
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.width, self.height)
    }
}

/// Accepts yes/true/t/y/1 and no/false/f/n/0, case-insensitive.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(true),
        "no" | "false" | "f" | "n" | "0" => Ok(false),
        other => Err(format!("boolean value expected, got '{other}'")),
    }
}
