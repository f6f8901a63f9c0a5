use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facewatch_core::{DetectionStrategy, EncodingDatabase, Enroller, ModelPaths};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod capture;

#[derive(Parser)]
#[command(name = "facewatch", version, about = "facewatch dataset and encoding tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode every face in a dataset tree into an encoding database
    Encode {
        /// Dataset root: one directory per person
        #[arg(short, long, env = "FACEWATCH_DATASET", default_value = "dataset")]
        dataset: PathBuf,
        /// Output database path
        #[arg(short, long, env = "FACEWATCH_ENCODINGS", default_value = "model/encodings.json")]
        encodings: PathBuf,
        /// Directory containing the ONNX model files
        #[arg(long, env = "FACEWATCH_MODEL_DIR")]
        model_dir: Option<PathBuf>,
        /// Face detection strategy: fast (hog) or accurate (cnn)
        #[arg(long, env = "FACEWATCH_DETECTION_METHOD", default_value = "fast")]
        detection_method: DetectionStrategy,
    },
    /// Capture sample photos of one person: Enter saves, q quits
    Capture {
        /// Person's name; samples go to <dataset>/<name>/
        #[arg(short, long)]
        name: String,
        #[arg(short, long, env = "FACEWATCH_DATASET", default_value = "dataset")]
        dataset: PathBuf,
        /// V4L2 device path, or a directory of images to replay
        #[arg(long, env = "FACEWATCH_SOURCE", default_value = "/dev/video0")]
        source: String,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
    },
    /// Summarize an encoding database
    List {
        #[arg(short, long, env = "FACEWATCH_ENCODINGS", default_value = "model/encodings.json")]
        encodings: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            dataset,
            encodings,
            model_dir,
            detection_method,
        } => {
            let model_dir = model_dir.unwrap_or_else(facewatch_core::default_model_dir);
            encode(&dataset, &encodings, &model_dir, detection_method)?;
        }
        Commands::Capture {
            name,
            dataset,
            source,
            width,
            height,
        } => {
            let mut source = facewatch_hw::open_source(&source, width, height)
                .with_context(|| format!("failed to open frame source {source}"))?;
            let dir = dataset.join(&name);
            println!("Press Enter to capture a photo of {name}, q to quit.");
            let saved = capture::capture_samples(source.as_mut(), &dir, std::io::stdin().lock())?;
            println!("Saved {} photo(s) to {}", saved.len(), dir.display());
        }
        Commands::List { encodings } => {
            let db = EncodingDatabase::load(&encodings)
                .with_context(|| format!("failed to load {}", encodings.display()))?;
            println!("{}", serde_json::to_string_pretty(&summary(&db))?);
        }
    }

    Ok(())
}

fn encode(
    dataset: &Path,
    encodings: &Path,
    model_dir: &Path,
    strategy: DetectionStrategy,
) -> Result<()> {
    let (detector, recognizer) = ModelPaths::in_dir(model_dir)
        .load(strategy)
        .with_context(|| format!("failed to load models from {}", model_dir.display()))?;

    let (db, report) = Enroller::new(detector, recognizer)
        .enroll_dir(dataset)
        .with_context(|| format!("failed to enroll {}", dataset.display()))?;

    if let Some(parent) = encodings.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    db.save(encodings)
        .with_context(|| format!("failed to write {}", encodings.display()))?;

    println!(
        "Encoded {} image(s), skipped {}, wrote {} record(s) for {} label(s) to {}",
        report.images,
        report.skipped,
        report.records,
        report.labels.len(),
        encodings.display()
    );
    for label in &report.labels {
        println!("  {label}");
    }
    Ok(())
}

fn summary(db: &EncodingDatabase) -> serde_json::Value {
    serde_json::json!({
        "records": db.len(),
        "dimension": db.dimension(),
        "created_at": db.created_at.to_rfc3339(),
        "labels": db.label_counts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use facewatch_core::{Embedding, EnrollmentRecord};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_summary_counts_labels() {
        let mut db = EncodingDatabase::new();
        db.push(EnrollmentRecord::new("bob", Embedding::new(vec![0.1, 0.2])));
        db.push(EnrollmentRecord::new("alice", Embedding::new(vec![0.3, 0.4])));
        db.push(EnrollmentRecord::new("bob", Embedding::new(vec![0.5, 0.6])));

        let value = summary(&db);
        assert_eq!(value["records"], 3);
        assert_eq!(value["dimension"], 2);
        assert_eq!(value["labels"]["alice"], 1);
        assert_eq!(value["labels"]["bob"], 2);
    }

    #[test]
    fn test_parse_encode_args() {
        let cli = Cli::try_parse_from([
            "facewatch",
            "encode",
            "--dataset",
            "faces",
            "--detection-method",
            "cnn",
        ])
        .unwrap();
        let Commands::Encode {
            dataset,
            detection_method,
            ..
        } = cli.command
        else {
            panic!("expected encode");
        };
        assert_eq!(dataset, PathBuf::from("faces"));
        assert_eq!(detection_method, DetectionStrategy::Accurate);
    }
}
