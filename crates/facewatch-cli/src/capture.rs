//! Sample capture for building a dataset by hand.

use anyhow::{Context, Result};
use facewatch_hw::FrameSource;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Index for the next `imgNN.jpg` in `dir`: one past the highest existing.
pub fn next_index(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 1;
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| parse_index(&e.file_name().to_string_lossy()))
        .max()
        .map_or(1, |n| n + 1)
}

fn parse_index(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix("img")?
        .strip_suffix(".jpg")?
        .parse()
        .ok()
}

pub fn sample_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("img{index:02}.jpg"))
}

/// Save one frame per input line until `q` or end of input. Returns the
/// saved paths.
pub fn capture_samples<R: BufRead>(
    source: &mut dyn FrameSource,
    dir: &Path,
    input: R,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut index = next_index(dir);
    let mut saved = Vec::new();

    for line in input.lines() {
        let line = line.context("failed to read input")?;
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }

        let frame = source.capture()?;
        let path = sample_path(dir, index);
        frame
            .image
            .save(&path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        println!("Photo captured and saved as '{}'", path.display());
        tracing::info!(path = %path.display(), "sample saved");

        saved.push(path);
        index += 1;
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facewatch_hw::ImageFolderSource;
    use image::RgbImage;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_next_index() {
        let dir = TempDir::new().unwrap();
        assert_eq!(next_index(dir.path()), 1);
        assert_eq!(next_index(&dir.path().join("missing")), 1);

        for name in ["img01.jpg", "img07.jpg", "img100.jpg", "imgX.jpg", "img03.png"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        assert_eq!(next_index(dir.path()), 101);
    }

    #[test]
    fn test_sample_path_padding() {
        assert_eq!(sample_path(Path::new("d"), 3), PathBuf::from("d/img03.jpg"));
        assert_eq!(sample_path(Path::new("d"), 123), PathBuf::from("d/img123.jpg"));
    }

    #[test]
    fn test_capture_until_quit() {
        let frames = TempDir::new().unwrap();
        RgbImage::new(8, 8).save(frames.path().join("a.png")).unwrap();
        let mut source = ImageFolderSource::open(frames.path()).unwrap();

        let out = TempDir::new().unwrap();
        let dir = out.path().join("alice");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("img04.jpg"), b"").unwrap();

        let saved = capture_samples(&mut source, &dir, &b"\n\nq\n\n"[..]).unwrap();
        assert_eq!(saved, vec![dir.join("img05.jpg"), dir.join("img06.jpg")]);
        assert!(saved.iter().all(|p| p.is_file()));
    }
}
