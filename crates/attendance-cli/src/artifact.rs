//! Captured face images on disk: `<images_dir>/<name>_<YYYYMMDD_HHMMSS>.jpg`.

use attendance_core::AttendeeName;
use chrono::NaiveDateTime;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub fn image_file_name(name: &AttendeeName, at: NaiveDateTime) -> String {
    format!("{}_{}.jpg", name.file_stem(), at.format("%Y%m%d_%H%M%S"))
}

/// Create `dir` if missing. Returns true when it had to be created.
pub fn ensure_directory(dir: &Path) -> Result<bool, ArtifactError> {
    if dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir).map_err(|source| ArtifactError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %dir.display(), "created images directory");
    Ok(true)
}

/// Write `image` as JPEG under `images_dir`, returning the file path.
pub fn save_capture(
    images_dir: &Path,
    name: &AttendeeName,
    image: &DynamicImage,
    at: NaiveDateTime,
) -> Result<PathBuf, ArtifactError> {
    if ensure_directory(images_dir)? {
        println!("Created '{}' directory.", images_dir.display());
    }

    let path = images_dir.join(image_file_name(name, at));
    image
        .to_rgb8()
        .save_with_format(&path, ImageFormat::Jpeg)
        .map_err(|source| ArtifactError::Write {
            path: path.clone(),
            source,
        })?;

    tracing::debug!(path = %path.display(), width = image.width(), height = image.height(), "capture saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_image_file_name() {
        let name = AttendeeName::parse("ALICE").unwrap();
        assert_eq!(image_file_name(&name, at()), "alice_20240601_093000.jpg");
    }

    #[test]
    fn test_save_capture_creates_directory() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("images");
        let name = AttendeeName::parse("Bob Lee").unwrap();
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 24, Luma([200])));

        let path = save_capture(&images, &name, &image, at()).unwrap();

        assert_eq!(path, images.join("bob lee_20240601_093000.jpg"));
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (32, 24));
    }

    #[test]
    fn test_ensure_directory_existing() {
        let dir = TempDir::new().unwrap();
        assert!(!ensure_directory(dir.path()).unwrap());
    }
}
