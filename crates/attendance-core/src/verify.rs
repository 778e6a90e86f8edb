//! Re-check a saved capture: the face must still be detectable and encodable
//! after the frame went through JPEG encoding on disk.

use crate::detector::{DetectorError, FaceDetector};
use crate::encoder::{EncoderError, FaceEncoder};
use crate::types::Embedding;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("could not read image {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no face detected in saved image")]
    NoFaceDetected,
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("face encoding failed: {0}")]
    Embedding(#[from] EncoderError),
}

/// Open the image at `path`, detect faces and encode the most confident one.
pub fn verify_face_image<D, E>(path: &Path, detector: &mut D, encoder: &mut E) -> Result<Embedding, VerifyError>
where
    D: FaceDetector + ?Sized,
    E: FaceEncoder + ?Sized,
{
    let image = image::open(path)
        .map_err(|source| VerifyError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma8();

    let regions = detector.detect(&image)?;
    let best = regions.first().ok_or(VerifyError::NoFaceDetected)?;
    tracing::debug!(faces = regions.len(), confidence = best.confidence, "saved image re-detected");

    let embedding = encoder.encode(&image, best)?;
    tracing::info!(path = %path.display(), dim = embedding.dim(), "face successfully encoded");
    Ok(embedding)
}
