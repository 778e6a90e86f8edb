//! ArcFace face encoder via ONNX Runtime.
//!
//! Crops a detected region, resizes it to 112×112 and extracts a
//! 512-dimensional L2-normalized embedding with the w600k_r50 model.

use crate::types::{Embedding, FaceRegion};
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ARCFACE_INPUT_SIZE: u32 = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5;
const ARCFACE_EMBEDDING_DIM: usize = 512;
const ARCFACE_MODEL_VERSION: &str = "w600k_r50";

/// File name of the ArcFace model inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("model file not found: {0} — download w600k_r50.onnx from insightface")]
    ModelNotFound(String),
    #[error("face region lies outside the image")]
    EmptyRegion,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces an embedding for one face region of an image.
pub trait FaceEncoder {
    fn encode(&mut self, image: &GrayImage, region: &FaceRegion) -> Result<Embedding, EncoderError>;
}

pub struct ArcFaceEncoder {
    session: Session,
}

impl ArcFaceEncoder {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, EncoderError> {
        if !model_path.exists() {
            return Err(EncoderError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }
}

impl FaceEncoder for ArcFaceEncoder {
    fn encode(&mut self, image: &GrayImage, region: &FaceRegion) -> Result<Embedding, EncoderError> {
        let crop = crop_face(image, region)?;
        let input = face_tensor(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(EncoderError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding {
            values: l2_normalize(raw),
            model_version: Some(ARCFACE_MODEL_VERSION.to_string()),
        })
    }
}

/// Cut the region out of the image and resize it to the ArcFace input size.
fn crop_face(image: &GrayImage, region: &FaceRegion) -> Result<GrayImage, EncoderError> {
    let (x, y, w, h) = region
        .clamped_rect(image.width(), image.height())
        .ok_or(EncoderError::EmptyRegion)?;
    let crop = imageops::crop_imm(image, x, y, w, h).to_image();
    Ok(imageops::resize(&crop, ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE, FilterType::Triangle))
}

/// Normalize a 112×112 grayscale crop into a 1×3×112×112 tensor.
fn face_tensor(face: &GrayImage) -> Array4<f32> {
    let size = ARCFACE_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in face.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= size || y >= size {
            continue;
        }
        let value = (pixel.0[0] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
        for channel in 0..3 {
            tensor[[0, channel, y, x]] = value;
        }
    }

    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|v| v / norm).collect()
    } else {
        raw.to_vec()
    }
}
