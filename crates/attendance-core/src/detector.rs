//! SCRFD face detector via ONNX Runtime.
//!
//! The frame is letterboxed into a 640×640 input, run through the SCRFD
//! network, and the per-stride score/box outputs are decoded into
//! [`FaceRegion`]s in source-image coordinates, followed by NMS.

use crate::types::FaceRegion;
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [u32; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// File name of the SCRFD model inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download det_10g.onnx from insightface")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Finds face regions in a grayscale image.
pub trait FaceDetector {
    /// Regions sorted by descending confidence; empty when no face is visible.
    fn detect(&mut self, image: &GrayImage) -> Result<Vec<FaceRegion>, DetectorError>;
}

/// Mapping from letterboxed model space back to the source image.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let scaled_w = (width as f32 * scale).round();
        let scaled_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((target as f32 - scaled_w) / 2.0).floor(),
            pad_y: ((target as f32 - scaled_h) / 2.0).floor(),
        }
    }

    fn scaled_size(&self, width: u32, height: u32) -> (u32, u32) {
        (
            ((width as f32 * self.scale).round() as u32).max(1),
            ((height as f32 * self.scale).round() as u32).max(1),
        )
    }

    fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output positions of the score and box tensors for one stride.
type StrideOutputs = (usize, usize);

pub struct ScrfdDetector {
    session: Session,
    outputs: [StrideOutputs; 3],
}

impl ScrfdDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if names.len() < 6 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model needs score and bbox outputs for 3 strides, got {} outputs",
                names.len()
            )));
        }

        let outputs = locate_outputs(&names);
        tracing::info!(path = %model_path.display(), outputs = ?names, mapping = ?outputs, "loaded SCRFD model");

        Ok(Self { session, outputs })
    }
}

impl FaceDetector for ScrfdDetector {
    fn detect(&mut self, image: &GrayImage) -> Result<Vec<FaceRegion>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let (input, letterbox) = letterbox_tensor(image);
        let results = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (&(score_idx, bbox_idx), &stride) in self.outputs.iter().zip(SCRFD_STRIDES.iter()) {
            let (_, scores) = results[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, boxes) = results[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("boxes stride {stride}: {e}")))?;

            candidates.extend(decode_stride(scores, boxes, stride, &letterbox));
        }

        let regions = suppress_overlaps(candidates, SCRFD_NMS_THRESHOLD);
        tracing::trace!(count = regions.len(), "SCRFD detections");
        Ok(regions)
    }
}

/// Letterbox a grayscale image into a normalized 1×3×640×640 tensor.
fn letterbox_tensor(image: &GrayImage) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let letterbox = Letterbox::fit(width, height, SCRFD_INPUT_SIZE);
    let (scaled_w, scaled_h) = letterbox.scaled_size(width, height);
    let scaled = imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle);

    let size = SCRFD_INPUT_SIZE as usize;
    // Padding stays at 0.0, which is what the mean pixel normalizes to.
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    let (off_x, off_y) = (letterbox.pad_x as u32, letterbox.pad_y as u32);

    for (x, y, pixel) in scaled.enumerate_pixels() {
        let tx = (x + off_x) as usize;
        let ty = (y + off_y) as usize;
        if tx >= size || ty >= size {
            continue;
        }
        let value = (pixel.0[0] as f32 - SCRFD_MEAN) / SCRFD_STD;
        for channel in 0..3 {
            tensor[[0, channel, ty, tx]] = value;
        }
    }

    (tensor, letterbox)
}

/// Find the score/bbox outputs for each stride.
///
/// Exports that name their tensors `score_8`, `bbox_8`, ... are mapped by name;
/// anything else uses the standard layout `[scores 8/16/32, boxes 8/16/32, ...]`.
fn locate_outputs(names: &[String]) -> [StrideOutputs; 3] {
    let position = |kind: &str, stride: u32| {
        let wanted = format!("{kind}_{stride}");
        names.iter().position(|n| *n == wanted)
    };

    let by_name: Option<Vec<StrideOutputs>> = SCRFD_STRIDES
        .iter()
        .map(|&s| Some((position("score", s)?, position("bbox", s)?)))
        .collect();

    match by_name.as_deref() {
        Some(&[a, b, c]) => [a, b, c],
        _ => {
            tracing::debug!(?names, "SCRFD outputs not named by stride, using positional layout");
            [(0, 3), (1, 4), (2, 5)]
        }
    }
}

/// Decode one stride's anchors above the confidence threshold.
fn decode_stride(scores: &[f32], boxes: &[f32], stride: u32, letterbox: &Letterbox) -> Vec<FaceRegion> {
    let grid_w = (SCRFD_INPUT_SIZE / stride) as usize;
    let grid_h = grid_w;
    let step = stride as f32;

    (0..grid_w * grid_h * SCRFD_ANCHORS_PER_CELL)
        .filter_map(|idx| {
            let confidence = *scores.get(idx)?;
            if confidence <= SCRFD_CONFIDENCE_THRESHOLD {
                return None;
            }
            let offsets = boxes.get(idx * 4..idx * 4 + 4)?;

            let cell = idx / SCRFD_ANCHORS_PER_CELL;
            let cx = (cell % grid_w) as f32 * step;
            let cy = (cell / grid_w) as f32 * step;

            let (left, top) = letterbox.to_source(cx - offsets[0] * step, cy - offsets[1] * step);
            let (right, bottom) = letterbox.to_source(cx + offsets[2] * step, cy + offsets[3] * step);

            Some(FaceRegion { left, top, right, bottom, confidence })
        })
        .collect()
}

/// Greedy non-maximum suppression. Returns survivors by descending confidence.
fn suppress_overlaps(mut candidates: Vec<FaceRegion>, iou_threshold: f32) -> Vec<FaceRegion> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<FaceRegion> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
