use serde::{Deserialize, Serialize};

/// A detected face, in pixel coordinates of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub confidence: f32,
}

impl FaceRegion {
    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection-over-Union with another region, in [0, 1].
    pub fn iou(&self, other: &FaceRegion) -> f32 {
        let overlap_w = (self.right.min(other.right) - self.left.max(other.left)).max(0.0);
        let overlap_h = (self.bottom.min(other.bottom) - self.top.max(other.top)).max(0.0);
        let intersection = overlap_w * overlap_h;
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Integer crop rectangle `(x, y, width, height)` clamped to an image of
    /// the given size. `None` when nothing of the region lies inside the image.
    pub fn clamped_rect(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.left.floor().clamp(0.0, image_width as f32) as u32;
        let y0 = self.top.floor().clamp(0.0, image_height as f32) as u32;
        let x1 = self.right.ceil().clamp(0.0, image_width as f32) as u32;
        let y1 = self.bottom.ceil().clamp(0.0, image_height as f32) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn dim(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(left: f32, top: f32, width: f32, height: f32) -> FaceRegion {
        FaceRegion {
            left,
            top,
            right: left + width,
            bottom: top + height,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = region(0.0, 0.0, 100.0, 100.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = region(0.0, 0.0, 10.0, 10.0);
        let b = region(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_shifted() {
        let a = region(0.0, 0.0, 10.0, 10.0);
        let b = region(5.0, 0.0, 10.0, 10.0);
        // 50 / (100 + 100 - 50)
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_region_has_zero_area() {
        let inverted = FaceRegion { left: 10.0, top: 10.0, right: 5.0, bottom: 5.0, confidence: 0.9 };
        assert_eq!(inverted.area(), 0.0);
        assert_eq!(inverted.iou(&inverted), 0.0);
    }

    #[test]
    fn test_clamped_rect_inside() {
        let r = region(10.0, 20.0, 30.0, 40.0);
        assert_eq!(r.clamped_rect(640, 480), Some((10, 20, 30, 40)));
    }

    #[test]
    fn test_clamped_rect_overhanging_edges() {
        let r = region(-15.0, -5.0, 50.0, 50.0);
        assert_eq!(r.clamped_rect(30, 30), Some((0, 0, 30, 30)));
    }

    #[test]
    fn test_clamped_rect_outside() {
        let r = region(700.0, 10.0, 20.0, 20.0);
        assert_eq!(r.clamped_rect(640, 480), None);
    }

    #[test]
    fn test_embedding_dim() {
        let e = Embedding { values: vec![3.0, 4.0], model_version: None };
        assert_eq!(e.dim(), 2);
    }
}
