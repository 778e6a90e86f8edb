//! attendance-core — Attendance ledger and face verification engine.
//!
//! Keeps the once-per-day CSV attendance ledger, and checks captured images
//! with SCRFD face detection and ArcFace face encoding, both running via
//! ONNX Runtime for CPU inference.

pub mod detector;
pub mod encoder;
pub mod ledger;
pub mod name;
pub mod types;
pub mod verify;

pub use detector::{DetectorError, FaceDetector, ScrfdDetector};
pub use encoder::{ArcFaceEncoder, EncoderError, FaceEncoder};
pub use ledger::{AttendanceLedger, AttendanceRecord, DuplicateScope, LedgerError, MarkOutcome};
pub use name::{AttendeeName, NameError};
pub use types::{Embedding, FaceRegion};
pub use verify::{verify_face_image, VerifyError};

use std::path::PathBuf;

/// Default directory holding `det_10g.onnx` and `w600k_r50.onnx`:
/// `$XDG_DATA_HOME/attendance/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("attendance")
        .join("models")
}
