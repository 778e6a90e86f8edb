//! One attendance run: capture → save → verify → mark.

use crate::artifact::{self, ArtifactError};
use crate::capture::{self, CaptureOutcome};
use crate::config::Config;
use attendance_core::{
    verify_face_image, ArcFaceEncoder, AttendanceLedger, AttendeeName, DetectorError, EncoderError,
    FaceDetector, FaceEncoder, LedgerError, MarkOutcome, NameError, ScrfdDetector, VerifyError,
};
use attendance_hw::{Camera, CameraError, FrameSource};
use chrono::Local;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("name cannot be empty")]
    EmptyName,
    #[error("invalid name: {0}")]
    InvalidName(NameError),
    #[error("could not open webcam: {0}")]
    CameraUnavailable(#[source] CameraError),
    #[error("failed to grab frame from camera: {0}")]
    FrameRead(String),
    #[error("face capture cancelled")]
    Cancelled,
    #[error("face detector unavailable: {0}")]
    DetectorUnavailable(#[source] DetectorError),
    #[error("face encoder unavailable: {0}")]
    EncoderUnavailable(#[source] EncoderError),
    #[error("error during face capture: {0}")]
    Detection(#[source] DetectorError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Verification(#[from] VerifyError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<NameError> for AttendanceError {
    fn from(e: NameError) -> Self {
        match e {
            NameError::Empty => AttendanceError::EmptyName,
            other => AttendanceError::InvalidName(other),
        }
    }
}

impl AttendanceError {
    /// Closing line printed after the error itself. `None` for failures the
    /// top level reports as unexpected.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AttendanceError::EmptyName => Some("Name cannot be empty. Exiting."),
            AttendanceError::InvalidName(_) => Some("Please enter a name without commas. Exiting."),
            AttendanceError::CameraUnavailable(_)
            | AttendanceError::FrameRead(_)
            | AttendanceError::Cancelled
            | AttendanceError::DetectorUnavailable(_)
            | AttendanceError::Detection(_)
            | AttendanceError::Artifact(_) => Some("Face capture failed. Exiting."),
            AttendanceError::EncoderUnavailable(_) | AttendanceError::Verification(_) => Some(
                "Face verification failed. Please try again with better lighting and positioning.",
            ),
            AttendanceError::Ledger(_) => None,
        }
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub image_path: PathBuf,
    pub outcome: MarkOutcome,
}

/// Status lines printed for a failure the user can act on, or `None` when it
/// should reach the top-level catch-all instead.
pub fn error_lines(e: &AttendanceError) -> Option<Vec<String>> {
    e.hint().map(|hint| vec![format!("Error: {e}"), hint.to_string()])
}

/// Status lines printed at the end of the mark flow.
pub fn report_lines(
    name: &AttendeeName,
    result: Result<RunReport, AttendanceError>,
) -> Result<Vec<String>, AttendanceError> {
    let report = match result {
        Ok(report) => report,
        Err(e) => return error_lines(&e).ok_or(e),
    };

    let status = match report.outcome {
        MarkOutcome::Marked(record) => format!(
            "Marked attendance for {} on {} at {}",
            record.name,
            record.date.format("%Y-%m-%d"),
            record.time.format("%H:%M:%S")
        ),
        MarkOutcome::AlreadyMarked => format!("Attendance already marked for {name}"),
    };
    Ok(vec![
        status,
        format!("Attendance process completed successfully for {name}"),
    ])
}

pub fn unexpected_error_line(e: &anyhow::Error) -> String {
    format!("An unexpected error occurred: {e:#}")
}

/// Open the configured camera and models, then run the full flow.
pub fn run_with_hardware(
    config: &Config,
    name: &AttendeeName,
    keys: &mut mpsc::Receiver<String>,
) -> Result<RunReport, AttendanceError> {
    let mut detector = ScrfdDetector::load(&config.detector_model_path())
        .map_err(AttendanceError::DetectorUnavailable)?;
    let mut encoder = ArcFaceEncoder::load(&config.encoder_model_path())
        .map_err(AttendanceError::EncoderUnavailable)?;

    println!("Starting webcam to capture your face...");
    let mut camera = Camera::open(&config.camera_device).map_err(AttendanceError::CameraUnavailable)?;
    tracing::info!(
        device = %camera.device_path,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        "camera ready"
    );

    let ledger = AttendanceLedger::new(&config.ledger_path).with_scope(config.duplicate_scope);
    run_attendance(
        name,
        &mut camera,
        &mut detector,
        &mut encoder,
        keys,
        config,
        &ledger,
    )
}

/// Capture a face, save it, verify the saved image, then mark the ledger.
pub fn run_attendance<S, D, E>(
    name: &AttendeeName,
    source: &mut S,
    detector: &mut D,
    encoder: &mut E,
    keys: &mut mpsc::Receiver<String>,
    config: &Config,
    ledger: &AttendanceLedger,
) -> Result<RunReport, AttendanceError>
where
    S: FrameSource + ?Sized,
    D: FaceDetector + ?Sized,
    E: FaceEncoder + ?Sized,
{
    let frame = match capture::run_capture_session(source, detector, keys, config.warmup_frames)
        .map_err(AttendanceError::Detection)?
    {
        CaptureOutcome::Captured { frame, faces } => {
            tracing::debug!(faces = faces.len(), width = frame.width(), height = frame.height(), "capture accepted");
            frame
        }
        CaptureOutcome::Cancelled => return Err(AttendanceError::Cancelled),
        CaptureOutcome::ReadFailed(reason) => return Err(AttendanceError::FrameRead(reason)),
    };

    let now = Local::now().naive_local();
    let image_path = artifact::save_capture(&config.images_dir, name, &frame.image, now)?;
    println!("Face captured and saved as {}", image_path.display());

    verify_face_image(&image_path, detector, encoder)?;
    println!("Face successfully encoded");

    let outcome = ledger.mark_present(name)?;
    Ok(RunReport { image_path, outcome })
}
