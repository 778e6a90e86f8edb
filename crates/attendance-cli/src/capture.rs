//! Interactive capture session: preview frames until the user confirms a
//! capture with a face in view, or quits.

use attendance_core::{DetectorError, FaceDetector, FaceRegion};
use attendance_hw::{Frame, FrameSource};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// A line typed by the user during the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCommand {
    Capture,
    Quit,
    Other(String),
}

impl KeyCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "c" | "capture" => Self::Capture,
            "q" | "quit" => Self::Quit,
            other => Self::Other(other.to_string()),
        }
    }
}

pub enum CaptureOutcome {
    /// User confirmed while at least one face was in view.
    Captured { frame: Frame, faces: Vec<FaceRegion> },
    /// User quit, or the input stream closed.
    Cancelled,
    /// The camera stopped delivering frames.
    ReadFailed(String),
}

/// Block until the user captures or cancels, polling `keys` once per frame.
pub fn run_capture_session<S, D>(
    source: &mut S,
    detector: &mut D,
    keys: &mut mpsc::Receiver<String>,
    warmup_frames: usize,
) -> Result<CaptureOutcome, DetectorError>
where
    S: FrameSource + ?Sized,
    D: FaceDetector + ?Sized,
{
    if warmup_frames > 0 {
        tracing::debug!(count = warmup_frames, "discarding warmup frames");
        for _ in 0..warmup_frames {
            if let Err(e) = source.acquire_frame() {
                tracing::debug!(error = %e, "warmup frame failed");
            }
        }
    }

    println!("Position your face in the center of the camera view");
    println!("Type 'c' and press Enter to capture when ready");
    println!("Type 'q' and press Enter to quit");

    let mut faces_in_view = None;

    loop {
        let frame = match source.acquire_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "frame read failed");
                return Ok(CaptureOutcome::ReadFailed(e.to_string()));
            }
        };

        let faces = if frame.is_dark {
            tracing::debug!(
                seq = frame.sequence,
                brightness = frame.avg_brightness(),
                "skipping dark frame"
            );
            Vec::new()
        } else {
            detector.detect(&frame.gray())?
        };

        if faces_in_view != Some(faces.len()) {
            println!("Faces in view: {}", faces.len());
            faces_in_view = Some(faces.len());
        }

        let command = match keys.try_recv() {
            Ok(line) => KeyCommand::parse(&line),
            Err(TryRecvError::Empty) => continue,
            Err(TryRecvError::Disconnected) => {
                tracing::info!("input closed during capture");
                return Ok(CaptureOutcome::Cancelled);
            }
        };

        match command {
            KeyCommand::Capture if faces.is_empty() => {
                println!("No face detected yet. Adjust your position and try again");
            }
            KeyCommand::Capture => {
                tracing::info!(
                    faces = faces.len(),
                    confidence = faces[0].confidence,
                    seq = frame.sequence,
                    "frame captured"
                );
                return Ok(CaptureOutcome::Captured { frame, faces });
            }
            KeyCommand::Quit => return Ok(CaptureOutcome::Cancelled),
            KeyCommand::Other(other) => {
                println!("Unknown command {other:?}: type 'c' to capture or 'q' to quit");
            }
        }
    }
}
