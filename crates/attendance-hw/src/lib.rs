//! attendance-hw — Hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access and conversion of raw capture buffers
//! into `image` frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameSource, PixelFormat};
pub use frame::Frame;
