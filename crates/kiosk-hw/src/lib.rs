//! kiosk-hw: Camera access for the attendance kiosk.
//!
//! Opens a V4L2 webcam (video only) and hands out grayscale frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CaptureSettings, DeviceInfo, FrameSource, PixelFormat};
pub use frame::{Frame, FrameError};
