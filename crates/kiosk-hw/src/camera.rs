//! Kiosk webcam over V4L2. Video only; no audio device is ever opened.

use crate::frame::{self, Frame, FrameError};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const MAX_VIDEO_NODES: u32 = 16;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no camera at {0}")]
    NotFound(String),
    #[error("camera {0} is in use by another process")]
    Busy(String),
    #[error("{0} is not a video capture device")]
    NoVideoCapture(String),
    #[error("camera format: {0}")]
    Format(String),
    #[error("frame capture: {0}")]
    Capture(String),
}

impl From<FrameError> for CameraError {
    fn from(e: FrameError) -> Self {
        CameraError::Capture(e.to_string())
    }
}

/// Anything that can hand out grayscale video frames.
pub trait FrameSource: Send {
    fn capture_frame(&mut self) -> Result<Frame, CameraError>;
}

/// Capture parameters requested from the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    /// Mmap buffers queued per capture.
    pub buffers: u32,
    /// Fraction of near-black pixels above which a frame counts as dark.
    pub dark_threshold: f32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            buffers: 4,
            dark_threshold: 0.95,
        }
    }
}

/// A video capture node found under /dev.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
}

/// Pixel layouts the kiosk can turn into grayscale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed YUYV 4:2:2; the luma bytes are kept.
    Yuyv,
    /// 8-bit grayscale, used as-is.
    Grey,
}

impl PixelFormat {
    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"GREY" => Some(PixelFormat::Grey),
            _ => None,
        }
    }

    pub fn to_grayscale(self, buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
        match self {
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, width, height),
            PixelFormat::Grey => {
                let expected = width as usize * height as usize;
                buf.get(..expected)
                    .map(<[u8]>::to_vec)
                    .ok_or(FrameError::InvalidLength {
                        expected,
                        actual: buf.len(),
                    })
            }
        }
    }
}

pub struct Camera {
    device: Device,
    path: String,
    format: PixelFormat,
    width: u32,
    height: u32,
    settings: CaptureSettings,
}

impl Camera {
    /// Open `path` (e.g. "/dev/video0") with the default 640x480 request.
    pub fn open(path: &str) -> Result<Self, CameraError> {
        Self::open_with(path, CaptureSettings::default())
    }

    pub fn open_with(path: &str, settings: CaptureSettings) -> Result<Self, CameraError> {
        if !Path::new(path).exists() {
            return Err(CameraError::NotFound(path.to_string()));
        }
        let device = Device::with_path(path).map_err(|e| open_error(path, e))?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::Capture(format!("query capabilities: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::NoVideoCapture(path.to_string()));
        }

        let (format, width, height) = negotiate(&device, &settings)?;
        tracing::info!(
            device = path,
            card = %caps.card,
            width,
            height,
            format = ?format,
            "camera opened"
        );

        Ok(Self {
            device,
            path: path.to_string(),
            format,
            width,
            height,
            settings,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Negotiated frame size, which may differ from the request.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Every /dev/videoN node that can capture video.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..MAX_VIDEO_NODES)
            .map(|n| format!("/dev/video{n}"))
            .filter(|path| Path::new(path).exists())
            .filter_map(|path| {
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card,
                        driver: caps.driver,
                    })
            })
            .collect()
    }
}

fn open_error(path: &str, e: std::io::Error) -> CameraError {
    match e.raw_os_error() {
        Some(libc::EBUSY) => CameraError::Busy(path.to_string()),
        _ => CameraError::NotFound(format!("{path}: {e}")),
    }
}

/// Ask for YUYV at the requested size and accept YUYV or GREY back.
fn negotiate(device: &Device, settings: &CaptureSettings) -> Result<(PixelFormat, u32, u32), CameraError> {
    let mut wanted = device
        .format()
        .map_err(|e| CameraError::Format(format!("read current format: {e}")))?;
    wanted.fourcc = FourCC::new(b"YUYV");
    wanted.width = settings.width;
    wanted.height = settings.height;

    let got = device
        .set_format(&wanted)
        .map_err(|e| CameraError::Format(format!("set format: {e}")))?;
    let format = PixelFormat::from_fourcc(got.fourcc).ok_or_else(|| {
        CameraError::Format(format!("driver offered {}, need YUYV or GREY", got.fourcc))
    })?;
    Ok((format, got.width, got.height))
}

impl FrameSource for Camera {
    fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let mut stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, self.settings.buffers)
                .map_err(|e| CameraError::Capture(format!("start stream: {e}")))?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::Capture(format!("dequeue buffer: {e}")))?;

        let gray = self.format.to_grayscale(buf, self.width, self.height)?;
        Ok(Frame::new(
            gray,
            self.width,
            self.height,
            meta.sequence,
            self.settings.dark_threshold,
        ))
    }
}
