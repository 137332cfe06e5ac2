use kiosk_core::{DetectOptions, Detection, DetectorError, FaceDetector};
use kiosk_hw::{CameraError, FrameSource};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("failed to start engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// What one detection attempt saw.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// No usable frame (capture failed or the frame was dark).
    NotReady,
    NoFace,
    Face {
        detection: Detection,
        video_width: u32,
        video_height: u32,
    },
}

/// Messages sent to the engine thread.
enum EngineRequest {
    Detect {
        options: DetectOptions,
        reply: oneshot::Sender<Result<Observation, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Capture one frame and run the detector on it.
    ///
    /// Requests are served one at a time in arrival order, so a detection
    /// never overlaps another.
    pub async fn detect(&self, options: DetectOptions) -> Result<Observation, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Detect {
                options,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread that owns the frame source and
/// the detector.
///
/// Discards `warmup_frames` first so auto-exposure can settle.
pub fn spawn_engine(
    mut source: Box<dyn FrameSource>,
    mut detector: Box<dyn FaceDetector>,
    warmup_frames: usize,
) -> Result<EngineHandle, EngineError> {
    if warmup_frames > 0 {
        tracing::info!(count = warmup_frames, "discarding warmup frames");
        for _ in 0..warmup_frames {
            let _ = source.capture_frame();
        }
    }

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("kiosk-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Detect { options, reply } => {
                        let result = run_detect(source.as_mut(), detector.as_mut(), &options);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn run_detect(
    source: &mut dyn FrameSource,
    detector: &mut dyn FaceDetector,
    options: &DetectOptions,
) -> Result<Observation, EngineError> {
    let frame = match source.capture_frame() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "frame capture failed");
            return Ok(Observation::NotReady);
        }
    };
    if frame.is_dark {
        tracing::debug!(seq = frame.sequence, "skipping dark frame");
        return Ok(Observation::NotReady);
    }

    let detection = detector.detect(&frame.data, frame.width, frame.height, options)?;
    Ok(match detection {
        Some(detection) => Observation::Face {
            detection,
            video_width: frame.width,
            video_height: frame.height,
        },
        None => Observation::NoFace,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use kiosk_hw::Frame;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Frame source that always yields the same mid-gray frame.
    pub struct StillCamera {
        pub fail: bool,
        pub dark: bool,
    }

    impl FrameSource for StillCamera {
        fn capture_frame(&mut self) -> Result<Frame, CameraError> {
            if self.fail {
                return Err(CameraError::Capture("unplugged".into()));
            }
            let value = if self.dark { 0 } else { 128 };
            Ok(Frame::new(vec![value; 64], 8, 8, 0, 0.95))
        }
    }

    /// Detector that replays a fixed script of answers and records the
    /// options it was called with.
    pub struct ScriptedDetector {
        pub answers: VecDeque<Option<Detection>>,
        pub seen: Arc<Mutex<Vec<DetectOptions>>>,
    }

    impl FaceDetector for ScriptedDetector {
        fn detect(
            &mut self,
            _frame: &[u8],
            _width: u32,
            _height: u32,
            options: &DetectOptions,
        ) -> Result<Option<Detection>, DetectorError> {
            self.seen.lock().unwrap().push(*options);
            self.answers.pop_front().ok_or(DetectorError::ProcessExited)
        }
    }
}
