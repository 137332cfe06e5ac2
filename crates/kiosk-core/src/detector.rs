//! Face detection/recognition seam.
//!
//! The recognition model is an external process. [`ProcessDetector`] feeds
//! it grayscale frames over stdin and reads one JSON answer per frame from
//! stdout:
//!
//! ```text
//! -> {"width":640,"height":480,"input_size":320,"score_threshold":0.2,"len":307200}\n
//! -> <len raw bytes>
//! <- null\n
//! <- {"box":{"x":..,"y":..,"width":..,"height":..,"score":..},"landmarks":[[x,y],..],"descriptor":[..]}\n
//! ```

use crate::types::Detection;
use serde::Serialize;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use thiserror::Error;

const LIVE_INPUT_SIZE: u32 = 320;
const LIVE_SCORE_THRESHOLD: f32 = 0.2;
const DEFAULT_INPUT_SIZE: u32 = 416;
const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("no detector command configured")]
    NotConfigured,
    #[error("failed to start detector '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("detector process exited")]
    ProcessExited,
    #[error("detector i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid detector response: {0}")]
    InvalidResponse(String),
}

/// Detector tuning for one call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectOptions {
    /// Square input resolution the detector resizes frames to.
    pub input_size: u32,
    /// Minimum face confidence.
    pub score_threshold: f32,
}

impl DetectOptions {
    /// Fast, permissive settings for the polling loop.
    pub fn live() -> Self {
        Self {
            input_size: LIVE_INPUT_SIZE,
            score_threshold: LIVE_SCORE_THRESHOLD,
        }
    }

    /// Library defaults, used for the single registration capture.
    pub fn register() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

/// Opaque face detector + signature extractor.
pub trait FaceDetector: Send {
    /// Find at most one face in a grayscale frame.
    fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        options: &DetectOptions,
    ) -> Result<Option<Detection>, DetectorError>;
}

#[derive(Serialize)]
struct FrameHeader {
    width: u32,
    height: u32,
    input_size: u32,
    score_threshold: f32,
    len: usize,
}

/// Detector backed by a long-running child process.
pub struct ProcessDetector {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ProcessDetector {
    /// Start `command[0]` with the remaining elements as arguments.
    pub fn spawn(command: &[String]) -> Result<Self, DetectorError> {
        let (program, args) = command.split_first().ok_or(DetectorError::NotConfigured)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| DetectorError::Spawn {
                command: program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(DetectorError::ProcessExited);
        };

        tracing::info!(program = %program, pid = child.id(), "detector process started");

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn send_frame(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        options: &DetectOptions,
    ) -> std::io::Result<()> {
        let header = FrameHeader {
            width,
            height,
            input_size: options.input_size,
            score_threshold: options.score_threshold,
            len: frame.len(),
        };
        serde_json::to_writer(&mut self.stdin, &header)?;
        self.stdin.write_all(b"\n")?;
        self.stdin.write_all(frame)?;
        self.stdin.flush()
    }
}

impl FaceDetector for ProcessDetector {
    fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        options: &DetectOptions,
    ) -> Result<Option<Detection>, DetectorError> {
        if let Err(e) = self.send_frame(frame, width, height, options) {
            return Err(match e.kind() {
                std::io::ErrorKind::BrokenPipe => DetectorError::ProcessExited,
                _ => DetectorError::Io(e),
            });
        }

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(DetectorError::ProcessExited);
        }
        parse_response(&line)
    }
}

impl Drop for ProcessDetector {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Decode one response line.
pub fn parse_response(line: &str) -> Result<Option<Detection>, DetectorError> {
    let detection: Option<Detection> = serde_json::from_str(line.trim())
        .map_err(|e| DetectorError::InvalidResponse(e.to_string()))?;
    match detection {
        Some(d) if d.descriptor.is_empty() => {
            Err(DetectorError::InvalidResponse("empty descriptor".into()))
        }
        other => Ok(other),
    }
}
