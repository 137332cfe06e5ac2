use anyhow::{Context, Result};
use kiosk_core::{DetectOptions, DEFAULT_MATCH_THRESHOLD};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which D-Bus bus the daemon registers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    Session,
    System,
}

/// Daemon configuration: defaults, then an optional TOML file named by
/// `KIOSK_CONFIG`, then `KIOSK_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// External recognizer program and arguments.
    pub detector_command: Vec<String>,
    /// Path to the SQLite attendance store.
    pub db_path: PathBuf,
    /// Maximum signature distance for a match.
    pub match_threshold: f32,
    /// Pause between the end of one detection and the start of the next.
    pub poll_interval_ms: u64,
    /// Frames to discard after opening the camera (exposure settling).
    pub warmup_frames: usize,
    pub live_input_size: u32,
    pub live_score_threshold: f32,
    pub register_input_size: u32,
    pub register_score_threshold: f32,
    /// Size of the on-screen video surface the face overlay is drawn on.
    pub display_width: u32,
    pub display_height: u32,
    pub admin_password: String,
    pub bus: BusKind,
}

impl Default for Config {
    fn default() -> Self {
        let live = DetectOptions::live();
        let register = DetectOptions::register();
        Self {
            camera_device: "/dev/video0".to_string(),
            detector_command: Vec::new(),
            db_path: default_data_dir().join("attendance.db"),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            poll_interval_ms: 100,
            warmup_frames: 4,
            live_input_size: live.input_size,
            live_score_threshold: live.score_threshold,
            register_input_size: register.input_size,
            register_score_threshold: register.score_threshold,
            display_width: 640,
            display_height: 480,
            admin_password: "admin123".to_string(),
            bus: BusKind::Session,
        }
    }
}

impl Config {
    /// Load configuration from `KIOSK_CONFIG` (if set) and `KIOSK_*` variables.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("KIOSK_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("KIOSK_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Ok(v) = std::env::var("KIOSK_DETECTOR_COMMAND") {
            self.detector_command = v.split_whitespace().map(str::to_string).collect();
        }
        if let Ok(v) = std::env::var("KIOSK_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("KIOSK_ADMIN_PASSWORD") {
            self.admin_password = v;
        }
        if let Ok(v) = std::env::var("KIOSK_BUS") {
            match v.as_str() {
                "system" => self.bus = BusKind::System,
                "session" => self.bus = BusKind::Session,
                other => tracing::warn!(value = other, "ignoring unknown KIOSK_BUS"),
            }
        }
        self.match_threshold = env_parse("KIOSK_MATCH_THRESHOLD", self.match_threshold);
        self.poll_interval_ms = env_parse("KIOSK_POLL_INTERVAL_MS", self.poll_interval_ms);
        self.warmup_frames = env_parse("KIOSK_WARMUP_FRAMES", self.warmup_frames);
        self.display_width = env_parse("KIOSK_DISPLAY_WIDTH", self.display_width);
        self.display_height = env_parse("KIOSK_DISPLAY_HEIGHT", self.display_height);
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn live_options(&self) -> DetectOptions {
        DetectOptions {
            input_size: self.live_input_size,
            score_threshold: self.live_score_threshold,
        }
    }

    pub fn register_options(&self) -> DetectOptions {
        DetectOptions {
            input_size: self.register_input_size,
            score_threshold: self.register_score_threshold,
        }
    }

    pub fn display_size(&self) -> (u32, u32) {
        (self.display_width, self.display_height)
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("kiosk")
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
