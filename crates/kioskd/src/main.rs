use anyhow::{Context, Result};
use kiosk_core::{AdminGate, KioskState, ProcessDetector, SqliteStore};
use kiosk_hw::Camera;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod detection_loop;
mod display;
mod engine;

use config::{BusKind, Config};
use dbus_interface::KioskService;
use detection_loop::LoopSettings;
use display::KioskDisplay;
use engine::{EngineError, EngineHandle};

const BUS_NAME: &str = "org.iconsecurity.Kiosk1";
const OBJECT_PATH: &str = "/org/iconsecurity/Kiosk1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("kioskd starting");

    let config = Config::load()?;
    if let Some(dir) = config.db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    let state = Arc::new(Mutex::new(KioskState::load(store)?));

    let engine = match start_engine(&config) {
        Ok(engine) => Some(engine),
        Err(e) => {
            tracing::error!(error = %e, device = %config.camera_device, "camera unavailable; registration and clocking disabled");
            for dev in Camera::list_devices() {
                tracing::info!(path = %dev.path, name = %dev.name, driver = %dev.driver, "available camera");
            }
            None
        }
    };

    let (display_tx, display_rx) = watch::channel(KioskDisplay::Starting);
    let service = KioskService::new(
        state.clone(),
        engine.clone(),
        AdminGate::new(&config.admin_password),
        config.register_options(),
        display_rx,
    );

    let builder = match config.bus {
        BusKind::Session => zbus::connection::Builder::session()?,
        BusKind::System => zbus::connection::Builder::system()?,
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on D-Bus")?;

    tracing::info!(bus = ?config.bus, name = BUS_NAME, "D-Bus interface registered");

    let detection = engine.map(|engine| {
        let settings = LoopSettings {
            options: config.live_options(),
            threshold: config.match_threshold,
            display: config.display_size(),
            interval: config.poll_interval(),
        };
        tokio::spawn(detection_loop::run_detection_loop(
            engine,
            state.clone(),
            settings,
            display_tx,
        ))
    });

    tracing::info!("kioskd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("kioskd shutting down");
    if let Some(task) = detection {
        task.abort();
    }

    Ok(())
}

fn start_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let camera = Camera::open(&config.camera_device)?;
    let detector = ProcessDetector::spawn(&config.detector_command)?;
    engine::spawn_engine(Box::new(camera), Box::new(detector), config.warmup_frames)
}
