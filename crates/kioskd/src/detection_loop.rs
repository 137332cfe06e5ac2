//! Camera polling: detect, match, clock in/out, update the screen.

use crate::display::KioskDisplay;
use crate::engine::{EngineError, EngineHandle, Observation};
use chrono::NaiveDateTime;
use kiosk_core::{
    DetectOptions, DetectorError, FirstMatchMatcher, KeyValueStore, KioskState, MatchOutcome, Matcher,
    StoreError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Longest pause between attempts while detections keep failing.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Fixed parameters of the polling loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub options: DetectOptions,
    pub threshold: f32,
    /// Display surface the overlay is scaled to.
    pub display: (u32, u32),
    /// Pause after each completed detection.
    pub interval: Duration,
}

/// Poll the engine until it or the detector process shuts down.
///
/// The next detection is scheduled only after the previous one has been
/// fully handled, so a slow detector stretches the cycle instead of
/// stacking up requests.
pub async fn run_detection_loop<S>(
    engine: EngineHandle,
    state: Arc<Mutex<KioskState<S>>>,
    settings: LoopSettings,
    display_tx: watch::Sender<KioskDisplay>,
) where
    S: KeyValueStore + Send + 'static,
{
    tracing::info!(interval_ms = settings.interval.as_millis() as u64, "detection loop started");
    let matcher = FirstMatchMatcher;
    let mut failures: u32 = 0;

    loop {
        match engine.detect(settings.options).await {
            Ok(observation) => {
                if failures > 0 {
                    tracing::info!(failures, "detection recovered");
                    failures = 0;
                }
                let now = chrono::Local::now().naive_local();
                let mut state = state.lock().await;
                match apply_observation(&mut state, &matcher, observation, &settings, now) {
                    Ok(Some(display)) => {
                        display_tx.send_if_modified(|current| {
                            if *current == display {
                                false
                            } else {
                                *current = display;
                                true
                            }
                        });
                    }
                    Ok(None) => {}
                    Err(e) => tracing::error!(error = %e, "failed to save attendance"),
                }
            }
            Err(EngineError::ChannelClosed) => {
                tracing::error!("engine stopped; detection loop exiting");
                break;
            }
            Err(EngineError::Detector(DetectorError::ProcessExited)) => {
                tracing::error!("detector process exited; detection loop exiting");
                break;
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                if failures == 1 {
                    tracing::warn!(error = %e, "detection failed");
                } else {
                    tracing::debug!(error = %e, failures, "detection still failing");
                }
            }
        }
        tokio::time::sleep(backoff(settings.interval, failures)).await;
    }
}

/// Poll interval, doubled per consecutive failure up to [`MAX_BACKOFF`].
fn backoff(interval: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return interval;
    }
    interval
        .saturating_mul(1 << failures.min(16))
        .min(MAX_BACKOFF)
        .max(interval)
}

/// Turn one observation into a screen update, recording attendance for a
/// recognized face. `None` leaves the screen as it is.
pub fn apply_observation<S: KeyValueStore>(
    state: &mut KioskState<S>,
    matcher: &dyn Matcher,
    observation: Observation,
    settings: &LoopSettings,
    now: NaiveDateTime,
) -> Result<Option<KioskDisplay>, StoreError> {
    let (detection, video) = match observation {
        Observation::NotReady => return Ok(None),
        Observation::NoFace => return Ok(Some(KioskDisplay::Waiting)),
        Observation::Face {
            detection,
            video_width,
            video_height,
        } => (detection, (video_width, video_height)),
    };

    let overlay = detection.bbox.to_display(video, settings.display);
    match matcher.find(&detection.descriptor, state.signatures(), settings.threshold) {
        MatchOutcome::Matched { name, distance } => {
            tracing::debug!(name = %name, distance, "face matched");
            let event = state.record_match(&name, now)?;
            Ok(Some(KioskDisplay::Greeting {
                name,
                action: event.action,
                time: event.time,
                overlay,
            }))
        }
        MatchOutcome::Unrecognized => Ok(Some(KioskDisplay::Unrecognized { overlay })),
    }
}
