//! What the kiosk screen currently shows.

use kiosk_core::{BoundingBox, ClockAction};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum KioskDisplay {
    /// Camera or models not up yet.
    Starting,
    /// No face in frame; overlay hidden.
    Waiting,
    Greeting {
        name: String,
        action: ClockAction,
        time: String,
        overlay: BoundingBox,
    },
    Unrecognized { overlay: BoundingBox },
}

impl KioskDisplay {
    pub fn message(&self) -> String {
        match self {
            KioskDisplay::Starting => "Starting camera...".to_string(),
            KioskDisplay::Waiting => "Waiting for face...".to_string(),
            KioskDisplay::Greeting { name, .. } => format!("Hello, {name}!"),
            KioskDisplay::Unrecognized { .. } => "Face not recognized.".to_string(),
        }
    }

    /// Face box in display coordinates, if one should be drawn.
    pub fn overlay(&self) -> Option<&BoundingBox> {
        match self {
            KioskDisplay::Greeting { overlay, .. } | KioskDisplay::Unrecognized { overlay } => {
                Some(overlay)
            }
            KioskDisplay::Starting | KioskDisplay::Waiting => None,
        }
    }
}
