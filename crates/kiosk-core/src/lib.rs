//! kiosk-core: Attendance kiosk engine.
//!
//! Matches face signatures from an external detector against the stored
//! roster, toggles clock-in/clock-out records, and produces reports.
//! All state lives in [`KioskState`], persisted through a [`KeyValueStore`].

pub mod admin;
pub mod attendance;
pub mod detector;
pub mod matcher;
pub mod report;
pub mod roster;
pub mod state;
pub mod store;
pub mod types;

pub use admin::{AdminGate, AdminSession};
pub use attendance::{ClockAction, ClockEvent};
pub use detector::{DetectOptions, DetectorError, FaceDetector, ProcessDetector};
pub use matcher::{FirstMatchMatcher, MatchOutcome, Matcher, DEFAULT_MATCH_THRESHOLD};
pub use roster::{EmployeeUpdate, NewEmployee, RosterError};
pub use state::KioskState;
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError};
pub use types::{AttendanceRecord, BoundingBox, Detection, Employee, Signature, SignatureRoster};
