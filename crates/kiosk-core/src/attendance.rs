//! Clock-in/clock-out state machine.
//!
//! A person is clocked in exactly when they have an open record. There is no
//! separate flag to drift out of sync with the stored records.

use crate::types::{format_date, format_time, AttendanceRecord};
use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockAction {
    In,
    Out,
}

/// A completed state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockEvent {
    pub name: String,
    pub action: ClockAction,
    pub date: String,
    pub time: String,
}

pub fn is_clocked_in(records: &[AttendanceRecord], name: &str) -> bool {
    records.iter().any(|r| r.name == name && r.is_open())
}

/// Append a new open record. Returns `None` if `name` already has one.
pub fn clock_in(
    records: &mut Vec<AttendanceRecord>,
    name: &str,
    now: NaiveDateTime,
) -> Option<ClockEvent> {
    if is_clocked_in(records, name) {
        return None;
    }
    Some(open_record(records, name, now))
}

/// Stamp the clock-out time on the most recent open record for `name`.
///
/// No open record is a no-op: nothing is mutated and `None` is returned.
pub fn clock_out(
    records: &mut [AttendanceRecord],
    name: &str,
    now: NaiveDateTime,
) -> Option<ClockEvent> {
    let rec = records
        .iter_mut()
        .rev()
        .find(|r| r.name == name && r.is_open())?;
    let time = format_time(&now);
    rec.clock_out = Some(time.clone());
    Some(ClockEvent {
        name: name.to_string(),
        action: ClockAction::Out,
        date: format_date(&now),
        time,
    })
}

/// Flip `name` between IN and OUT.
pub fn toggle(
    records: &mut Vec<AttendanceRecord>,
    name: &str,
    now: NaiveDateTime,
) -> ClockEvent {
    if let Some(event) = clock_out(records, name, now) {
        return event;
    }
    open_record(records, name, now)
}

fn open_record(records: &mut Vec<AttendanceRecord>, name: &str, now: NaiveDateTime) -> ClockEvent {
    let date = format_date(&now);
    let time = format_time(&now);
    records.push(AttendanceRecord {
        name: name.to_string(),
        date: date.clone(),
        clock_in: time.clone(),
        clock_out: None,
    });
    ClockEvent {
        name: name.to_string(),
        action: ClockAction::In,
        date,
        time,
    }
}
