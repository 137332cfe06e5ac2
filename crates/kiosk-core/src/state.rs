//! Process-wide kiosk state, hydrated once from the store.

use crate::attendance::{self, ClockEvent};
use crate::store::{self, KeyValueStore, StoreError, EMPLOYEES_KEY, RECORDS_KEY, SIGNATURES_KEY};
use crate::types::{AttendanceRecord, Employee, SignatureRoster};
use chrono::NaiveDateTime;

/// Replacement values for one mutation. `None` leaves that blob alone.
#[derive(Debug, Default)]
pub(crate) struct Changes {
    pub employees: Option<Vec<Employee>>,
    pub records: Option<Vec<AttendanceRecord>>,
    pub signatures: Option<SignatureRoster>,
}

/// Owner of the roster, signatures, and attendance records.
///
/// Every mutation writes the affected blobs back to the store in a single
/// atomic write before touching memory, so a failed save changes nothing.
pub struct KioskState<S: KeyValueStore> {
    store: S,
    pub(crate) employees: Vec<Employee>,
    pub(crate) records: Vec<AttendanceRecord>,
    pub(crate) signatures: SignatureRoster,
}

impl<S: KeyValueStore> KioskState<S> {
    /// Hydrate state from `store`.
    pub fn load(store: S) -> Result<Self, StoreError> {
        let employees: Vec<Employee> = store::load(&store, EMPLOYEES_KEY)?;
        let records: Vec<AttendanceRecord> = store::load(&store, RECORDS_KEY)?;
        let signatures: SignatureRoster = store::load(&store, SIGNATURES_KEY)?;

        let orphans = signatures
            .keys()
            .filter(|name| !employees.iter().any(|e| &e.name == *name))
            .count();
        if orphans > 0 {
            tracing::warn!(orphans, "signatures without a registered employee");
        }

        tracing::info!(
            employees = employees.len(),
            records = records.len(),
            signatures = signatures.len(),
            "kiosk state loaded"
        );

        Ok(Self {
            store,
            employees,
            records,
            signatures,
        })
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn signatures(&self) -> &SignatureRoster {
        &self.signatures
    }

    pub fn is_clocked_in(&self, name: &str) -> bool {
        attendance::is_clocked_in(&self.records, name)
    }

    /// Apply a recognized face: clock `name` in, or out if already in.
    pub fn record_match(&mut self, name: &str, now: NaiveDateTime) -> Result<ClockEvent, StoreError> {
        let mut records = self.records.clone();
        let event = attendance::toggle(&mut records, name, now);
        self.commit(Changes {
            records: Some(records),
            ..Changes::default()
        })?;
        tracing::info!(name, action = ?event.action, time = %event.time, "attendance recorded");
        Ok(event)
    }

    /// Close `name`'s open record, if any. Without one nothing changes.
    pub fn clock_out(&mut self, name: &str, now: NaiveDateTime) -> Result<Option<ClockEvent>, StoreError> {
        let mut records = self.records.clone();
        let Some(event) = attendance::clock_out(&mut records, name, now) else {
            return Ok(None);
        };
        self.commit(Changes {
            records: Some(records),
            ..Changes::default()
        })?;
        Ok(Some(event))
    }

    /// Persist every staged blob in one store write, then adopt them.
    ///
    /// On error neither the store nor the in-memory state has changed.
    pub(crate) fn commit(&mut self, changes: Changes) -> Result<(), StoreError> {
        let mut blobs = Vec::with_capacity(3);
        if let Some(employees) = &changes.employees {
            blobs.push((EMPLOYEES_KEY, store::encode(EMPLOYEES_KEY, employees)?));
        }
        if let Some(records) = &changes.records {
            blobs.push((RECORDS_KEY, store::encode(RECORDS_KEY, records)?));
        }
        if let Some(signatures) = &changes.signatures {
            blobs.push((SIGNATURES_KEY, store::encode(SIGNATURES_KEY, signatures)?));
        }
        let entries: Vec<(&str, &str)> = blobs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.store.set_many(&entries)?;

        if let Some(employees) = changes.employees {
            self.employees = employees;
        }
        if let Some(records) = changes.records {
            self.records = records;
        }
        if let Some(signatures) = changes.signatures {
            self.signatures = signatures;
        }
        Ok(())
    }

    /// Wipe the store and in-memory state.
    pub(crate) fn reset(&mut self) -> Result<(), StoreError> {
        self.store.clear()?;
        self.employees.clear();
        self.records.clear();
        self.signatures.clear();
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Drop in-memory state and re-read everything from the store.
    pub fn reload(self) -> Result<Self, StoreError> {
        Self::load(self.store)
    }
}
