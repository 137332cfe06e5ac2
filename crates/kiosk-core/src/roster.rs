//! Roster administration: register, edit, delete, clear.

use crate::admin::AdminSession;
use crate::attendance;
use crate::state::{Changes, KioskState};
use crate::store::{KeyValueStore, StoreError};
use crate::types::{Employee, Signature};
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("invalid employee details: {0}")]
    Validation(String),
    #[error("an employee named '{0}' is already registered")]
    DuplicateName(String),
    #[error("face not detected, try again")]
    NoFaceDetected,
    #[error("no employee at position {0}")]
    IndexOutOfRange(usize),
    #[error("incorrect admin password")]
    AccessDenied,
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

/// Registration form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmployee {
    pub name: String,
    pub pin: String,
    pub company_number: String,
}

impl NewEmployee {
    /// Trim every field and check the form is complete.
    pub fn validate(self) -> Result<Self, RosterError> {
        let name = self.name.trim().to_string();
        let pin = self.pin.trim().to_string();
        let company_number = self.company_number.trim().to_string();

        if name.is_empty() || company_number.is_empty() {
            return Err(RosterError::Validation(
                "enter name, 4-digit PIN, and company number".into(),
            ));
        }
        validate_pin(&pin)?;

        Ok(Self {
            name,
            pin,
            company_number,
        })
    }
}

/// Replacement values for an existing employee. `None` or blank keeps the
/// current value. The name cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeUpdate {
    pub pin: Option<String>,
    pub company_number: Option<String>,
}

pub fn validate_pin(pin: &str) -> Result<(), RosterError> {
    if pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(RosterError::Validation("PIN must be 4 digits".into()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<S: KeyValueStore> KioskState<S> {
    /// Reject a registration that can never succeed, before any face capture.
    pub fn check_registration(&self, employee: NewEmployee) -> Result<NewEmployee, RosterError> {
        let employee = employee.validate()?;
        if self.employees.iter().any(|e| e.name == employee.name) {
            return Err(RosterError::DuplicateName(employee.name));
        }
        Ok(employee)
    }

    /// Register a new employee with the signature captured for them.
    ///
    /// `signature` is `None` when no face was found in the frame; the call
    /// is then rejected without touching any state.
    pub fn register(
        &mut self,
        _session: &AdminSession,
        employee: NewEmployee,
        signature: Option<Signature>,
    ) -> Result<(), RosterError> {
        let employee = self.check_registration(employee)?;
        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or(RosterError::NoFaceDetected)?;

        let mut signatures = self.signatures.clone();
        signatures.insert(employee.name.clone(), signature);
        let mut employees = self.employees.clone();
        employees.push(Employee {
            name: employee.name.clone(),
            pin: employee.pin,
            company_number: employee.company_number,
        });
        self.commit(Changes {
            employees: Some(employees),
            signatures: Some(signatures),
            ..Changes::default()
        })?;

        tracing::info!(name = %employee.name, "employee registered");
        Ok(())
    }

    /// Update the PIN and/or company number of the employee at `index`.
    pub fn edit(
        &mut self,
        _session: &AdminSession,
        index: usize,
        update: EmployeeUpdate,
    ) -> Result<&Employee, RosterError> {
        if index >= self.employees.len() {
            return Err(RosterError::IndexOutOfRange(index));
        }
        let pin = non_blank(update.pin);
        if let Some(pin) = &pin {
            validate_pin(pin)?;
        }
        let company_number = non_blank(update.company_number);

        let mut employees = self.employees.clone();
        let employee = &mut employees[index];
        if let Some(pin) = pin {
            employee.pin = pin;
        }
        if let Some(company_number) = company_number {
            employee.company_number = company_number;
        }
        self.commit(Changes {
            employees: Some(employees),
            ..Changes::default()
        })?;
        let employee = &self.employees[index];
        tracing::info!(name = %employee.name, "employee updated");
        Ok(employee)
    }

    /// Delete the employee at `index` along with their signature.
    ///
    /// An open attendance record for that employee is closed at `now`, so no
    /// record is left open for someone who can no longer clock out.
    pub fn delete(
        &mut self,
        _session: &AdminSession,
        index: usize,
        now: NaiveDateTime,
    ) -> Result<Employee, RosterError> {
        if index >= self.employees.len() {
            return Err(RosterError::IndexOutOfRange(index));
        }
        let mut employees = self.employees.clone();
        let employee = employees.remove(index);
        let mut signatures = self.signatures.clone();
        signatures.shift_remove(&employee.name);
        let mut records = self.records.clone();
        let closed = attendance::clock_out(&mut records, &employee.name, now);

        self.commit(Changes {
            employees: Some(employees),
            signatures: Some(signatures),
            records: closed.is_some().then_some(records),
        })?;

        if let Some(event) = closed {
            tracing::info!(name = %employee.name, time = %event.time, "closed open record of deleted employee");
        }
        tracing::info!(name = %employee.name, "employee deleted");
        Ok(employee)
    }

    /// Remove every employee, signature, and record.
    pub fn clear_all(&mut self, _session: &AdminSession) -> Result<(), RosterError> {
        self.reset()?;
        tracing::warn!("all kiosk data cleared");
        Ok(())
    }
}
