use crate::display::KioskDisplay;
use crate::engine::{EngineHandle, Observation};
use kiosk_core::report;
use kiosk_core::{
    AdminGate, AdminSession, DetectOptions, EmployeeUpdate, KioskState, NewEmployee, RosterError,
    SqliteStore,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use zbus::fdo;
use zbus::interface;

pub type SharedState = Arc<Mutex<KioskState<SqliteStore>>>;

/// D-Bus interface for the attendance kiosk.
///
/// Bus name: org.iconsecurity.Kiosk1
/// Object path: /org/iconsecurity/Kiosk1
pub struct KioskService {
    state: SharedState,
    /// `None` when the camera or detector failed to start.
    engine: Option<EngineHandle>,
    gate: AdminGate,
    register_options: DetectOptions,
    display: watch::Receiver<KioskDisplay>,
}

impl KioskService {
    pub fn new(
        state: SharedState,
        engine: Option<EngineHandle>,
        gate: AdminGate,
        register_options: DetectOptions,
        display: watch::Receiver<KioskDisplay>,
    ) -> Self {
        Self {
            state,
            engine,
            gate,
            register_options,
            display,
        }
    }

    fn unlock(&self, password: &str) -> fdo::Result<AdminSession> {
        self.gate
            .unlock(password)
            .ok_or_else(|| to_fdo(RosterError::AccessDenied))
    }
}

fn to_fdo(e: RosterError) -> fdo::Error {
    match e {
        RosterError::AccessDenied => fdo::Error::AccessDenied(e.to_string()),
        RosterError::Validation(_)
        | RosterError::DuplicateName(_)
        | RosterError::IndexOutOfRange(_) => fdo::Error::InvalidArgs(e.to_string()),
        RosterError::NoFaceDetected | RosterError::Store(_) => fdo::Error::Failed(e.to_string()),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| fdo::Error::Failed(format!("encode failed: {e}")))
}

/// Parse "YYYY-MM"; an empty string means every month.
fn parse_month(month: &str) -> fdo::Result<Option<(i32, u32)>> {
    let month = month.trim();
    if month.is_empty() {
        return Ok(None);
    }
    let invalid = || fdo::Error::InvalidArgs(format!("month must be YYYY-MM, got '{month}'"));
    let (y, m) = month.split_once('-').ok_or_else(invalid)?;
    let year: i32 = y.parse().map_err(|_| invalid())?;
    let m: u32 = m.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&m) {
        return Err(invalid());
    }
    Ok(Some((year, m)))
}

fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[interface(name = "org.iconsecurity.Kiosk1")]
impl KioskService {
    /// Check the admin password.
    async fn admin_login(&self, password: &str) -> bool {
        self.gate.unlock(password).is_some()
    }

    /// Register a new employee from one live camera frame.
    async fn register(
        &self,
        password: &str,
        name: &str,
        pin: &str,
        company_number: &str,
    ) -> fdo::Result<String> {
        let session = self.unlock(password)?;
        let form = NewEmployee {
            name: name.to_string(),
            pin: pin.to_string(),
            company_number: company_number.to_string(),
        };
        // Fail fast on bad input before holding the camera.
        let form = self.state.lock().await.check_registration(form).map_err(to_fdo)?;

        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| fdo::Error::Failed("camera unavailable".into()))?;
        tracing::info!(name = %form.name, "capturing face for registration");
        let observation = engine
            .detect(self.register_options)
            .await
            .map_err(|e| fdo::Error::Failed(format!("face capture failed: {e}")))?;
        let signature = match observation {
            Observation::Face { detection, .. } => Some(detection.descriptor),
            Observation::NoFace | Observation::NotReady => None,
        };

        let name = form.name.clone();
        self.state
            .lock()
            .await
            .register(&session, form, signature)
            .map_err(to_fdo)?;
        Ok(format!("Registered {name}"))
    }

    /// Update PIN and/or company number; empty strings keep the current value.
    /// Returns the updated employee as JSON.
    async fn edit_employee(
        &self,
        password: &str,
        index: u32,
        pin: &str,
        company_number: &str,
    ) -> fdo::Result<String> {
        let session = self.unlock(password)?;
        let update = EmployeeUpdate {
            pin: Some(pin.to_string()),
            company_number: Some(company_number.to_string()),
        };
        let mut state = self.state.lock().await;
        let employee = state.edit(&session, index as usize, update).map_err(to_fdo)?;
        to_json(employee)
    }

    /// Delete the employee at `index`; returns their name.
    async fn delete_employee(&self, password: &str, index: u32) -> fdo::Result<String> {
        let session = self.unlock(password)?;
        let employee = self
            .state
            .lock()
            .await
            .delete(&session, index as usize, now())
            .map_err(to_fdo)?;
        Ok(employee.name)
    }

    async fn clear_all_data(&self, password: &str) -> fdo::Result<()> {
        let session = self.unlock(password)?;
        self.state.lock().await.clear_all(&session).map_err(to_fdo)
    }

    /// Roster as a JSON array, in registration order.
    async fn list_employees(&self, password: &str) -> fdo::Result<String> {
        self.unlock(password)?;
        to_json(self.state.lock().await.employees())
    }

    async fn list_records(&self, password: &str) -> fdo::Result<String> {
        self.unlock(password)?;
        to_json(self.state.lock().await.records())
    }

    /// Days worked per employee as JSON; `month` is "YYYY-MM" or empty for all.
    async fn monthly_summary(&self, password: &str, month: &str) -> fdo::Result<String> {
        self.unlock(password)?;
        let month = parse_month(month)?;
        let state = self.state.lock().await;
        to_json(&report::monthly_summary(state.records(), month))
    }

    async fn export_csv(&self, password: &str) -> fdo::Result<String> {
        self.unlock(password)?;
        Ok(report::to_csv(self.state.lock().await.records()))
    }

    async fn export_pdf(&self, password: &str) -> fdo::Result<Vec<u8>> {
        self.unlock(password)?;
        let state = self.state.lock().await;
        report::to_pdf(state.records())
            .map_err(|e| fdo::Error::Failed(format!("pdf export failed: {e}")))
    }

    /// Return daemon status information.
    async fn status(&self) -> fdo::Result<String> {
        let display = self.display.borrow().clone();
        let state = self.state.lock().await;
        let clocked_in = state
            .employees()
            .iter()
            .filter(|e| state.is_clocked_in(&e.name))
            .count();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "camera": if self.engine.is_some() { "ready" } else { "unavailable" },
            "employees": state.employees().len(),
            "records": state.records().len(),
            "clocked_in": clocked_in,
            "message": display.message(),
            "display": display,
        })
        .to_string())
    }
}
