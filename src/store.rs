//! Appointment records and the conflict-checking store.
//!
//! The store is the sole authority on slot occupancy: an insert only
//! succeeds when no existing appointment on the same calendar day starts
//! within two hours of the candidate. Appointments are kept in memory and
//! mirrored to a single named blob after every successful insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::error::{Error, Result};

/// Service slots are two hours long. Exactly two hours apart is not a
/// conflict; the comparison is strict.
pub const SLOT_LENGTH_MS: i64 = 2 * 60 * 60 * 1000;

const APPOINTMENTS_BLOB: &str = "appointments";

/// A booked consultation visit. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub property_type: String,
    pub project_type: String,
    pub appointment_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Candidate payload for a new booking; `id` and `created_at` are assigned
/// by the store. Contact fields are opaque here and validated upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub property_type: String,
    pub project_type: String,
    pub appointment_date: DateTime<Utc>,
    pub message: Option<String>,
}

/// Get/set over a single named blob. The only persistence primitive the
/// store needs; date fields must round-trip at millisecond precision.
pub trait BlobStorage: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// In-memory blob storage, used in tests and as a no-persistence fallback.
#[derive(Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStorage for MemoryStorage {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| Error::Internal("blob table lock poisoned".to_string()))?;
        Ok(blobs.get(name).cloned())
    }

    fn set(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| Error::Internal("blob table lock poisoned".to_string()))?;
        blobs.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// One JSON file per blob under a data directory. Writes go through a
/// temp file plus rename so a crash mid-write never truncates the blob.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl BlobStorage for FileStorage {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.blob_path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("failed to read blob '{}': {}", name, e))),
        }
    }

    fn set(&self, name: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Storage(format!("failed to create data dir: {}", e)))?;

        let path = self.blob_path(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .map_err(|e| Error::Storage(format!("failed to write blob '{}': {}", name, e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| Error::Storage(format!("failed to commit blob '{}': {}", name, e)))?;
        Ok(())
    }
}

/// Process-lifetime collection of booked appointments.
///
/// All reads and the conflict-check-then-insert sequence run under one
/// mutex, so two concurrent requests cannot both pass the check for the
/// same slot.
pub struct AppointmentStore {
    storage: Box<dyn BlobStorage>,
    clock: SharedClock,
    appointments: Mutex<Vec<Appointment>>,
}

impl AppointmentStore {
    /// Loads previously persisted appointments, or starts empty when the
    /// blob does not exist yet.
    pub fn open(storage: Box<dyn BlobStorage>, clock: SharedClock) -> Result<Self> {
        let appointments = match storage.get(APPOINTMENTS_BLOB)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::Storage(format!("corrupt appointment blob: {}", e)))?,
            None => Vec::new(),
        };

        tracing::debug!(count = appointments.len(), "appointment store opened");
        Ok(Self {
            storage,
            clock,
            appointments: Mutex::new(appointments),
        })
    }

    /// Inserts a booking unless it conflicts with an existing one. On
    /// success the new appointment gets a fresh id and creation timestamp
    /// and the full list is re-persisted.
    pub fn add_appointment(&self, candidate: NewAppointment) -> Result<Appointment> {
        let mut appointments = self.lock_appointments()?;

        if Self::conflicts_with(&appointments, candidate.appointment_date) {
            return Err(Error::SlotConflict);
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            name: candidate.name,
            email: candidate.email,
            phone: candidate.phone,
            property_type: candidate.property_type,
            project_type: candidate.project_type,
            appointment_date: candidate.appointment_date,
            message: candidate.message,
            created_at: self.clock.now(),
        };

        appointments.push(appointment.clone());
        if let Err(e) = self.persist(&appointments) {
            appointments.pop();
            return Err(e);
        }

        tracing::info!(
            id = %appointment.id,
            date = %appointment.appointment_date,
            "appointment booked"
        );
        Ok(appointment)
    }

    /// True iff an existing appointment shares the same UTC calendar day
    /// and starts strictly within two hours of `date`.
    pub fn has_conflict(&self, date: DateTime<Utc>) -> Result<bool> {
        let appointments = self.lock_appointments()?;
        Ok(Self::conflicts_with(&appointments, date))
    }

    /// All stored appointments, in insertion order.
    pub fn list_appointments(&self) -> Result<Vec<Appointment>> {
        Ok(self.lock_appointments()?.clone())
    }

    pub fn appointment_count(&self) -> Result<usize> {
        Ok(self.lock_appointments()?.len())
    }

    fn conflicts_with(appointments: &[Appointment], date: DateTime<Utc>) -> bool {
        appointments.iter().any(|existing| {
            existing.appointment_date.date_naive() == date.date_naive()
                && (existing.appointment_date - date)
                    .num_milliseconds()
                    .abs()
                    < SLOT_LENGTH_MS
        })
    }

    fn persist(&self, appointments: &[Appointment]) -> Result<()> {
        let bytes = serde_json::to_vec(appointments)
            .map_err(|e| Error::Storage(format!("failed to serialize appointments: {}", e)))?;
        self.storage.set(APPOINTMENTS_BLOB, &bytes)
    }

    fn lock_appointments(&self) -> Result<MutexGuard<'_, Vec<Appointment>>> {
        self.appointments
            .lock()
            .map_err(|_| Error::Internal("appointment store lock poisoned".to_string()))
    }
}
