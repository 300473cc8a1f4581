//! Booking orchestration: rate limiting in front of the appointment store.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::rate_limit::{category, RateLimiter};
use crate::slots::{self, BusinessHours};
use crate::store::{Appointment, AppointmentStore, NewAppointment};

/// Single entry point for booking attempts. Owns the ordering of checks:
/// the appointment-scoped limit runs before the global one so a denied
/// caller gets the most actionable reason.
pub struct BookingService {
    limiter: Arc<RateLimiter>,
    store: Arc<AppointmentStore>,
    hours: BusinessHours,
}

impl BookingService {
    pub fn new(
        limiter: Arc<RateLimiter>,
        store: Arc<AppointmentStore>,
        hours: BusinessHours,
    ) -> Self {
        Self {
            limiter,
            store,
            hours,
        }
    }

    /// Attempts to book `candidate` on behalf of `client_key`.
    ///
    /// Both rate-limit checks count the call even when it is ultimately
    /// denied.
    pub fn request_booking(
        &self,
        client_key: &str,
        candidate: NewAppointment,
    ) -> Result<Appointment> {
        if self.limiter.should_limit(client_key, category::APPOINTMENT)? {
            let wait = self
                .limiter
                .time_until_reset(client_key, category::APPOINTMENT)?;
            return Err(Error::RateLimited {
                category: category::APPOINTMENT.to_string(),
                retry_after: Some(wait),
            });
        }

        if self.limiter.should_limit(client_key, category::GLOBAL)? {
            return Err(Error::RateLimited {
                category: category::GLOBAL.to_string(),
                retry_after: None,
            });
        }

        self.store.add_appointment(candidate)
    }

    /// Remaining booking attempts in the caller's current appointment window.
    pub fn remaining_requests(&self, client_key: &str) -> Result<u32> {
        self.limiter
            .remaining_requests(client_key, category::APPOINTMENT)
    }

    /// Open slots for `day`, business hours applied.
    pub fn available_slots(&self, day: NaiveDate) -> Result<Vec<DateTime<Utc>>> {
        slots::available_slots(&self.hours, &self.store, day)
    }

    pub fn list_appointments(&self) -> Result<Vec<Appointment>> {
        self.store.list_appointments()
    }

    pub fn appointment_count(&self) -> Result<usize> {
        self.store.appointment_count()
    }
}
