//! Candidate slot enumeration for a calendar day.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::AppointmentStore;

/// Opening hours for on-site consultations. The span must divide evenly
/// into two-hour slots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

impl BusinessHours {
    pub fn validate(&self) -> Result<()> {
        if self.end_hour > 24 {
            return Err(Error::Config(format!(
                "business hours end at {} which is past midnight",
                self.end_hour
            )));
        }
        if self.end_hour <= self.start_hour {
            return Err(Error::Config(format!(
                "business hours {}..{} are empty",
                self.start_hour, self.end_hour
            )));
        }
        if (self.end_hour - self.start_hour) % 2 != 0 {
            return Err(Error::Config(format!(
                "business hours {}..{} do not divide into 2-hour slots",
                self.start_hour, self.end_hour
            )));
        }
        Ok(())
    }

    pub fn slot_count(&self) -> u32 {
        (self.end_hour - self.start_hour) / 2
    }

    /// All candidate slot start times for `day`, on the hour, ascending.
    pub fn slot_starts(&self, day: NaiveDate) -> Vec<DateTime<Utc>> {
        (0..self.slot_count())
            .filter_map(|i| {
                // Hours are validated at config time, so this never skips.
                day.and_hms_opt(self.start_hour + 2 * i, 0, 0)
                    .map(|naive| Utc.from_utc_datetime(&naive))
            })
            .collect()
    }
}

/// Candidate slots for `day` that do not conflict with stored appointments.
/// A fully booked day yields an empty vector.
pub fn available_slots(
    hours: &BusinessHours,
    store: &AppointmentStore,
    day: NaiveDate,
) -> Result<Vec<DateTime<Utc>>> {
    let mut open = Vec::new();
    for slot in hours.slot_starts(day) {
        if !store.has_conflict(slot)? {
            open.push(slot);
        }
    }
    Ok(open)
}
