use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};

use crate::booking::BookingService;
use crate::error::Error;
use crate::middleware::ClientKey;
use crate::store::NewAppointment;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub booking: Arc<BookingService>,
}

const PROPERTY_TYPES: &[&str] = &["residential", "apartment", "commercial", "hospital", "other"];
const PROJECT_TYPES: &[&str] = &["new-installation", "replacement", "repair", "consultation"];

fn validate_property_type(value: &str) -> Result<(), ValidationError> {
    if PROPERTY_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("property_type").with_message("unknown property type".into()))
    }
}

fn validate_project_type(value: &str) -> Result<(), ValidationError> {
    if PROJECT_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("project_type").with_message("unknown project type".into()))
    }
}

/// Booking form payload. Field-level shape checks happen here, before the
/// core ever sees the request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[validate(length(min = 2, message = "name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 7, message = "phone number is too short"))]
    pub phone: String,
    #[validate(custom(function = validate_property_type))]
    pub property_type: String,
    #[validate(custom(function = validate_project_type))]
    pub project_type: String,
    pub appointment_date: DateTime<Utc>,
    pub message: Option<String>,
}

impl BookingRequest {
    fn into_new_appointment(self) -> NewAppointment {
        NewAppointment {
            name: self.name,
            email: self.email,
            phone: self.phone,
            property_type: self.property_type,
            project_type: self.project_type,
            appointment_date: self.appointment_date,
            message: self.message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub slots: Vec<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct LimitsResponse {
    pub remaining: u32,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub appointments: usize,
}

/// Attempt to book an appointment for the calling client
pub async fn create_appointment(
    State(state): State<AppState>,
    ClientKey(client_key): ClientKey,
    Json(payload): Json<BookingRequest>,
) -> Result<impl IntoResponse, Error> {
    payload
        .validate()
        .map_err(|e| Error::Validation(e.to_string()))?;

    let appointment = state
        .booking
        .request_booking(&client_key, payload.into_new_appointment())?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

/// List all booked appointments, in insertion order
pub async fn list_appointments(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    let appointments = state.booking.list_appointments()?;
    Ok(Json(appointments))
}

/// Open 2-hour slots for a calendar day (`YYYY-MM-DD`)
pub async fn available_slots(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let day = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| Error::Validation(format!("invalid date '{}', expected YYYY-MM-DD", date)))?;

    let slots = state.booking.available_slots(day)?;
    Ok(Json(SlotsResponse { date: day, slots }))
}

/// Remaining booking attempts in the caller's current window
pub async fn remaining_limits(
    State(state): State<AppState>,
    ClientKey(client_key): ClientKey,
) -> Result<impl IntoResponse, Error> {
    let remaining = state.booking.remaining_requests(&client_key)?;
    Ok(Json(LimitsResponse { remaining }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let appointments = state.booking.appointment_count()?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        appointments,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_categories_pass_validation() {
        for value in PROPERTY_TYPES {
            assert!(validate_property_type(value).is_ok());
        }
        for value in PROJECT_TYPES {
            assert!(validate_project_type(value).is_ok());
        }
    }

    #[test]
    fn unknown_categories_fail_validation() {
        assert!(validate_property_type("castle").is_err());
        assert!(validate_project_type("demolition").is_err());
    }

    #[test]
    fn booking_request_shape_is_checked() {
        let request = BookingRequest {
            name: "A".to_string(),
            email: "not-an-email".to_string(),
            phone: "123".to_string(),
            property_type: "residential".to_string(),
            project_type: "repair".to_string(),
            appointment_date: Utc::now(),
            message: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("phone"));
    }
}
