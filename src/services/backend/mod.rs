pub mod http;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{
    BookingConfirmation, BookingFilter, BookingRecord, CreateBookingRequest, DateAvailability,
    Holiday, LockGrant, NewHoliday, Package, Page, SelectedSlot, Suburb, TestingCenter, TimeSlot,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("booking API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("booking API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected booking API response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Message suitable for showing to the customer.
    pub fn message(&self) -> String {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) => None,
        }
    }

    /// The create call failed because the hold behind it is gone.
    pub fn is_lock_invalid(&self) -> bool {
        if self.status() == Some(410) {
            return true;
        }
        match self {
            ApiError::Status { message, .. } => {
                let message = message.to_lowercase();
                message.contains("lock")
                    && (message.contains("expired") || message.contains("invalid"))
            }
            _ => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

/// Query for one day of the availability feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub duration: u32,
    pub margin: u32,
    pub step: u32,
}

/// The remote driving-school API. Everything stateful lives behind it.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    /// Bearer token attached to subsequent calls.
    fn set_token(&self, token: Option<String>);

    async fn fetch_slots(&self, query: &SlotQuery) -> Result<Vec<TimeSlot>, ApiError>;
    async fn available_dates(&self, start_date: NaiveDate) -> Result<Vec<DateAvailability>, ApiError>;
    async fn lock_slots(&self, slots: &[SelectedSlot]) -> Result<LockGrant, ApiError>;
    async fn unlock_slots(&self, token: &str, slots: &[SelectedSlot]) -> Result<(), ApiError>;
    async fn create_booking(&self, request: &CreateBookingRequest) -> Result<BookingConfirmation, ApiError>;

    async fn packages(&self) -> Result<Vec<Package>, ApiError>;
    async fn suburbs(&self) -> Result<Vec<Suburb>, ApiError>;
    async fn testing_centers(&self) -> Result<Vec<TestingCenter>, ApiError>;

    /// Returns the access token.
    async fn login(&self, email: &str, password: &str) -> Result<String, ApiError>;

    async fn bookings(&self, filter: &BookingFilter) -> Result<Page<BookingRecord>, ApiError>;
    async fn my_bookings(&self, page: u32, limit: u32) -> Result<Page<BookingRecord>, ApiError>;
    async fn confirm_booking(&self, id: &str) -> Result<(), ApiError>;
    async fn cancel_booking(&self, id: &str) -> Result<(), ApiError>;

    async fn holidays(&self) -> Result<Vec<Holiday>, ApiError>;
    async fn create_holiday(&self, holiday: &NewHoliday) -> Result<Holiday, ApiError>;
    async fn delete_holiday(&self, id: &str) -> Result<(), ApiError>;
}
