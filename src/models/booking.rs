use serde::{Deserialize, Serialize};

use super::reference::string_or_number;
use super::slot::SelectedSlot;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerDetails {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub pickup_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CustomerDetails {
    /// Field-level problems, empty when the form can be submitted.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.customer_name.trim().is_empty() {
            problems.push("Name is required".to_string());
        }
        if self.customer_phone.trim().is_empty() {
            problems.push("Phone is required".to_string());
        }
        if self.customer_email.trim().is_empty() {
            problems.push("Email is required".to_string());
        } else if !looks_like_email(self.customer_email.trim()) {
            problems.push("Invalid email".to_string());
        }
        if self.pickup_address.trim().is_empty() {
            problems.push("Address is required".to_string());
        }
        problems
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Payload for the create endpoint. Consumes the lock named by `token`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testing_center_id: Option<String>,
    pub suburb_id: String,
    pub package_id: String,
    pub duration: u32,
    pub token: String,
    pub customer_details: CustomerDetails,
    pub slots: Vec<SelectedSlot>,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub name: String,
    #[serde(default)]
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<Instructor>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn can_confirm(&self) -> bool {
        *self == BookingStatus::Pending
    }

    pub fn can_cancel(&self) -> bool {
        *self != BookingStatus::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedSlot {
    pub start_time: String,
    pub end_time: String,
}

/// A persisted booking as listed by the portal endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub status: BookingStatus,
    #[serde(default)]
    pub package: Option<serde_json::Value>,
    #[serde(default)]
    pub testing_center: Option<serde_json::Value>,
    #[serde(default)]
    pub suburb: Option<serde_json::Value>,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub booking_slots: Vec<BookedSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self, limit: u32) -> u64 {
        if limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(limit))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suburb_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_id: Option<String>,
    pub page: u32,
    pub limit: u32,
}
