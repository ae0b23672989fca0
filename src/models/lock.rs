use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::slot::SelectedSlot;

/// Response of the lock endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockGrant {
    pub token: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
    #[serde(default)]
    pub session_duration: i64,
}

/// A server-granted hold on the selected slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservationLock {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub session_duration_seconds: i64,
    pub slots: Vec<SelectedSlot>,
}

impl ReservationLock {
    pub fn from_grant(grant: LockGrant, slots: Vec<SelectedSlot>) -> Option<Self> {
        let expires_at = DateTime::from_timestamp_millis(grant.expires_at)?;
        Some(Self {
            token: grant.token,
            expires_at,
            session_duration_seconds: grant.session_duration,
            slots,
        })
    }

    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_milliseconds()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_ms(now) <= 0
    }
}

/// `m:ss`, clamped at zero.
pub fn format_remaining(remaining_ms: i64) -> String {
    let ms = remaining_ms.max(0);
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    format!("{minutes}:{seconds:02}")
}
