use std::env;
use std::time::Duration;

use chrono::FixedOffset;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub api_base_url: String,
    pub api_timeout_secs: u64,
    /// Offset the business operates in; `None` keeps whatever the API sends.
    pub business_utc_offset_minutes: Option<i32>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "lessonbook.db".to_string()),
            api_base_url: env::var("BOOKING_API_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            api_timeout_secs: env::var("BOOKING_API_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            business_utc_offset_minutes: env::var("BUSINESS_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn business_offset(&self) -> Option<FixedOffset> {
        self.business_utc_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m * 60))
    }
}
