use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

/// One bookable interval as reported by the availability feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub available: bool,
}

impl TimeSlot {
    pub fn start_minutes(&self) -> i64 {
        minutes_of_day(&self.start_time)
    }

    pub fn end_minutes(&self) -> i64 {
        minutes_of_day(&self.end_time)
    }

    /// Re-express both endpoints in the business offset. The instants are unchanged.
    pub fn with_offset(self, offset: &FixedOffset) -> Self {
        Self {
            start_time: self.start_time.with_timezone(offset),
            end_time: self.end_time.with_timezone(offset),
            available: self.available,
        }
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        let (start, end) = (self.start_minutes(), self.end_minutes());
        start < other.end_minutes() && end > other.start_minutes()
    }
}

/// A slot the customer picked, reduced to what the lock and booking calls need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedSlot {
    pub date: NaiveDate,
    pub time: DateTime<FixedOffset>,
}

impl SelectedSlot {
    pub fn matches(&self, slot: &TimeSlot) -> bool {
        self.time == slot.start_time
    }
}

pub fn minutes_of_day(dt: &DateTime<FixedOffset>) -> i64 {
    i64::from(dt.hour()) * 60 + i64::from(dt.minute())
}
