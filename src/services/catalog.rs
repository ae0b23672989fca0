use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::models::{PackageRules, TimeSlot};
use crate::services::backend::{ApiError, BookingBackend, SlotQuery};

/// Granularity of the availability query, independent of lesson length.
pub const SLOT_STEP_MINUTES: u32 = 15;

/// The inputs a catalog was loaded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogKey {
    pub date: NaiveDate,
    pub duration: u32,
    pub margin: u32,
}

impl CatalogKey {
    pub fn new(date: NaiveDate, rules: &PackageRules) -> Self {
        Self {
            date,
            duration: rules.duration,
            margin: rules.margin,
        }
    }

    pub fn query(&self) -> SlotQuery {
        SlotQuery {
            date: self.date,
            duration: self.duration,
            margin: self.margin,
            step: SLOT_STEP_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogState {
    Empty,
    Loading,
    Loaded,
    Failed,
}

/// Raw slots for one (date, duration, margin). Never carries another key's slots.
#[derive(Debug, Clone)]
pub struct SlotCatalog {
    key: Option<CatalogKey>,
    slots: Vec<TimeSlot>,
    state: CatalogState,
}

impl Default for SlotCatalog {
    fn default() -> Self {
        Self {
            key: None,
            slots: Vec::new(),
            state: CatalogState::Empty,
        }
    }
}

impl SlotCatalog {
    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn key(&self) -> Option<&CatalogKey> {
        self.key.as_ref()
    }

    pub fn state(&self) -> CatalogState {
        self.state
    }

    pub fn is_for(&self, key: &CatalogKey) -> bool {
        self.key.as_ref() == Some(key)
    }

    pub fn find(&self, start: &DateTime<FixedOffset>) -> Option<&TimeSlot> {
        self.slots.iter().find(|s| s.start_time == *start)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Switch to `key` and drop whatever was held before.
    pub fn begin(&mut self, key: CatalogKey) {
        self.key = Some(key);
        self.slots.clear();
        self.state = CatalogState::Loading;
    }

    /// Apply a fetch result. Ignored unless it belongs to the current key.
    pub fn complete(&mut self, key: &CatalogKey, mut slots: Vec<TimeSlot>) -> bool {
        if !self.is_for(key) {
            return false;
        }
        slots.sort_by_key(|s| s.start_time);
        self.slots = slots;
        self.state = CatalogState::Loaded;
        true
    }

    pub fn fail(&mut self, key: &CatalogKey) -> bool {
        if !self.is_for(key) {
            return false;
        }
        self.slots.clear();
        self.state = CatalogState::Failed;
        true
    }
}

/// Fetch one day of slots, optionally re-expressed in the business offset.
pub async fn fetch_catalog(
    backend: &dyn BookingBackend,
    key: &CatalogKey,
    offset: Option<FixedOffset>,
) -> Result<Vec<TimeSlot>, ApiError> {
    let slots = backend.fetch_slots(&key.query()).await?;
    Ok(match offset {
        Some(offset) => slots.into_iter().map(|s| s.with_offset(&offset)).collect(),
        None => slots,
    })
}
