//! Per-customer booking sessions and the transitions between their steps.
//!
//! Every transition that awaits the booking API captures the session epoch
//! before the call and re-checks it afterwards. Cancel, expiry and completion
//! bump the epoch, so a response that lands after any of them is discarded
//! (and a lock it granted is released) instead of being applied.

use std::future::Future;
use std::sync::{Arc, PoisonError, Weak};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    BookingConfirmation, BookingStep, CreateBookingRequest, CustomerDetails, Package,
    PackageRules, ReservationLock, SelectedSlot, Suburb, TestingCenter, TimeSlot,
};
use crate::services::catalog::{fetch_catalog, CatalogKey, SlotCatalog};
use crate::services::countdown::Countdown;
use crate::services::lock::{release_best_effort, release_slots, HeldLock};
use crate::services::projector::{self, Toggle};
use crate::state::AppState;

pub const EXPIRED_NOTICE: &str = "Session expired. Please start over.";

#[derive(Debug)]
pub struct BookingSession {
    pub id: Uuid,
    pub step: BookingStep,
    pub testing_center: Option<TestingCenter>,
    pub suburb: Option<Suburb>,
    pub package: Option<Package>,
    pub date: Option<NaiveDate>,
    pub catalog: SlotCatalog,
    pub selection: Vec<SelectedSlot>,
    /// Full slot records for the selection, kept across date changes.
    pub selection_details: Vec<TimeSlot>,
    pub confirmation: Option<BookingConfirmation>,
    pub notice: Option<String>,
    pub created_at: DateTime<Utc>,
    epoch: u64,
    lock: Option<HeldLock>,
    lock_pending: bool,
}

impl BookingSession {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            step: BookingStep::Location,
            testing_center: None,
            suburb: None,
            package: None,
            date: None,
            catalog: SlotCatalog::default(),
            selection: Vec::new(),
            selection_details: Vec::new(),
            confirmation: None,
            notice: None,
            created_at: Utc::now(),
            epoch: 0,
            lock: None,
            lock_pending: false,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn lock(&self) -> Option<&ReservationLock> {
        self.lock.as_ref().map(HeldLock::lock)
    }

    pub fn time_left(&self, now: DateTime<Utc>) -> Option<String> {
        self.lock.as_ref().map(|held| held.time_left(now))
    }

    pub fn rules(&self) -> Option<PackageRules> {
        self.package.as_ref().map(Package::rules)
    }

    /// Slots offered for the current date under the current selection.
    pub fn displayed_slots(&self) -> Vec<TimeSlot> {
        match self.rules() {
            Some(rules) => projector::project(self.catalog.slots(), &self.selection, &rules),
            None => Vec::new(),
        }
    }

    pub fn total_price(&self) -> f64 {
        self.package
            .as_ref()
            .map(|p| p.total_price(self.selection.len()))
            .unwrap_or(0.0)
    }

    pub fn require_step(&self, expected: BookingStep) -> Result<(), AppError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(AppError::InvalidStep {
                expected: expected.as_str(),
                actual: self.step.as_str(),
            })
        }
    }

    /// The selection is frozen while a lock is held or being requested.
    fn require_unlocked(&self) -> Result<(), AppError> {
        if self.lock.is_some() || self.lock_pending {
            return Err(AppError::LockAlreadyHeld);
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.epoch += 1;
        self.lock_pending = false;
    }

    /// Detach the lock, stopping its countdown.
    fn take_lock(&mut self) -> Option<ReservationLock> {
        self.lock.take().map(HeldLock::release)
    }

    fn clear_selection(&mut self) {
        self.selection.clear();
        self.selection_details.clear();
    }

    fn reset_after_expiry(&mut self) -> Option<ReservationLock> {
        self.invalidate();
        let lock = self.take_lock();
        self.clear_selection();
        self.date = None;
        self.catalog.clear();
        self.step = BookingStep::Location;
        self.notice = Some(EXPIRED_NOTICE.to_string());
        lock
    }
}

fn with_session<R>(
    state: &AppState,
    id: Uuid,
    f: impl FnOnce(&mut BookingSession) -> Result<R, AppError>,
) -> Result<R, AppError> {
    let mut sessions = state.sessions.lock().unwrap_or_else(PoisonError::into_inner);
    let session = sessions
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("booking session {id}")))?;
    f(session)
}

/// Read-only access for views.
pub fn inspect<R>(
    state: &AppState,
    id: Uuid,
    f: impl FnOnce(&BookingSession) -> R,
) -> Result<R, AppError> {
    with_session(state, id, |s| Ok(f(s)))
}

pub fn create_session(state: &AppState) -> Uuid {
    let id = Uuid::new_v4();
    state
        .sessions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(id, BookingSession::new(id));
    tracing::info!(session_id = %id, "booking session started");
    id
}

/// Drop a session, releasing any lock it still holds.
pub async fn abandon_session(state: &AppState, id: Uuid) -> Result<(), AppError> {
    let removed = state
        .sessions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&id);
    let Some(mut session) = removed else {
        return Err(AppError::NotFound(format!("booking session {id}")));
    };

    if let Some(lock) = session.take_lock() {
        release_best_effort(state.backend.as_ref(), &lock).await;
    }
    tracing::info!(session_id = %id, "booking session abandoned");
    Ok(())
}

pub async fn select_location(
    state: &AppState,
    id: Uuid,
    center_id: Option<String>,
    suburb_id: Option<String>,
) -> Result<(), AppError> {
    with_session(state, id, |s| s.require_step(BookingStep::Location))?;
    if center_id.is_none() && suburb_id.is_some() {
        return Err(AppError::Validation("select a testing center first".into()));
    }

    let (suburbs, centers) =
        tokio::try_join!(state.backend.suburbs(), state.backend.testing_centers())?;

    let center = match center_id {
        Some(cid) => Some(
            centers
                .into_iter()
                .find(|c| c.id == cid)
                .ok_or_else(|| AppError::NotFound(format!("testing center {cid}")))?,
        ),
        None => None,
    };
    let suburb = match suburb_id {
        Some(sid) => Some(
            suburbs
                .into_iter()
                .find(|s| s.id == sid)
                .ok_or_else(|| AppError::NotFound(format!("suburb {sid}")))?,
        ),
        None => None,
    };

    with_session(state, id, |s| {
        s.require_step(BookingStep::Location)?;
        if s.testing_center != center {
            s.suburb = None;
        }
        s.testing_center = center;
        if suburb.is_some() {
            s.suburb = suburb;
        }
        s.notice = None;
        Ok(())
    })
}

pub fn advance_from_location(state: &AppState, id: Uuid) -> Result<(), AppError> {
    with_session(state, id, |s| {
        s.require_step(BookingStep::Location)?;
        if s.suburb.is_none() {
            return Err(AppError::Validation("select a suburb to continue".into()));
        }
        s.step = BookingStep::Package;
        Ok(())
    })
}

pub async fn select_package(state: &AppState, id: Uuid, package_id: &str) -> Result<(), AppError> {
    with_session(state, id, |s| s.require_step(BookingStep::Package))?;

    let package = state
        .backend
        .packages()
        .await?
        .into_iter()
        .find(|p| p.id == package_id)
        .ok_or_else(|| AppError::NotFound(format!("package {package_id}")))?;

    with_session(state, id, |s| {
        s.require_step(BookingStep::Package)?;
        s.package = Some(package);
        Ok(())
    })
}

/// Enter date and time selection. The selection starts empty for the chosen package.
pub async fn advance_from_package(state: &AppState, id: Uuid) -> Result<(), AppError> {
    let reload = with_session(state, id, |s| {
        s.require_step(BookingStep::Package)?;
        let rules = s
            .rules()
            .ok_or_else(|| AppError::Validation("select a package to continue".into()))?;
        s.invalidate();
        s.clear_selection();
        s.step = BookingStep::DateTime;
        s.catalog.clear();
        Ok(s.date.map(|date| {
            let key = CatalogKey::new(date, &rules);
            s.catalog.begin(key.clone());
            key
        }))
    })?;

    if let Some(key) = reload {
        load_catalog(state, id, key).await?;
    }
    Ok(())
}

pub fn go_back(state: &AppState, id: Uuid) -> Result<(), AppError> {
    with_session(state, id, |s| {
        let previous = s.step.previous().ok_or(AppError::InvalidStep {
            expected: BookingStep::DateTime.as_str(),
            actual: s.step.as_str(),
        })?;
        // A lock request still in flight belongs to the step being left.
        s.invalidate();
        s.step = previous;
        Ok(())
    })
}

pub async fn select_date(state: &AppState, id: Uuid, date: NaiveDate) -> Result<(), AppError> {
    let key = with_session(state, id, |s| {
        s.require_step(BookingStep::DateTime)?;
        s.require_unlocked()?;
        let rules = s
            .rules()
            .ok_or_else(|| AppError::Validation("select a package first".into()))?;
        let key = CatalogKey::new(date, &rules);
        s.date = Some(date);
        s.catalog.begin(key.clone());
        Ok(key)
    })?;

    load_catalog(state, id, key).await
}

async fn load_catalog(state: &AppState, id: Uuid, key: CatalogKey) -> Result<(), AppError> {
    let result = fetch_catalog(state.backend.as_ref(), &key, state.config.business_offset()).await;

    with_session(state, id, |s| match result {
        Ok(slots) => {
            if !s.catalog.complete(&key, slots) {
                return Err(AppError::Stale);
            }
            tracing::debug!(session_id = %id, date = %key.date, slots = s.catalog.slots().len(), "catalog loaded");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(session_id = %id, date = %key.date, error = %e, "failed to load slots");
            if s.catalog.fail(&key) {
                Err(AppError::SlotsUnavailable(e.message()))
            } else {
                Err(AppError::Stale)
            }
        }
    })
}

async fn refresh_catalog(state: &AppState, id: Uuid) -> Result<(), AppError> {
    let key = with_session(state, id, |s| {
        Ok(s.catalog.key().cloned().map(|key| {
            s.catalog.begin(key.clone());
            key
        }))
    })?;

    match key {
        Some(key) => load_catalog(state, id, key).await,
        None => Ok(()),
    }
}

pub fn toggle_slot(state: &AppState, id: Uuid, start: DateTime<FixedOffset>) -> Result<Toggle, AppError> {
    with_session(state, id, |s| {
        s.require_step(BookingStep::DateTime)?;
        s.require_unlocked()?;
        let rules = s
            .rules()
            .ok_or_else(|| AppError::Validation("select a package first".into()))?;
        let date = s
            .date
            .ok_or_else(|| AppError::Validation("select a date first".into()))?;

        let outcome = projector::toggle(s.catalog.slots(), &mut s.selection, date, &start, &rules)?;
        match &outcome {
            Toggle::Added(slot) => s.selection_details.push(slot.clone()),
            Toggle::Removed => s.selection_details.retain(|d| d.start_time != start),
        }
        Ok(outcome)
    })
}

/// Hold the selected slots and move to the details step.
pub async fn acquire_lock(state: &Arc<AppState>, id: Uuid) -> Result<(), AppError> {
    let (slots, epoch) = with_session(state, id, |s| {
        s.require_step(BookingStep::DateTime)?;
        s.require_unlocked()?;
        if s.selection.is_empty() {
            return Err(AppError::Validation("select at least one time slot".into()));
        }
        s.lock_pending = true;
        Ok((s.selection.clone(), s.epoch))
    })?;

    let grant = match state.backend.lock_slots(&slots).await {
        Ok(grant) => grant,
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "slot lock rejected");
            let current = with_session(state, id, |s| {
                let current = s.epoch == epoch;
                if current {
                    s.lock_pending = false;
                }
                Ok(current)
            })
            .unwrap_or(false);
            if current {
                // The slots are probably taken now; show the fresh picture.
                if let Err(refresh) = refresh_catalog(state, id).await {
                    tracing::warn!(session_id = %id, error = %refresh, "catalog refresh failed");
                }
            }
            return Err(AppError::LockConflict(e.message()));
        }
    };

    let token = grant.token.clone();
    let Some(lock) = ReservationLock::from_grant(grant, slots.clone()) else {
        tracing::warn!(session_id = %id, "lock grant carried an unusable expiry");
        release_slots(state.backend.as_ref(), &token, &slots).await;
        if let Err(e) = with_session(state, id, |s| {
            if s.epoch == epoch {
                s.lock_pending = false;
            }
            Ok(())
        }) {
            tracing::warn!(session_id = %id, error = %e, "session gone after lock grant");
        }
        return Err(AppError::LockConflict("lock expiry is out of range".into()));
    };

    let on_expire = expire_when_due(Arc::downgrade(state), id, epoch);
    let applied = with_session(state, id, |s| {
        if s.epoch != epoch {
            return Ok(false);
        }
        s.lock_pending = false;
        if s.step != BookingStep::DateTime || s.selection != slots {
            return Ok(false);
        }
        let countdown = Countdown::start(id, lock.expires_at, state.countdown_tx.clone(), on_expire);
        s.lock = Some(HeldLock::new(lock.clone(), countdown));
        s.step = BookingStep::Details;
        s.notice = None;
        Ok(true)
    })
    .unwrap_or(false);

    if !applied {
        tracing::info!(session_id = %id, "lock granted for a superseded booking, releasing");
        release_best_effort(state.backend.as_ref(), &lock).await;
        return Err(AppError::Stale);
    }

    tracing::info!(
        session_id = %id,
        slots = slots.len(),
        expires_at = %lock.expires_at,
        "slots locked"
    );
    Ok(())
}

fn expire_when_due(state: Weak<AppState>, id: Uuid, epoch: u64) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let Some(state) = state.upgrade() else {
            return;
        };
        if let Err(e) = expire_lock(&state, id, epoch).await {
            tracing::debug!(session_id = %id, error = %e, "expiry skipped");
        }
    }
}

/// Reset a session whose lock ran out. Returns false if the lock was already gone.
pub async fn expire_lock(state: &AppState, id: Uuid, epoch: u64) -> Result<bool, AppError> {
    let lock = with_session(state, id, |s| {
        if s.epoch != epoch || s.lock.is_none() {
            return Ok(None);
        }
        Ok(s.reset_after_expiry())
    })?;

    match lock {
        Some(lock) => {
            tracing::warn!(session_id = %id, "reservation lock expired, booking reset");
            release_best_effort(state.backend.as_ref(), &lock).await;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Give the slots back and return to date and time selection.
pub async fn cancel_details(state: &AppState, id: Uuid) -> Result<(), AppError> {
    let lock = with_session(state, id, |s| {
        s.require_step(BookingStep::Details)?;
        s.invalidate();
        s.step = BookingStep::DateTime;
        s.notice = None;
        Ok(s.take_lock())
    })?;

    if let Some(lock) = lock {
        release_best_effort(state.backend.as_ref(), &lock).await;
    }
    Ok(())
}

enum Submission {
    Send(CreateBookingRequest, u64),
    Expired(u64),
}

/// Create the booking under the held lock.
pub async fn submit(state: &AppState, id: Uuid, details: CustomerDetails) -> Result<(), AppError> {
    let problems = details.problems();
    if !problems.is_empty() {
        return Err(AppError::Validation(problems.join(", ")));
    }

    let submission = with_session(state, id, |s| {
        s.require_step(BookingStep::Details)?;
        let lock = s.lock().ok_or(AppError::LockExpired)?;
        if lock.is_expired(Utc::now()) {
            return Ok(Submission::Expired(s.epoch));
        }

        let suburb = s
            .suburb
            .as_ref()
            .ok_or_else(|| AppError::Validation("select a suburb first".into()))?;
        let package = s
            .package
            .as_ref()
            .ok_or_else(|| AppError::Validation("select a package first".into()))?;

        let request = CreateBookingRequest {
            testing_center_id: s.testing_center.as_ref().map(|c| c.id.clone()),
            suburb_id: suburb.id.clone(),
            package_id: package.id.clone(),
            duration: package.rules().duration,
            token: lock.token.clone(),
            customer_details: details,
            slots: lock.slots.clone(),
            total_amount: s.total_price(),
        };
        Ok(Submission::Send(request, s.epoch))
    })?;

    let (request, epoch) = match submission {
        Submission::Send(request, epoch) => (request, epoch),
        Submission::Expired(epoch) => {
            expire_lock(state, id, epoch).await?;
            return Err(AppError::LockExpired);
        }
    };

    match state.backend.create_booking(&request).await {
        Ok(confirmation) => with_session(state, id, |s| {
            if s.epoch != epoch {
                return Err(AppError::Stale);
            }
            s.invalidate();
            // Consumed by the booking: no unlock.
            let _consumed = s.take_lock();
            s.clear_selection();
            s.confirmation = Some(confirmation);
            s.step = BookingStep::Complete;
            tracing::info!(session_id = %id, "booking created");
            Ok(())
        }),
        Err(e) if e.is_lock_invalid() => {
            tracing::warn!(session_id = %id, error = %e, "lock rejected at submission");
            expire_lock(state, id, epoch).await?;
            Err(AppError::LockExpired)
        }
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "booking creation failed");
            Err(AppError::BookingFailed(e.message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> Package {
        Package {
            id: "pkg-1".to_string(),
            name: "1HR LESSON".to_string(),
            description: String::new(),
            price: 70.0,
            maximum_slots_count: 1,
        }
    }

    #[test]
    fn test_require_step() {
        let session = BookingSession::new(Uuid::new_v4());
        assert!(session.require_step(BookingStep::Location).is_ok());
        match session.require_step(BookingStep::Details) {
            Err(AppError::InvalidStep { expected, actual }) => {
                assert_eq!(expected, "details");
                assert_eq!(actual, "location");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_price_follows_selection_count() {
        let mut session = BookingSession::new(Uuid::new_v4());
        assert_eq!(session.total_price(), 0.0);

        session.package = Some(package());
        let time = DateTime::parse_from_rfc3339("2025-06-16T09:00:00+10:00").unwrap();
        let date = time.date_naive();
        session.selection.push(SelectedSlot { date, time });
        session.selection.push(SelectedSlot {
            date,
            time: time + chrono::Duration::minutes(75),
        });
        assert_eq!(session.total_price(), 140.0);
    }

    #[test]
    fn test_expiry_reset_returns_to_first_step() {
        let mut session = BookingSession::new(Uuid::new_v4());
        session.package = Some(package());
        session.step = BookingStep::Details;
        session.date = NaiveDate::from_ymd_opt(2025, 6, 16);
        let before = session.epoch();

        assert!(session.reset_after_expiry().is_none());
        assert_eq!(session.step, BookingStep::Location);
        assert_eq!(session.notice.as_deref(), Some(EXPIRED_NOTICE));
        assert!(session.date.is_none());
        assert!(session.selection.is_empty());
        assert_eq!(session.epoch(), before + 1);
        // package choice survives the reset
        assert!(session.package.is_some());
    }

    #[test]
    fn test_pending_lock_freezes_selection() {
        let mut session = BookingSession::new(Uuid::new_v4());
        assert!(session.require_unlocked().is_ok());

        session.lock_pending = true;
        assert!(matches!(session.require_unlocked(), Err(AppError::LockAlreadyHeld)));

        // leaving the step drops the pending request
        session.invalidate();
        assert!(session.require_unlocked().is_ok());
    }

    #[test]
    fn test_displayed_slots_empty_without_package() {
        let session = BookingSession::new(Uuid::new_v4());
        assert!(session.displayed_slots().is_empty());
    }
}
