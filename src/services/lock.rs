use chrono::{DateTime, Utc};

use crate::models::{format_remaining, ReservationLock, SelectedSlot};
use crate::services::backend::BookingBackend;
use crate::services::countdown::Countdown;

/// A live lock together with the countdown watching it.
pub struct HeldLock {
    lock: ReservationLock,
    _countdown: Countdown,
}

impl HeldLock {
    pub fn new(lock: ReservationLock, countdown: Countdown) -> Self {
        Self {
            lock,
            _countdown: countdown,
        }
    }

    pub fn lock(&self) -> &ReservationLock {
        &self.lock
    }

    pub fn time_left(&self, now: DateTime<Utc>) -> String {
        format_remaining(self.lock.remaining_ms(now))
    }

    /// Stop the countdown and hand back the lock.
    pub fn release(self) -> ReservationLock {
        self.lock
    }
}

impl std::fmt::Debug for HeldLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeldLock").field("lock", &self.lock).finish()
    }
}

/// Ask the API to drop a hold. Failures are logged; the server expires holds on its own.
pub async fn release_best_effort(backend: &dyn BookingBackend, lock: &ReservationLock) -> bool {
    release_slots(backend, &lock.token, &lock.slots).await
}

pub async fn release_slots(backend: &dyn BookingBackend, token: &str, slots: &[SelectedSlot]) -> bool {
    if slots.is_empty() {
        return true;
    }

    match backend.unlock_slots(token, slots).await {
        Ok(()) => {
            tracing::info!(slots = slots.len(), "reservation lock released");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to release reservation lock");
            false
        }
    }
}
