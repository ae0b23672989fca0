use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::models::format_remaining;

pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CountdownEvent {
    Tick {
        session_id: Uuid,
        remaining_ms: i64,
        display: String,
    },
    Expired {
        session_id: Uuid,
    },
}

impl CountdownEvent {
    pub fn session_id(&self) -> Uuid {
        match self {
            CountdownEvent::Tick { session_id, .. } | CountdownEvent::Expired { session_id } => {
                *session_id
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CountdownEvent::Tick { .. } => "tick",
            CountdownEvent::Expired { .. } => "expired",
        }
    }
}

/// One-second ticker bound to a reservation lock.
///
/// Owned by the lock it watches: dropping it stops the ticks, so no path that
/// releases the lock can leave a timer behind. When the deadline passes the
/// ticker publishes `Expired`, hands `on_expire` to its own task and stops.
pub struct Countdown {
    handle: JoinHandle<()>,
}

impl Countdown {
    pub fn start<F>(
        session_id: Uuid,
        expires_at: DateTime<Utc>,
        events: broadcast::Sender<CountdownEvent>,
        on_expire: F,
    ) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let remaining = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let deadline = Instant::now() + remaining;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    tracing::info!(%session_id, "reservation lock countdown reached zero");
                    // No receivers is fine: the reset still happens.
                    let _ = events.send(CountdownEvent::Expired { session_id });
                    tokio::spawn(on_expire);
                    break;
                }

                let remaining_ms = i64::try_from(left.as_millis()).unwrap_or(i64::MAX);
                let _ = events.send(CountdownEvent::Tick {
                    session_id,
                    remaining_ms,
                    display: format_remaining(remaining_ms),
                });
            }
        });

        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
