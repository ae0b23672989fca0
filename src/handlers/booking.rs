use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    BookingConfirmation, BookingStep, CustomerDetails, Package, PackageRules, Suburb,
    TestingCenter, TimeSlot,
};
use crate::services::catalog::CatalogState;
use crate::services::countdown::CountdownEvent;
use crate::services::flow::{self, BookingSession};
use crate::services::projector;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    #[serde(flatten)]
    pub slot: TimeSlot,
    pub selected: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockView {
    pub expires_at: DateTime<Utc>,
    pub time_left: String,
    pub slots: usize,
}

/// Everything a client needs to render the current step.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub step: BookingStep,
    pub step_number: u8,
    pub testing_center: Option<TestingCenter>,
    pub suburb: Option<Suburb>,
    pub package: Option<Package>,
    pub rules: Option<PackageRules>,
    pub date: Option<NaiveDate>,
    pub catalog: CatalogState,
    pub slots: Vec<SlotView>,
    pub selection: Vec<TimeSlot>,
    pub total_price: f64,
    pub lock: Option<LockView>,
    pub confirmation: Option<BookingConfirmation>,
    pub notice: Option<String>,
}

impl SessionView {
    fn from_session(session: &BookingSession, now: DateTime<Utc>) -> Self {
        let slots = session
            .displayed_slots()
            .into_iter()
            .map(|slot| SlotView {
                selected: projector::is_selected(&session.selection, &slot),
                slot,
            })
            .collect();

        let lock = session.lock().map(|lock| LockView {
            expires_at: lock.expires_at,
            time_left: session.time_left(now).unwrap_or_default(),
            slots: lock.slots.len(),
        });

        Self {
            id: session.id,
            step: session.step,
            step_number: session.step.number(),
            testing_center: session.testing_center.clone(),
            suburb: session.suburb.clone(),
            package: session.package.clone(),
            rules: session.rules(),
            date: session.date,
            catalog: session.catalog.state(),
            slots,
            selection: session.selection_details.clone(),
            total_price: session.total_price(),
            lock,
            confirmation: session.confirmation.clone(),
            notice: session.notice.clone(),
        }
    }
}

fn view(state: &AppState, id: Uuid) -> Result<Json<SessionView>, AppError> {
    let now = Utc::now();
    flow::inspect(state, id, |s| Json(SessionView::from_session(s, now)))
}

// POST /api/booking/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let id = flow::create_session(&state);
    Ok((StatusCode::CREATED, view(&state, id)?))
}

// GET /api/booking/sessions/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    view(&state, id)
}

// DELETE /api/booking/sessions/:id
pub async fn abandon_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    flow::abandon_session(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRequest {
    pub testing_center_id: Option<String>,
    pub suburb_id: Option<String>,
}

// POST /api/booking/sessions/:id/location
pub async fn select_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<LocationRequest>,
) -> Result<Json<SessionView>, AppError> {
    flow::select_location(&state, id, req.testing_center_id, req.suburb_id).await?;
    view(&state, id)
}

// POST /api/booking/sessions/:id/location/next
pub async fn location_next(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    flow::advance_from_location(&state, id)?;
    view(&state, id)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRequest {
    pub package_id: String,
}

// POST /api/booking/sessions/:id/package
pub async fn select_package(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PackageRequest>,
) -> Result<Json<SessionView>, AppError> {
    flow::select_package(&state, id, &req.package_id).await?;
    view(&state, id)
}

// POST /api/booking/sessions/:id/package/next
pub async fn package_next(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    flow::advance_from_package(&state, id).await?;
    view(&state, id)
}

// POST /api/booking/sessions/:id/back
pub async fn go_back(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    flow::go_back(&state, id)?;
    view(&state, id)
}

#[derive(Deserialize)]
pub struct DateRequest {
    pub date: NaiveDate,
}

// POST /api/booking/sessions/:id/date
pub async fn select_date(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<DateRequest>,
) -> Result<Json<SessionView>, AppError> {
    flow::select_date(&state, id, req.date).await?;
    view(&state, id)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub start_time: DateTime<FixedOffset>,
}

// POST /api/booking/sessions/:id/slots/toggle
pub async fn toggle_slot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<SessionView>, AppError> {
    flow::toggle_slot(&state, id, req.start_time)?;
    view(&state, id)
}

// POST /api/booking/sessions/:id/lock
pub async fn acquire_lock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    flow::acquire_lock(&state, id).await?;
    view(&state, id)
}

// POST /api/booking/sessions/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    flow::cancel_details(&state, id).await?;
    view(&state, id)
}

// POST /api/booking/sessions/:id/submit
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(details): Json<CustomerDetails>,
) -> Result<Json<SessionView>, AppError> {
    flow::submit(&state, id, details).await?;
    view(&state, id)
}

// GET /api/booking/sessions/:id/countdown
pub async fn countdown_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let now = Utc::now();
    // Current time left, so the client does not wait a full tick.
    let current = flow::inspect(&state, id, |s| {
        s.lock().map(|lock| CountdownEvent::Tick {
            session_id: id,
            remaining_ms: lock.remaining_ms(now).max(0),
            display: s.time_left(now).unwrap_or_default(),
        })
    })?;

    let rx = state.countdown_tx.subscribe();

    let current_stream =
        tokio_stream::iter(current.map(|event| Ok::<_, Infallible>(to_sse(&event))));

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.session_id() == id => Some(Ok(to_sse(&event))),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    let combined = current_stream.chain(live_stream);
    Ok(Sse::new(StreamExt::merge(combined, keepalive_stream)))
}

fn to_sse(event: &CountdownEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(event.name()).data(data)
}
