use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{BookingFilter, BookingRecord, Holiday, NewHoliday, Page, Role};
use crate::services::auth::{authorize, current_user};
use crate::state::AppState;

pub const PAGE_SIZE: u32 = 10;

const STAFF: &[Role] = &[Role::Admin, Role::Instructor];
const ADMIN: &[Role] = &[Role::Admin];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPage {
    pub data: Vec<BookingRecord>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u64,
}

impl BookingPage {
    fn new(page: Page<BookingRecord>, number: u32) -> Self {
        let total_pages = page.total_pages(PAGE_SIZE);
        Self {
            data: page.data,
            total: page.total,
            page: number,
            total_pages,
        }
    }
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

// GET /api/my-bookings
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<BookingPage>, AppError> {
    authorize(current_user(&state), &[Role::Student])?;
    let page = query.page.unwrap_or(1).max(1);
    let bookings = state.backend.my_bookings(page, PAGE_SIZE).await?;
    Ok(Json(BookingPage::new(bookings, page)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingQuery {
    pub date: Option<String>,
    pub suburb_id: Option<String>,
    pub center_id: Option<String>,
    pub page: Option<u32>,
}

// GET /api/portal/bookings
pub async fn bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookingQuery>,
) -> Result<Json<BookingPage>, AppError> {
    authorize(current_user(&state), STAFF)?;
    let page = query.page.unwrap_or(1).max(1);
    let filter = BookingFilter {
        date: query.date.filter(|d| !d.is_empty()),
        suburb_id: query.suburb_id.filter(|s| !s.is_empty()),
        center_id: query.center_id.filter(|c| !c.is_empty()),
        page,
        limit: PAGE_SIZE,
    };
    let bookings = state.backend.bookings(&filter).await?;
    Ok(Json(BookingPage::new(bookings, page)))
}

// POST /api/portal/bookings/:id/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user = authorize(current_user(&state), ADMIN)?;
    state.backend.confirm_booking(&id).await?;
    tracing::info!(booking_id = %id, user_id = %user.user_id, "booking confirmed");
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/portal/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user = authorize(current_user(&state), ADMIN)?;
    state.backend.cancel_booking(&id).await?;
    tracing::info!(booking_id = %id, user_id = %user.user_id, "booking cancelled");
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/portal/holidays
pub async fn holidays(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Holiday>>, AppError> {
    authorize(current_user(&state), ADMIN)?;
    Ok(Json(state.backend.holidays().await?))
}

// POST /api/portal/holidays
pub async fn create_holiday(
    State(state): State<Arc<AppState>>,
    Json(holiday): Json<NewHoliday>,
) -> Result<(StatusCode, Json<Holiday>), AppError> {
    authorize(current_user(&state), ADMIN)?;
    if holiday.reason.trim().is_empty() {
        return Err(AppError::Validation("a reason is required".into()));
    }
    let created = state.backend.create_holiday(&holiday).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// DELETE /api/portal/holidays/:id
pub async fn delete_holiday(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    authorize(current_user(&state), ADMIN)?;
    state.backend.delete_holiday(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
