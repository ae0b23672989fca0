use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{DateAvailability, Package, Suburb, TestingCenter};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    pub suburbs: Vec<Suburb>,
    pub testing_centers: Vec<TestingCenter>,
}

// GET /api/reference
pub async fn reference(State(state): State<Arc<AppState>>) -> Result<Json<ReferenceData>, AppError> {
    let (suburbs, testing_centers) =
        tokio::try_join!(state.backend.suburbs(), state.backend.testing_centers())?;
    Ok(Json(ReferenceData {
        suburbs,
        testing_centers,
    }))
}

// GET /api/packages
pub async fn packages(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Package>>, AppError> {
    Ok(Json(state.backend.packages().await?))
}

#[derive(Serialize)]
pub struct DateView {
    #[serde(flatten)]
    pub availability: DateAvailability,
    pub label: String,
}

// GET /api/dates
pub async fn dates(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DateView>>, AppError> {
    let today: NaiveDate = match state.config.business_offset() {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Local::now().date_naive(),
    };
    let start = today.succ_opt().unwrap_or(today);

    let dates = state
        .backend
        .available_dates(start)
        .await?
        .into_iter()
        .map(|availability| DateView {
            label: availability.label(),
            availability,
        })
        .collect();
    Ok(Json(dates))
}
