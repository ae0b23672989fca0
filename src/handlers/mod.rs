pub mod auth;
pub mod booking;
pub mod health;
pub mod portal;
pub mod reference;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/reference", get(reference::reference))
        .route("/api/packages", get(reference::packages))
        .route("/api/dates", get(reference::dates))
        .route("/api/booking/sessions", post(booking::create_session))
        .route(
            "/api/booking/sessions/:id",
            get(booking::get_session).delete(booking::abandon_session),
        )
        .route(
            "/api/booking/sessions/:id/location",
            post(booking::select_location),
        )
        .route(
            "/api/booking/sessions/:id/location/next",
            post(booking::location_next),
        )
        .route(
            "/api/booking/sessions/:id/package",
            post(booking::select_package),
        )
        .route(
            "/api/booking/sessions/:id/package/next",
            post(booking::package_next),
        )
        .route("/api/booking/sessions/:id/back", post(booking::go_back))
        .route("/api/booking/sessions/:id/date", post(booking::select_date))
        .route(
            "/api/booking/sessions/:id/slots/toggle",
            post(booking::toggle_slot),
        )
        .route("/api/booking/sessions/:id/lock", post(booking::acquire_lock))
        .route("/api/booking/sessions/:id/cancel", post(booking::cancel))
        .route("/api/booking/sessions/:id/submit", post(booking::submit))
        .route(
            "/api/booking/sessions/:id/countdown",
            get(booking::countdown_stream),
        )
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/my-bookings", get(portal::my_bookings))
        .route("/api/portal/bookings", get(portal::bookings))
        .route(
            "/api/portal/bookings/:id/confirm",
            post(portal::confirm_booking),
        )
        .route(
            "/api/portal/bookings/:id/cancel",
            post(portal::cancel_booking),
        )
        .route(
            "/api/portal/holidays",
            get(portal::holidays).post(portal::create_holiday),
        )
        .route("/api/portal/holidays/:id", delete(portal::delete_holiday))
        .with_state(state)
}
