use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};

use super::{ApiError, BookingBackend, SlotQuery};
use crate::models::{
    BookingConfirmation, BookingFilter, BookingRecord, CreateBookingRequest, DateAvailability,
    Holiday, LockGrant, LoginResponse, NewHoliday, Package, Page, SelectedSlot, Suburb,
    TestingCenter, TimeSlot,
};

pub struct HttpBackend {
    base_url: String,
    client: Client,
    token: RwLock<Option<String>>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        let token = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.post(self.url(path)))
    }
}

/// Turns a non-2xx response into `ApiError::Status`, pulling the server's `message`.
async fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
    let message = match &body["message"] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    };

    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn read<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let resp = check(resp).await?;
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl BookingBackend for HttpBackend {
    fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    #[instrument(skip(self), fields(date = %query.date), level = "debug")]
    async fn fetch_slots(&self, query: &SlotQuery) -> Result<Vec<TimeSlot>, ApiError> {
        let resp = self
            .get("/slots/availability")
            .query(&[
                ("date", query.date.to_string()),
                ("duration", query.duration.to_string()),
                ("margin", query.margin.to_string()),
                ("step", query.step.to_string()),
            ])
            .send()
            .await?;

        let slots: Vec<TimeSlot> = read(resp).await?;
        debug!(count = slots.len(), "availability fetched");
        Ok(slots)
    }

    async fn available_dates(&self, start_date: NaiveDate) -> Result<Vec<DateAvailability>, ApiError> {
        let resp = self
            .get("/bookings/dates")
            .query(&[("startDate", start_date.to_string())])
            .send()
            .await?;
        read(resp).await
    }

    #[instrument(skip_all, fields(slots = slots.len()), level = "debug")]
    async fn lock_slots(&self, slots: &[SelectedSlot]) -> Result<LockGrant, ApiError> {
        let resp = self
            .post("/bookings/lock")
            .json(&json!({ "slots": slots }))
            .send()
            .await?;
        read(resp).await
    }

    async fn unlock_slots(&self, token: &str, slots: &[SelectedSlot]) -> Result<(), ApiError> {
        let resp = self
            .post("/bookings/unlock")
            .json(&json!({ "token": token, "slots": slots }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn create_booking(&self, request: &CreateBookingRequest) -> Result<BookingConfirmation, ApiError> {
        let resp = self.post("/bookings/create").json(request).send().await?;
        read(resp).await
    }

    async fn packages(&self) -> Result<Vec<Package>, ApiError> {
        read(self.get("/packages").send().await?).await
    }

    async fn suburbs(&self) -> Result<Vec<Suburb>, ApiError> {
        read(self.get("/suburbs").send().await?).await
    }

    async fn testing_centers(&self) -> Result<Vec<TestingCenter>, ApiError> {
        read(self.get("/testing-centers").send().await?).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let login: LoginResponse = read(resp).await?;
        Ok(login.access_token)
    }

    async fn bookings(&self, filter: &BookingFilter) -> Result<Page<BookingRecord>, ApiError> {
        let resp = self.get("/bookings").query(filter).send().await?;
        read(resp).await
    }

    async fn my_bookings(&self, page: u32, limit: u32) -> Result<Page<BookingRecord>, ApiError> {
        let resp = self
            .get("/bookings/me")
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await?;
        read(resp).await
    }

    async fn confirm_booking(&self, id: &str) -> Result<(), ApiError> {
        check(self.post(&format!("/bookings/{id}/confirm")).send().await?).await?;
        Ok(())
    }

    async fn cancel_booking(&self, id: &str) -> Result<(), ApiError> {
        check(self.post(&format!("/bookings/{id}/cancel")).send().await?).await?;
        Ok(())
    }

    async fn holidays(&self) -> Result<Vec<Holiday>, ApiError> {
        read(self.get("/holidays").send().await?).await
    }

    async fn create_holiday(&self, holiday: &NewHoliday) -> Result<Holiday, ApiError> {
        read(self.post("/holidays").json(holiday).send().await?).await
    }

    async fn delete_holiday(&self, id: &str) -> Result<(), ApiError> {
        let req = self.authorized(self.client.delete(self.url(&format!("/holidays/{id}"))));
        check(req.send().await?).await?;
        Ok(())
    }
}
