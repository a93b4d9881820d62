//! Reservations gateway (`/api/reservations/`)

use async_trait::async_trait;
use reqwest::Method;

use super::ApiClient;
use crate::{
    error::AppResult,
    models::reservation::{CreateReservation, Reservation, ReservationQuery},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReservationsApi: Send + Sync {
    async fn list(&self, query: &ReservationQuery) -> AppResult<Vec<Reservation>>;
    /// Create a reservation; the backend computes the due date
    async fn create(&self, request: &CreateReservation) -> AppResult<Reservation>;
    /// Push the due date forward according to backend policy
    async fn extend(&self, reservation_id: i32) -> AppResult<Reservation>;
}

#[derive(Clone)]
pub struct HttpReservationsApi {
    client: ApiClient,
}

impl HttpReservationsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReservationsApi for HttpReservationsApi {
    async fn list(&self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        self.client
            .get_json("/api/reservations/", Some(query), "loading reservations")
            .await
    }

    async fn create(&self, request: &CreateReservation) -> AppResult<Reservation> {
        self.client
            .send_json(Method::POST, "/api/reservations/", request, "creating a reservation")
            .await
    }

    async fn extend(&self, reservation_id: i32) -> AppResult<Reservation> {
        self.client
            .send_bare(
                Method::PUT,
                &format!("/api/reservations/{}/extend/", reservation_id),
                "extending a reservation",
            )
            .await
    }
}
