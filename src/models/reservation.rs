//! Reservation model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

/// A borrower's claim on one copy, as returned by `/api/reservations/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: i32,
    /// Borrower user id
    #[serde(default)]
    pub user: Option<i32>,
    pub book: i32,
    pub copy: i32,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub book_title: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub returned: bool,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        !self.returned
    }

    pub fn status(&self, today: NaiveDate) -> ReservationStatus {
        if self.returned {
            ReservationStatus::Returned
        } else if today > self.due_date {
            ReservationStatus::Overdue
        } else {
            ReservationStatus::OnLoan
        }
    }
}

/// Display status of a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    OnLoan,
    Overdue,
    Returned,
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReservationStatus::OnLoan => "On loan",
            ReservationStatus::Overdue => "Overdue",
            ReservationStatus::Returned => "Returned",
        };
        write!(f, "{}", label)
    }
}

/// Reserve form as filled in by the borrower or a librarian
#[derive(Debug, Clone, Validate)]
pub struct ReserveForm {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Invalid email format")
    )]
    pub email: String,
    pub start_date: NaiveDate,
}

impl ReserveForm {
    pub fn new(email: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            email: email.into().trim().to_string(),
            start_date,
        }
    }

    /// Validate fields, including that the start date is not before `today`
    pub fn check(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(e) => e,
        };

        if self.start_date < today {
            let mut err = ValidationError::new("past_date");
            err.message = Some("Reservation date cannot be in the past".into());
            errors.add("start_date", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Body of `POST /api/reservations/`
#[derive(Debug, Clone, Serialize)]
pub struct CreateReservation {
    pub email: String,
    pub book_id: i32,
    pub copy_id: i32,
    pub start_date: NaiveDate,
}

/// Filters for `GET /api/reservations/`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReservationQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned: Option<bool>,
}

impl ReservationQuery {
    pub fn active_for_book(book_id: i32) -> Self {
        Self {
            book_id: Some(book_id),
            returned: Some(false),
        }
    }
}
