//! Data models for the Bookworm client

pub mod book;
pub mod reservation;
pub mod user;
pub mod waitlist;

use serde::Serialize;

// Re-export commonly used types
pub use book::{Book, BookCopy, BookInput};
pub use reservation::{Reservation, ReservationQuery, ReservationStatus, ReserveForm};
pub use user::{AuthTokens, Capability, Role, Session, User};
pub use waitlist::{QueuedEntry, WaitlistEntry};

/// One page of an in-memory listing (1-indexed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl<T: Clone> Page<T> {
    /// Slice `items` into the requested page.
    ///
    /// Page 0 and pages past the end are empty rather than errors.
    pub fn slice(items: &[T], page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total = items.len();
        let total_pages = total.div_ceil(per_page);

        let slice = if page == 0 {
            &[][..]
        } else {
            let start = (page - 1).saturating_mul(per_page);
            let end = start.saturating_add(per_page).min(total);
            items.get(start..end).unwrap_or(&[])
        };

        Self {
            items: slice.to_vec(),
            page,
            per_page,
            total,
            total_pages,
        }
    }
}
