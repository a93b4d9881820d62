//! Reservation lifecycle service
//!
//! [`BookReservations`] owns the client-side view of one book's copies and
//! reservations. A copy is either available or reserved by exactly one active
//! reservation; local state only changes after the backend acknowledges a
//! request, and a request either updates both the copy flag and the
//! reservation record or neither.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookCopy},
        reservation::{CreateReservation, Reservation, ReservationQuery, ReservationStatus, ReserveForm},
        user::{Capability, Session},
        Page,
    },
    repository::{BooksApi, ReservationsApi},
};

/// Source of "today" for date validation and overdue status
pub type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub fn local_today() -> Today {
    Arc::new(|| chrono::Local::now().date_naive())
}

/// A copy whose availability flag disagrees with the active reservations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyViolation {
    pub copy_id: i32,
    pub is_available: bool,
    pub active_reservations: usize,
}

struct DeskState {
    book: Book,
    /// Active reservations plus the ones returned during this session
    reservations: Vec<Reservation>,
    /// Bumped by every applied change; a reload fetched across a bump is stale
    generation: u64,
    closed: bool,
}

impl DeskState {
    fn ensure_open(&self) -> AppResult<()> {
        if self.closed {
            Err(AppError::Disposed(format!(
                "Reservation view for book {} is closed",
                self.book.book_id
            )))
        } else {
            Ok(())
        }
    }

    fn active_for_copy(&self, copy_id: i32) -> Option<&Reservation> {
        self.reservations
            .iter()
            .find(|r| r.copy == copy_id && r.is_active())
    }

    fn copy(&self, copy_id: i32) -> AppResult<&BookCopy> {
        self.book.copy(copy_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "Copy {} of book {} not found",
                copy_id, self.book.book_id
            ))
        })
    }

    fn violations(&self) -> Vec<ConsistencyViolation> {
        self.book
            .copies
            .iter()
            .filter_map(|copy| {
                let active = self
                    .reservations
                    .iter()
                    .filter(|r| r.copy == copy.copy_id && r.is_active())
                    .count();
                let consistent = (copy.is_available && active == 0) || (!copy.is_available && active == 1);
                (!consistent).then_some(ConsistencyViolation {
                    copy_id: copy.copy_id,
                    is_available: copy.is_available,
                    active_reservations: active,
                })
            })
            .collect()
    }
}

/// Reloads attempted before giving up on a book that keeps changing
const REFRESH_ATTEMPTS: usize = 3;

/// Reservation lifecycle manager for one book
#[derive(Clone)]
pub struct BookReservations {
    book_id: i32,
    books: Arc<dyn BooksApi>,
    reservations: Arc<dyn ReservationsApi>,
    today: Today,
    state: Arc<Mutex<DeskState>>,
}

impl BookReservations {
    /// Load the book, its copies and its active reservations
    pub async fn open(
        books: Arc<dyn BooksApi>,
        reservations: Arc<dyn ReservationsApi>,
        today: Today,
        book_id: i32,
    ) -> AppResult<Self> {
        let (book, active) = Self::fetch(books.as_ref(), reservations.as_ref(), book_id).await?;

        let state = DeskState {
            book,
            reservations: active,
            generation: 0,
            closed: false,
        };
        log_violations(&state);

        Ok(Self {
            book_id,
            books,
            reservations,
            today,
            state: Arc::new(Mutex::new(state)),
        })
    }

    async fn fetch(
        books: &dyn BooksApi,
        reservations: &dyn ReservationsApi,
        book_id: i32,
    ) -> AppResult<(Book, Vec<Reservation>)> {
        let query = ReservationQuery::active_for_book(book_id);
        let (mut book, listed) = tokio::try_join!(books.get(book_id), reservations.list(&query))?;
        book.refresh_availability();

        // Filters are advisory on some backends; keep only what belongs here
        let active = listed
            .into_iter()
            .filter(|r| r.book == book_id && r.is_active())
            .collect();
        Ok((book, active))
    }

    pub fn book_id(&self) -> i32 {
        self.book_id
    }

    /// Reload from the backend.
    ///
    /// The previous snapshot is kept when either request fails. Reservations
    /// returned during this session stay in the history. A snapshot fetched
    /// while a local change was applied is discarded and fetched again.
    pub async fn refresh(&self) -> AppResult<()> {
        for _ in 0..REFRESH_ATTEMPTS {
            let generation = {
                let state = self.state.lock().await;
                state.ensure_open()?;
                state.generation
            };

            let (book, active) = match Self::fetch(self.books.as_ref(), self.reservations.as_ref(), self.book_id).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    tracing::warn!("Failed to reload book {}: {}", self.book_id, e);
                    return Err(e);
                }
            };

            let mut state = self.state.lock().await;
            state.ensure_open()?;
            if state.generation != generation {
                tracing::debug!(book_id = self.book_id, "Discarding snapshot fetched across a local change");
                continue;
            }

            let mut history: Vec<Reservation> = state
                .reservations
                .drain(..)
                .filter(|r| r.returned && !active.iter().any(|a| a.reservation_id == r.reservation_id))
                .collect();
            history.extend(active);

            state.book = book;
            state.reservations = history;
            state.generation += 1;
            log_violations(&state);
            return Ok(());
        }

        Err(AppError::Conflict(format!(
            "Book {} kept changing while reloading; try again",
            self.book_id
        )))
    }

    /// Snapshot of the book and its copies
    pub async fn book(&self) -> Book {
        self.state.lock().await.book.clone()
    }

    /// Active reservations, ordered by due date then id
    pub async fn list_active_reservations(&self, book_id: i32) -> Vec<Reservation> {
        if book_id != self.book_id {
            return Vec::new();
        }
        let state = self.state.lock().await;
        let mut active: Vec<Reservation> = state
            .reservations
            .iter()
            .filter(|r| r.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|r| (r.due_date, r.reservation_id));
        active
    }

    /// Every reservation known to this view, returned ones included
    pub async fn history(&self) -> Vec<Reservation> {
        self.state.lock().await.reservations.clone()
    }

    pub async fn consistency_violations(&self) -> Vec<ConsistencyViolation> {
        self.state.lock().await.violations()
    }

    /// Reserve an available copy for `email` starting on `start_date`
    pub async fn reserve(
        &self,
        session: &Session,
        book_id: i32,
        copy_id: i32,
        email: &str,
        start_date: NaiveDate,
    ) -> AppResult<Reservation> {
        self.ensure_book(book_id)?;

        let form = ReserveForm::new(email, start_date);
        form.check((self.today)())?;
        session.require_reserve_for(&form.email)?;

        {
            let state = self.state.lock().await;
            state.ensure_open()?;
            let copy = state.copy(copy_id)?;
            if !copy.is_available || state.active_for_copy(copy_id).is_some() {
                return Err(AppError::Conflict(format!("Copy {} is already reserved", copy_id)));
            }
        }

        let request = CreateReservation {
            email: form.email.clone(),
            book_id,
            copy_id,
            start_date,
        };
        tracing::info!(book_id, copy_id, "Reserving copy for {} from {}", form.email, start_date);

        let mut reservation = self.reservations.create(&request).await.map_err(|e| {
            tracing::warn!(book_id, copy_id, "Reservation rejected: {}", e);
            e
        })?;

        if reservation.copy != copy_id || reservation.book != book_id {
            return Err(AppError::Internal(format!(
                "Backend returned reservation {} for book {} copy {}, expected book {} copy {}",
                reservation.reservation_id, reservation.book, reservation.copy, book_id, copy_id
            )));
        }

        let mut state = self.state.lock().await;
        if state.closed {
            tracing::debug!(book_id, copy_id, "Discarding reservation response for closed view");
        }
        state.ensure_open()?;

        let active = state.active_for_copy(copy_id).cloned();
        let copy_free = state.copy(copy_id).map(|c| c.is_available).unwrap_or(false);
        match active {
            // A reload already picked up this very reservation
            Some(active) if active.reservation_id == reservation.reservation_id => {
                tracing::debug!(book_id, copy_id, "Reservation {} already applied by a reload", active.reservation_id);
                if let Some(copy) = state.book.copy_mut(copy_id) {
                    copy.is_available = false;
                }
                state.book.refresh_availability();
                state.generation += 1;
                return Ok(active);
            }
            None if copy_free => {}
            _ => {
                tracing::warn!(book_id, copy_id, "Copy changed while the reservation was in flight");
                return Err(AppError::Conflict(format!(
                    "Copy {} changed while the reservation was in flight; reload the book",
                    copy_id
                )));
            }
        }

        if reservation.user_email.is_empty() {
            reservation.user_email = form.email;
        }
        if reservation.book_title.is_empty() {
            reservation.book_title = state.book.title.clone();
        }
        reservation.returned = false;

        if let Some(copy) = state.book.copy_mut(copy_id) {
            copy.is_available = false;
        }
        state.reservations.push(reservation.clone());
        state.book.refresh_availability();
        state.generation += 1;

        Ok(reservation)
    }

    /// Ask the backend for a later due date; only `due_date` changes locally
    pub async fn extend_due_date(&self, session: &Session, reservation_id: i32) -> AppResult<NaiveDate> {
        let borrower = {
            let state = self.state.lock().await;
            state.ensure_open()?;
            let reservation = find_reservation(&state, reservation_id)?;
            if reservation.returned {
                return Err(AppError::Conflict(format!(
                    "Reservation {} has already been returned",
                    reservation_id
                )));
            }
            reservation.user_email.clone()
        };
        session.require_extend_for(&borrower)?;

        let updated = self.reservations.extend(reservation_id).await.map_err(|e| {
            tracing::warn!(reservation_id, "Extension rejected: {}", e);
            e
        })?;
        if updated.reservation_id != reservation_id {
            return Err(AppError::Internal(format!(
                "Backend extended reservation {} instead of {}",
                updated.reservation_id, reservation_id
            )));
        }

        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let reservation = state
            .reservations
            .iter_mut()
            .find(|r| r.reservation_id == reservation_id)
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", reservation_id)))?;
        if reservation.returned {
            return Err(AppError::Conflict(format!(
                "Reservation {} was returned while the extension was in flight",
                reservation_id
            )));
        }

        reservation.due_date = updated.due_date;
        state.generation += 1;
        tracing::info!(reservation_id, "Due date extended to {}", updated.due_date);
        Ok(updated.due_date)
    }

    /// Mark a reserved copy as returned and available again
    pub async fn mark_returned(&self, session: &Session, book_id: i32, copy_id: i32) -> AppResult<BookCopy> {
        session.require(Capability::MarkReturned)?;
        self.ensure_book(book_id)?;

        let reservation_id = {
            let state = self.state.lock().await;
            state.ensure_open()?;
            state.copy(copy_id)?;
            state
                .active_for_copy(copy_id)
                .map(|r| r.reservation_id)
                .ok_or_else(|| AppError::NotFound(format!("Copy {} has no active reservation", copy_id)))?
        };

        let copy = self
            .books
            .set_copy_available(book_id, copy_id, true)
            .await
            .map_err(|e| {
                tracing::warn!(book_id, copy_id, "Return rejected: {}", e);
                e
            })?;
        if copy.copy_id != copy_id || !copy.is_available {
            return Err(AppError::Internal(format!(
                "Backend did not confirm copy {} as available",
                copy_id
            )));
        }

        let mut state = self.state.lock().await;
        state.ensure_open()?;

        match state
            .reservations
            .iter_mut()
            .find(|r| r.reservation_id == reservation_id)
        {
            Some(reservation) => reservation.returned = true,
            None => {
                // A reload already dropped it from the active set
                tracing::debug!(book_id, copy_id, reservation_id, "Return already applied by a reload");
                return Ok(copy);
            }
        }

        if let Some(local) = state.book.copy_mut(copy_id) {
            local.is_available = true;
        }
        state.book.refresh_availability();
        state.generation += 1;
        tracing::info!(book_id, copy_id, reservation_id, "Copy returned");

        Ok(copy)
    }

    /// Dispose the view; responses still in flight are discarded
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    fn ensure_book(&self, book_id: i32) -> AppResult<()> {
        if book_id == self.book_id {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Book {} is not loaded in this view (book {} is)",
                book_id, self.book_id
            )))
        }
    }
}

fn find_reservation(state: &DeskState, reservation_id: i32) -> AppResult<&Reservation> {
    state
        .reservations
        .iter()
        .find(|r| r.reservation_id == reservation_id)
        .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", reservation_id)))
}

fn log_violations(state: &DeskState) {
    for v in state.violations() {
        tracing::warn!(
            book_id = state.book.book_id,
            copy_id = v.copy_id,
            "Copy availability ({}) disagrees with {} active reservation(s)",
            v.is_available,
            v.active_reservations
        );
    }
}

/// Reservation with its display status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationRow {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub status: ReservationStatus,
}

#[derive(Clone)]
pub struct ReservationsService {
    books: Arc<dyn BooksApi>,
    reservations: Arc<dyn ReservationsApi>,
    today: Today,
    page_size: usize,
}

impl ReservationsService {
    pub fn new(
        books: Arc<dyn BooksApi>,
        reservations: Arc<dyn ReservationsApi>,
        today: Today,
        page_size: usize,
    ) -> Self {
        Self {
            books,
            reservations,
            today,
            page_size,
        }
    }

    /// Open the lifecycle manager for one book
    pub async fn open_book(&self, book_id: i32) -> AppResult<BookReservations> {
        BookReservations::open(
            self.books.clone(),
            self.reservations.clone(),
            self.today.clone(),
            book_id,
        )
        .await
    }

    /// List reservations; members only see their own
    pub async fn list_reservations(&self, session: &Session, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        let reservations = self.reservations.list(query).await?;
        if session.role.allows(Capability::ViewAllReservations) {
            Ok(reservations)
        } else {
            Ok(reservations
                .into_iter()
                .filter(|r| session.is_self(&r.user_email))
                .collect())
        }
    }

    /// One page of the reservations overview with computed statuses
    pub async fn overview(
        &self,
        session: &Session,
        query: &ReservationQuery,
        page: usize,
    ) -> AppResult<Page<ReservationRow>> {
        let today = (self.today)();
        let rows: Vec<ReservationRow> = self
            .list_reservations(session, query)
            .await?
            .into_iter()
            .map(|reservation| ReservationRow {
                status: reservation.status(today),
                reservation,
            })
            .collect();
        Ok(Page::slice(&rows, page, self.page_size))
    }
}
