//! Waitlist tracker: per-book queue of interested borrowers

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use validator::{ValidationError, ValidationErrors};

use crate::{
    error::{AppError, AppResult},
    models::waitlist::{QueuedEntry, WaitlistEntry},
};

#[derive(Debug, Default)]
struct BookWaitlist {
    entries: Vec<WaitlistEntry>,
    next_id: u32,
}

/// In-memory waitlists keyed by book id.
///
/// Entries are never promoted to reservations automatically.
#[derive(Debug, Default)]
pub struct WaitlistTracker {
    lists: HashMap<i32, BookWaitlist>,
}

impl WaitlistTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `email` to the book's queue; no dedup, no capacity limit
    pub fn add(&mut self, book_id: i32, email: &str) -> AppResult<WaitlistEntry> {
        let email = email.trim();
        if email.is_empty() {
            let mut errors = ValidationErrors::new();
            let mut err = ValidationError::new("required");
            err.message = Some("Email is required".into());
            errors.add("email", err);
            return Err(AppError::Validation(errors));
        }

        let list = self.lists.entry(book_id).or_default();
        list.next_id += 1;
        let entry = WaitlistEntry {
            id: list.next_id,
            email: email.to_string(),
        };
        list.entries.push(entry.clone());
        tracing::debug!(book_id, "Added {} to the waitlist at position {}", email, list.entries.len());
        Ok(entry)
    }

    /// Remove an entry, keeping the relative order of the others
    pub fn remove(&mut self, book_id: i32, entry_id: u32) -> AppResult<WaitlistEntry> {
        let list = self
            .lists
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound(format!("No waitlist for book {}", book_id)))?;
        let index = list
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| AppError::NotFound(format!("Waitlist entry {} not found", entry_id)))?;
        Ok(list.entries.remove(index))
    }

    /// Entries with their 1-based positions
    pub fn entries(&self, book_id: i32) -> Vec<QueuedEntry> {
        self.lists
            .get(&book_id)
            .map(|list| {
                list.entries
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| QueuedEntry {
                        position: i + 1,
                        entry: entry.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn position(&self, book_id: i32, entry_id: u32) -> Option<usize> {
        self.lists
            .get(&book_id)?
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .map(|i| i + 1)
    }

    pub fn len(&self, book_id: i32) -> usize {
        self.lists.get(&book_id).map(|l| l.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, book_id: i32) -> bool {
        self.len(book_id) == 0
    }
}

/// Waitlists shared by every view of the running client
#[derive(Clone, Default)]
pub struct WaitlistService {
    tracker: Arc<RwLock<WaitlistTracker>>,
}

impl WaitlistService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, book_id: i32, email: &str) -> AppResult<WaitlistEntry> {
        self.tracker.write().await.add(book_id, email)
    }

    pub async fn remove(&self, book_id: i32, entry_id: u32) -> AppResult<WaitlistEntry> {
        self.tracker.write().await.remove(book_id, entry_id)
    }

    pub async fn entries(&self, book_id: i32) -> Vec<QueuedEntry> {
        self.tracker.read().await.entries(book_id)
    }

    pub async fn position(&self, book_id: i32, entry_id: u32) -> Option<usize> {
        self.tracker.read().await.position(book_id, entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_positions_follow_insertion_order() {
        let mut waitlist = WaitlistTracker::new();
        waitlist.add(42, "user1@example.com").unwrap();
        waitlist.add(42, "user2@example.com").unwrap();
        waitlist.add(42, "user1@example.com").unwrap();
        waitlist.add(7, "other@example.com").unwrap();

        let entries = waitlist.entries(42);
        let positions: Vec<(usize, &str)> = entries
            .iter()
            .map(|q| (q.position, q.entry.email.as_str()))
            .collect();
        assert_eq!(
            positions,
            vec![
                (1, "user1@example.com"),
                (2, "user2@example.com"),
                (3, "user1@example.com"),
            ]
        );
        assert_eq!(waitlist.len(7), 1);
    }

    #[test]
    fn test_empty_email_is_rejected() {
        let mut waitlist = WaitlistTracker::new();
        let err = waitlist.add(42, "   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(waitlist.is_empty(42));
    }

    #[test]
    fn test_remove_preserves_order_and_ids_are_not_reused() {
        let mut waitlist = WaitlistTracker::new();
        let a = waitlist.add(42, "a@x.com").unwrap();
        let b = waitlist.add(42, "b@x.com").unwrap();
        let c = waitlist.add(42, "c@x.com").unwrap();

        assert_eq!(waitlist.remove(42, b.id).unwrap().email, "b@x.com");
        assert_eq!(waitlist.position(42, a.id), Some(1));
        assert_eq!(waitlist.position(42, c.id), Some(2));
        assert_eq!(waitlist.position(42, b.id), None);

        let d = waitlist.add(42, "d@x.com").unwrap();
        assert!(d.id > c.id);
        assert_eq!(waitlist.position(42, d.id), Some(3));

        let err = waitlist.remove(42, b.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(waitlist.remove(9, 1).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_service_clones_share_one_waitlist() {
        let waitlist = WaitlistService::new();
        let other_view = waitlist.clone();

        let first = waitlist.add(42, "a@x.com").await.unwrap();
        let second = other_view.add(42, "b@x.com").await.unwrap();

        assert_eq!(waitlist.position(42, second.id).await, Some(2));
        other_view.remove(42, first.id).await.unwrap();

        let entries = waitlist.entries(42).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].position, 1);
        assert_eq!(entries[0].entry.email, "b@x.com");
    }
}
