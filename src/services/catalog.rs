//! Catalogue service: browsing, searching and managing books

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use validator::Validate;

use crate::{
    config::CatalogConfig,
    error::AppResult,
    models::{
        book::{Book, BookInput},
        user::{Capability, Session},
        Page,
    },
    repository::BooksApi,
};

/// Sort key for catalogue listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Title,
    Author,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title" => Ok(SortKey::Title),
            "author" => Ok(SortKey::Author),
            _ => Err(format!("Invalid sort key: {} (expected title or author)", s)),
        }
    }
}

/// Catalogue filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Empty set matches every genre
    pub genres: BTreeSet<String>,
    pub available_only: bool,
    pub search_text: String,
    pub sort: SortKey,
    /// 1-indexed
    pub page: usize,
}

impl CatalogQuery {
    fn matches(&self, book: &Book, needle: &str) -> bool {
        (self.genres.is_empty() || self.genres.contains(&book.genre_name))
            && (!self.available_only || book.is_available)
            && (book.title.to_lowercase().contains(needle)
                || book.author_name.to_lowercase().contains(needle))
    }
}

/// Filter, sort and paginate an in-memory book list.
///
/// Filtering is conjunctive; sorting is case-insensitive and stable, so ties
/// keep their input order. Pages past the end are empty.
pub fn query(books: &[Book], query: &CatalogQuery, page_size: usize) -> Page<Book> {
    let needle = query.search_text.to_lowercase();

    let mut matched: Vec<&Book> = books.iter().filter(|b| query.matches(b, &needle)).collect();
    match query.sort {
        SortKey::Title => matched.sort_by_cached_key(|b| b.title.to_lowercase()),
        SortKey::Author => matched.sort_by_cached_key(|b| b.author_name.to_lowercase()),
    }

    let matched: Vec<Book> = matched.into_iter().cloned().collect();
    Page::slice(&matched, query.page, page_size)
}

/// Distinct genres in first-seen order
pub fn genres(books: &[Book]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    books
        .iter()
        .filter(|b| seen.insert(b.genre_name.as_str()))
        .map(|b| b.genre_name.clone())
        .collect()
}

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BooksApi>,
    config: CatalogConfig,
    /// Last successfully loaded listing
    cache: Arc<RwLock<Vec<Book>>>,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BooksApi>, config: CatalogConfig) -> Self {
        Self {
            books,
            config,
            cache: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Reload the listing; on failure the previous listing stays in place
    pub async fn reload(&self) -> AppResult<usize> {
        match self.books.list(None).await {
            Ok(mut books) => {
                for book in &mut books {
                    book.refresh_availability();
                }
                let count = books.len();
                *self.cache.write().await = books;
                tracing::debug!("Loaded {} books", count);
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("Failed to load the catalogue: {}", e);
                Err(e)
            }
        }
    }

    /// Reload and return the full listing
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.reload().await?;
        Ok(self.books().await)
    }

    pub async fn books(&self) -> Vec<Book> {
        self.cache.read().await.clone()
    }

    /// Query the cached listing
    pub async fn browse(&self, q: &CatalogQuery) -> Page<Book> {
        query(&self.cache.read().await, q, self.config.page_size)
    }

    pub async fn genres(&self) -> Vec<String> {
        genres(&self.cache.read().await)
    }

    /// Type-ahead suggestions from the backend search
    pub async fn suggest(&self, text: &str) -> AppResult<Vec<Book>> {
        let text = text.trim();
        if text.chars().count() < self.config.suggest_min_chars {
            return Ok(Vec::new());
        }
        let mut books = self.books.list(Some(text.to_string())).await?;
        books.truncate(self.config.suggest_limit);
        Ok(books)
    }

    pub async fn get_book(&self, book_id: i32) -> AppResult<Book> {
        let mut book = self.books.get(book_id).await?;
        book.refresh_availability();
        Ok(book)
    }

    pub async fn create_book(&self, session: &Session, input: BookInput) -> AppResult<Book> {
        session.require(Capability::ManageCatalog)?;
        let input = input.normalized();
        input.validate()?;

        let book = self.books.create(&input).await?;
        tracing::info!("Added book {} ({} copies)", book.book_id, input.copy_number);
        self.upsert_cached(book.clone()).await;
        Ok(book)
    }

    pub async fn update_book(&self, session: &Session, book_id: i32, input: BookInput) -> AppResult<Book> {
        session.require(Capability::ManageCatalog)?;
        let input = input.normalized();
        input.validate()?;

        let book = self.books.update(book_id, &input).await?;
        tracing::info!("Updated book {}", book_id);
        self.upsert_cached(book.clone()).await;
        Ok(book)
    }

    pub async fn delete_book(&self, session: &Session, book_id: i32) -> AppResult<()> {
        session.require(Capability::ManageCatalog)?;
        self.books.delete(book_id).await?;
        tracing::info!("Deleted book {}", book_id);
        self.cache.write().await.retain(|b| b.book_id != book_id);
        Ok(())
    }

    async fn upsert_cached(&self, mut book: Book) {
        book.refresh_availability();
        let mut cache = self.cache.write().await;
        match cache.iter_mut().find(|b| b.book_id == book.book_id) {
            Some(existing) => *existing = book,
            None => cache.push(book),
        }
    }
}
