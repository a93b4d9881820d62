//! Book (catalogue entry) and copy models

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// One lendable instance of a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCopy {
    pub copy_id: i32,
    pub is_available: bool,
}

/// Catalogue entry as returned by `GET /api/books/` and `GET /api/books/{id}/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: i32,
    pub title: String,
    pub author_name: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub genre_name: String,
    /// Cached summary: true when any copy is available
    pub is_available: bool,
    #[serde(default)]
    pub copies: Vec<BookCopy>,
}

impl Book {
    pub fn copy(&self, copy_id: i32) -> Option<&BookCopy> {
        self.copies.iter().find(|c| c.copy_id == copy_id)
    }

    pub fn copy_mut(&mut self, copy_id: i32) -> Option<&mut BookCopy> {
        self.copies.iter_mut().find(|c| c.copy_id == copy_id)
    }

    /// Recompute `is_available` from the copies.
    ///
    /// List views may omit copies; the backend flag is kept as-is then.
    pub fn refresh_availability(&mut self) {
        if !self.copies.is_empty() {
            self.is_available = self.copies.iter().any(|c| c.is_available);
        }
    }
}

/// Create/update payload for catalogue management
#[derive(Debug, Clone, Serialize, Validate)]
pub struct BookInput {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(rename = "author_name_input")]
    #[validate(length(min = 1, message = "Author name is required"))]
    pub author_name: String,
    #[validate(custom(function = "validate_isbn"))]
    pub isbn: String,
    #[serde(rename = "genre_name_input")]
    #[validate(length(min = 1, message = "Genre is required"))]
    pub genre_name: String,
    #[validate(range(min = 1, message = "At least one copy is required"))]
    pub copy_number: i32,
}

impl BookInput {
    /// Trim text fields and compact the ISBN before validation
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.author_name = self.author_name.trim().to_string();
        self.genre_name = self.genre_name.trim().to_string();
        self.isbn = normalize_isbn(&self.isbn);
        self
    }
}

/// Strip separators from an ISBN, keeping digits and a trailing X
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Check an ISBN-10 or ISBN-13 checksum
pub fn is_valid_isbn(isbn: &str) -> bool {
    let isbn = normalize_isbn(isbn);
    let chars: Vec<char> = isbn.chars().collect();

    match chars.len() {
        10 => {
            let mut sum = 0u32;
            for (i, c) in chars.iter().enumerate() {
                let value = match (i, c) {
                    (9, 'X') => 10,
                    (_, c) => match c.to_digit(10) {
                        Some(d) => d,
                        None => return false,
                    },
                };
                sum += value * (10 - i as u32);
            }
            sum % 11 == 0
        }
        13 => {
            let mut sum = 0u32;
            for (i, c) in chars.iter().enumerate() {
                let Some(d) = c.to_digit(10) else {
                    return false;
                };
                sum += if i % 2 == 0 { d } else { d * 3 };
            }
            sum % 10 == 0
        }
        _ => false,
    }
}

fn validate_isbn(isbn: &str) -> Result<(), ValidationError> {
    if is_valid_isbn(isbn) {
        Ok(())
    } else {
        let mut err = ValidationError::new("isbn");
        err.message = Some("Invalid ISBN format.".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_with_copies(copies: &[(i32, bool)]) -> Book {
        Book {
            book_id: 1,
            title: "1984".to_string(),
            author_name: "George Orwell".to_string(),
            isbn: "9780451524935".to_string(),
            genre_name: "Fiction".to_string(),
            is_available: false,
            copies: copies
                .iter()
                .map(|&(copy_id, is_available)| BookCopy { copy_id, is_available })
                .collect(),
        }
    }

    #[test]
    fn test_normalize_isbn() {
        assert_eq!(normalize_isbn("978-0-451-52493-5"), "9780451524935");
        assert_eq!(normalize_isbn("0 8044 2957 x"), "080442957X");
    }

    #[test]
    fn test_isbn_checksums() {
        assert!(is_valid_isbn("978-0-451-52493-5"));
        assert!(is_valid_isbn("0-8044-2957-X"));
        assert!(!is_valid_isbn("978-0-451-52493-4"));
        assert!(!is_valid_isbn("12345"));
    }

    #[test]
    fn test_availability_follows_copies() {
        let mut book = book_with_copies(&[(101, false), (102, true)]);
        book.refresh_availability();
        assert!(book.is_available);

        if let Some(copy) = book.copy_mut(102) {
            copy.is_available = false;
        }
        book.refresh_availability();
        assert!(!book.is_available);
        assert!(book.copies.iter().all(|c| !c.is_available));
    }

    #[test]
    fn test_list_view_without_copies_keeps_flag() {
        let json = r#"{"book_id": 7, "title": "Dune", "author_name": "Frank Herbert",
                       "isbn": "9780441013593", "genre_name": "Science Fiction", "is_available": true}"#;
        let mut book: Book = serde_json::from_str(json).unwrap();
        book.refresh_availability();
        assert!(book.is_available);
        assert!(book.copies.is_empty());
    }

    #[test]
    fn test_book_input_validation() {
        let input = BookInput {
            title: "  ".to_string(),
            author_name: "Frank Herbert".to_string(),
            isbn: "978-0441013593".to_string(),
            genre_name: "Science Fiction".to_string(),
            copy_number: 0,
        }
        .normalized();

        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("copy_number"));
        assert!(!fields.contains_key("isbn"));
    }

    #[test]
    fn test_book_input_wire_names() {
        let input = BookInput {
            title: "Dune".to_string(),
            author_name: "Frank Herbert".to_string(),
            isbn: "9780441013593".to_string(),
            genre_name: "Science Fiction".to_string(),
            copy_number: 2,
        };
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["author_name_input"], "Frank Herbert");
        assert_eq!(value["genre_name_input"], "Science Fiction");
        assert_eq!(value["copy_number"], 2);
    }
}
