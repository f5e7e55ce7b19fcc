//! Ingestion results: what was created, what was turned away and why

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Field name to the list of problems found with it
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Why a single record was turned away
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "error")]
pub enum Rejection {
    /// Missing or malformed fields
    ValidationError { fields: FieldErrors },
    /// A book with the same title (case-insensitive) is already catalogued
    DuplicateTitle { title: String },
    /// The book already has a chapter with this exact title
    DuplicateChapter { book_id: i32, title: String },
    /// The chapter points at a book that does not exist
    BookNotFound {
        #[serde(skip_serializing_if = "Option::is_none")]
        book_id: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        book_title: Option<String>,
    },
}

impl Rejection {
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::ValidationError { .. } => "ValidationError",
            Rejection::DuplicateTitle { .. } => "DuplicateTitle",
            Rejection::DuplicateChapter { .. } => "DuplicateChapter",
            Rejection::BookNotFound { .. } => "BookNotFound",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Rejection::ValidationError { fields } => {
                let names: Vec<&str> = fields.keys().map(String::as_str).collect();
                format!("Invalid fields: {}", names.join(", "))
            }
            Rejection::DuplicateTitle { title } => {
                format!("A book titled \"{}\" already exists", title)
            }
            Rejection::DuplicateChapter { book_id, title } => {
                format!("Book {} already has a chapter titled \"{}\"", book_id, title)
            }
            Rejection::BookNotFound {
                book_id: Some(id), ..
            } => format!("Book {} does not exist", id),
            Rejection::BookNotFound {
                book_title: Some(title),
                ..
            } => format!("No book titled \"{}\"", title),
            Rejection::BookNotFound { .. } => "Book does not exist".to_string(),
        }
    }
}

/// A rejected record, paired with the payload that was submitted for it
#[derive(Debug, Clone, Serialize)]
pub struct RejectionDetail {
    /// Position of the record in the submitted batch
    pub index: usize,
    #[serde(flatten)]
    pub reason: Rejection,
    pub message: String,
    pub payload: Value,
}

/// Accepted and rejected records of one batch, each in submission order
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome<T> {
    pub accepted: Vec<T>,
    pub rejected: Vec<RejectionDetail>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn accept(&mut self, record: T) {
        self.accepted.push(record);
    }

    pub fn reject(&mut self, index: usize, reason: Rejection, payload: Value) {
        let message = reason.message();
        self.rejected.push(RejectionDetail {
            index,
            reason,
            message,
            payload,
        });
    }

    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }
}

/// One publisher edition of a created book
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditionResult {
    pub publisher: String,
    pub translation: bool,
    pub edition: String,
}

/// A created book as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookResult {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub genres: Vec<String>,
    pub synopsis: String,
    pub book_cover: Option<String>,
    pub rating: f64,
    pub views: i64,
    pub publishers: Vec<EditionResult>,
}

/// A created chapter as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterResult {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub title: String,
    pub content: Option<String>,
    pub file: Option<String>,
    pub chapter_number: Option<i32>,
}

/// Result of the combined books-then-chapters call
#[derive(Debug, Clone, Serialize)]
pub struct CombinedOutcome {
    pub books: BatchOutcome<BookResult>,
    pub chapters: BatchOutcome<ChapterResult>,
}
