//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;

use super::DomainError;
use super::normalize::NormalizedName;

/// The three name-keyed reference tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Author,
    Genre,
    Publisher,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Author => "author",
            ReferenceKind::Genre => "genre",
            ReferenceKind::Publisher => "publisher",
        }
    }
}

/// A resolved author, genre or publisher row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub id: i32,
    pub name: String,
    /// Whether this call inserted the row
    pub created: bool,
}

/// Minimal view of a stored book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRef {
    pub id: i32,
    pub title: String,
}

/// Book row to insert, all names already resolved
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: NormalizedName,
    pub author_id: i32,
    pub synopsis: String,
    pub book_cover: Option<String>,
    pub rating: f64,
    pub views: i64,
}

/// Chapter row to insert
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub book_id: i32,
    pub title: String,
    pub content: Option<String>,
    pub file_path: Option<String>,
    pub chapter_number: Option<i32>,
}

/// Result of an insert guarded by a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(i32),
    /// The unique key was taken by someone else
    Conflict,
}

/// Storage operations the ingestion engine needs
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Find a book by normalized title key
    async fn find_book_by_title_key(
        &self,
        title_key: &str,
    ) -> Result<Option<BookRef>, DomainError>;

    /// Find a book by ID
    async fn find_book_by_id(&self, id: i32) -> Result<Option<BookRef>, DomainError>;

    /// Return the row whose key matches, inserting it first if absent.
    ///
    /// A concurrent insert of the same key is resolved by re-reading.
    async fn get_or_create(
        &self,
        kind: ReferenceKind,
        name: &NormalizedName,
    ) -> Result<NamedRef, DomainError>;

    /// Insert a book; `Conflict` when the title key is already taken
    async fn insert_book(&self, book: &NewBook) -> Result<InsertOutcome, DomainError>;

    /// Link a genre to a book
    async fn attach_genre(&self, book_id: i32, genre_id: i32) -> Result<(), DomainError>;

    /// Record a publisher edition of a book
    async fn attach_publisher(
        &self,
        book_id: i32,
        publisher_id: i32,
        translation: bool,
        edition: &str,
    ) -> Result<(), DomainError>;

    /// Whether the book already has a chapter with exactly this title
    async fn chapter_exists(&self, book_id: i32, title: &str) -> Result<bool, DomainError>;

    /// Insert a chapter; `Conflict` when the (book, title) pair is taken
    async fn insert_chapter(&self, chapter: &NewChapter) -> Result<InsertOutcome, DomainError>;
}
