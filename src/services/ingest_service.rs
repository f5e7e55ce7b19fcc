//! Ingest Service - Bulk creation of books and chapters
//!
//! Records are processed one at a time, in submission order. Each record
//! gets its own transaction (a savepoint when the whole call already runs in
//! one), so a record that is rejected half-way leaves nothing behind. Record
//! problems become rejections; only storage failures abort a batch.

use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde_json::Value;

use crate::domain::{
    BatchOutcome, BookResult, CatalogStore, ChapterResult, CombinedOutcome, DomainError,
    EditionResult, IngestError, InsertOutcome, NewBook, NewChapter, ReferenceKind, Rejection,
};
use crate::infrastructure::SeaOrmCatalogStore;
use crate::services::validation::{
    BookRecord, BookReference, ChapterRecord, validate_book, validate_chapter,
};

/// What happened to a single valid record
#[derive(Debug)]
pub enum RecordOutcome<T> {
    Accepted(T),
    Rejected(Rejection),
}

/// Entry point for bulk ingestion, holding the store connection and batch limit
pub struct IngestService {
    db: DatabaseConnection,
    max_batch_size: usize,
}

impl IngestService {
    pub fn new(db: DatabaseConnection, max_batch_size: usize) -> Self {
        Self { db, max_batch_size }
    }

    fn check_batch_size(&self, size: usize) -> Result<(), IngestError> {
        if size > self.max_batch_size {
            tracing::warn!(
                "Refusing batch of {} records (limit {})",
                size,
                self.max_batch_size
            );
            return Err(IngestError::BatchTooLarge {
                size,
                limit: self.max_batch_size,
            });
        }
        Ok(())
    }

    /// Create books; records committed before a storage failure stay committed
    pub async fn ingest_books(
        &self,
        records: Vec<Value>,
    ) -> Result<BatchOutcome<BookResult>, IngestError> {
        self.check_batch_size(records.len())?;
        tracing::info!("Ingesting batch of {} books", records.len());

        let outcome = ingest_book_batch(&self.db, records)
            .await
            .inspect_err(|e| tracing::error!("Book batch aborted: {}", e))?;

        tracing::info!(
            "Book batch done: {} accepted, {} rejected",
            outcome.accepted.len(),
            outcome.rejected.len()
        );
        Ok(outcome)
    }

    /// Create chapters; records committed before a storage failure stay committed
    pub async fn ingest_chapters(
        &self,
        records: Vec<Value>,
    ) -> Result<BatchOutcome<ChapterResult>, IngestError> {
        self.check_batch_size(records.len())?;
        tracing::info!("Ingesting batch of {} chapters", records.len());

        let outcome = ingest_chapter_batch(&self.db, records)
            .await
            .inspect_err(|e| tracing::error!("Chapter batch aborted: {}", e))?;

        tracing::info!(
            "Chapter batch done: {} accepted, {} rejected",
            outcome.accepted.len(),
            outcome.rejected.len()
        );
        Ok(outcome)
    }

    /// Create books, then chapters, all-or-nothing at the storage level.
    ///
    /// Chapters may point at books created earlier in the same call.
    pub async fn ingest_books_and_chapters(
        &self,
        books: Vec<Value>,
        chapters: Vec<Value>,
    ) -> Result<CombinedOutcome, IngestError> {
        self.check_batch_size(books.len())?;
        self.check_batch_size(chapters.len())?;
        tracing::info!(
            "Ingesting combined batch of {} books and {} chapters",
            books.len(),
            chapters.len()
        );

        let txn = self.db.begin().await?;

        let result = async {
            let books = ingest_book_batch(&txn, books).await?;
            let chapters = ingest_chapter_batch(&txn, chapters).await?;
            Ok::<_, IngestError>(CombinedOutcome { books, chapters })
        }
        .await;

        match result {
            Ok(outcome) => {
                txn.commit().await?;
                tracing::info!(
                    "Combined batch done: books {}/{} accepted, chapters {}/{} accepted",
                    outcome.books.accepted.len(),
                    outcome.books.total(),
                    outcome.chapters.accepted.len(),
                    outcome.chapters.total()
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("Combined batch aborted, rolling back: {}", e);
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

/// Commit an accepted record, roll back anything else
async fn settle<T>(
    txn: DatabaseTransaction,
    index: usize,
    result: Result<RecordOutcome<T>, DomainError>,
) -> Result<RecordOutcome<T>, IngestError> {
    match result {
        Ok(RecordOutcome::Accepted(value)) => {
            txn.commit().await?;
            Ok(RecordOutcome::Accepted(value))
        }
        Ok(RecordOutcome::Rejected(rejection)) => {
            txn.rollback().await?;
            Ok(RecordOutcome::Rejected(rejection))
        }
        Err(e) => {
            tracing::error!("Storage failure on record {}: {}", index, e);
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!("Rollback failed: {}", rollback_err);
            }
            Err(e.into())
        }
    }
}

async fn ingest_book_batch<C>(
    conn: &C,
    records: Vec<Value>,
) -> Result<BatchOutcome<BookResult>, IngestError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let mut outcome = BatchOutcome::default();

    for (index, payload) in records.into_iter().enumerate() {
        let record = match validate_book(&payload) {
            Ok(record) => record,
            Err(fields) => {
                reject(&mut outcome, index, Rejection::ValidationError { fields }, payload);
                continue;
            }
        };

        let txn = conn.begin().await?;
        let result = ingest_book(&SeaOrmCatalogStore::new(&txn), &record).await;
        let result = settle(txn, index, result).await?;

        match result {
            RecordOutcome::Accepted(book) => {
                tracing::debug!("Book {} '{}' created", book.id, book.title);
                outcome.accept(book);
            }
            RecordOutcome::Rejected(rejection) => reject(&mut outcome, index, rejection, payload),
        }
    }

    Ok(outcome)
}

async fn ingest_chapter_batch<C>(
    conn: &C,
    records: Vec<Value>,
) -> Result<BatchOutcome<ChapterResult>, IngestError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let mut outcome = BatchOutcome::default();

    for (index, payload) in records.into_iter().enumerate() {
        let record = match validate_chapter(&payload) {
            Ok(record) => record,
            Err(fields) => {
                reject(&mut outcome, index, Rejection::ValidationError { fields }, payload);
                continue;
            }
        };

        let txn = conn.begin().await?;
        let result = ingest_chapter(&SeaOrmCatalogStore::new(&txn), &record).await;
        let result = settle(txn, index, result).await?;

        match result {
            RecordOutcome::Accepted(chapter) => {
                tracing::debug!(
                    "Chapter {} '{}' created for book {}",
                    chapter.id,
                    chapter.title,
                    chapter.book_id
                );
                outcome.accept(chapter);
            }
            RecordOutcome::Rejected(rejection) => reject(&mut outcome, index, rejection, payload),
        }
    }

    Ok(outcome)
}

fn reject<T>(outcome: &mut BatchOutcome<T>, index: usize, rejection: Rejection, payload: Value) {
    tracing::debug!(
        "Record {} rejected: {} ({})",
        index,
        rejection.kind(),
        rejection.message()
    );
    outcome.reject(index, rejection, payload);
}

/// Create one validated book: duplicate check, name resolution, insert, links
pub async fn ingest_book<S>(
    store: &S,
    record: &BookRecord,
) -> Result<RecordOutcome<BookResult>, DomainError>
where
    S: CatalogStore + ?Sized,
{
    if let Some(existing) = store.find_book_by_title_key(&record.title.key).await? {
        return Ok(RecordOutcome::Rejected(Rejection::DuplicateTitle {
            title: existing.title,
        }));
    }

    let author = store
        .get_or_create(ReferenceKind::Author, &record.author)
        .await?;
    if author.created {
        tracing::info!("Created author '{}'", author.name);
    }

    let mut genres = Vec::with_capacity(record.genres.len());
    for name in &record.genres {
        let genre = store.get_or_create(ReferenceKind::Genre, name).await?;
        if genre.created {
            tracing::info!("Created genre '{}'", genre.name);
        }
        genres.push(genre);
    }

    let mut publishers = Vec::with_capacity(record.editions.len());
    for edition in &record.editions {
        let publisher = store
            .get_or_create(ReferenceKind::Publisher, &edition.publisher)
            .await?;
        if publisher.created {
            tracing::info!("Created publisher '{}'", publisher.name);
        }
        publishers.push(publisher);
    }

    let new_book = NewBook {
        title: record.title.clone(),
        author_id: author.id,
        synopsis: record.synopsis.clone(),
        book_cover: record.book_cover.clone(),
        rating: record.rating,
        views: record.views,
    };

    let book_id = match store.insert_book(&new_book).await? {
        InsertOutcome::Created(id) => id,
        // Another writer took the title between our check and our insert
        InsertOutcome::Conflict => {
            return Ok(RecordOutcome::Rejected(Rejection::DuplicateTitle {
                title: record.title.display.clone(),
            }));
        }
    };

    for genre in &genres {
        store.attach_genre(book_id, genre.id).await?;
    }

    let mut editions = Vec::with_capacity(publishers.len());
    for (publisher, edition) in publishers.iter().zip(&record.editions) {
        store
            .attach_publisher(book_id, publisher.id, edition.translation, &edition.edition)
            .await?;
        editions.push(EditionResult {
            publisher: publisher.name.clone(),
            translation: edition.translation,
            edition: edition.edition.clone(),
        });
    }

    Ok(RecordOutcome::Accepted(BookResult {
        id: book_id,
        title: record.title.display.clone(),
        author: author.name,
        genres: genres.into_iter().map(|g| g.name).collect(),
        synopsis: record.synopsis.clone(),
        book_cover: record.book_cover.clone(),
        rating: record.rating,
        views: record.views,
        publishers: editions,
    }))
}

/// Create one validated chapter: book resolution, per-book duplicate check, insert
pub async fn ingest_chapter<S>(
    store: &S,
    record: &ChapterRecord,
) -> Result<RecordOutcome<ChapterResult>, DomainError>
where
    S: CatalogStore + ?Sized,
{
    let book = match &record.book {
        BookReference::Id(id) => store.find_book_by_id(*id).await?,
        BookReference::Title(title) => store.find_book_by_title_key(&title.key).await?,
    };

    let Some(book) = book else {
        let rejection = match &record.book {
            BookReference::Id(id) => Rejection::BookNotFound {
                book_id: Some(*id),
                book_title: None,
            },
            BookReference::Title(title) => Rejection::BookNotFound {
                book_id: None,
                book_title: Some(title.display.clone()),
            },
        };
        return Ok(RecordOutcome::Rejected(rejection));
    };

    let duplicate = Rejection::DuplicateChapter {
        book_id: book.id,
        title: record.title.clone(),
    };

    if store.chapter_exists(book.id, &record.title).await? {
        return Ok(RecordOutcome::Rejected(duplicate));
    }

    let new_chapter = NewChapter {
        book_id: book.id,
        title: record.title.clone(),
        content: record.content.clone(),
        file_path: record.file_path.clone(),
        chapter_number: record.chapter_number,
    };

    match store.insert_chapter(&new_chapter).await? {
        InsertOutcome::Created(id) => Ok(RecordOutcome::Accepted(ChapterResult {
            id,
            book_id: book.id,
            book_title: book.title,
            title: new_chapter.title,
            content: new_chapter.content,
            file: new_chapter.file_path,
            chapter_number: new_chapter.chapter_number,
        })),
        InsertOutcome::Conflict => Ok(RecordOutcome::Rejected(duplicate)),
    }
}
