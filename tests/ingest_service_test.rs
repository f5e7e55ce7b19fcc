use async_trait::async_trait;
use catalog_ingest::db;
use catalog_ingest::domain::{
    BookRef, CatalogStore, DomainError, InsertOutcome, NamedRef, NewBook, NewChapter,
    NormalizedName, ReferenceKind, Rejection, normalize_name, normalize_title,
};
use catalog_ingest::infrastructure::SeaOrmCatalogStore;
use catalog_ingest::models::{author, book, book_publishers, chapter, genre, publisher};
use catalog_ingest::services::{IngestService, RecordOutcome, ingest_book, validate_book};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, Statement,
};
use serde_json::{Value, json};

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    // In-memory SQLite for testing
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

async fn setup_service() -> (DatabaseConnection, IngestService) {
    let db = setup_test_db().await;
    let service = IngestService::new(db.clone(), 50);
    (db, service)
}

fn book_payload(title: &str, author: &str) -> Value {
    json!({
        "title": title,
        "author": author,
        "synopsis": "A synopsis.",
        "rating": 4.0,
        "views": 10
    })
}

async fn count_books(db: &DatabaseConnection) -> u64 {
    book::Entity::find().count(db).await.unwrap()
}

#[tokio::test]
async fn test_dune_example() {
    let (db, service) = setup_service().await;

    let dune = json!({
        "title": "Dune",
        "author": "Frank Herbert",
        "synopsis": "...",
        "views": 0,
        "rating": 4.8,
        "genres": ["Sci Fi"]
    });

    let first = service.ingest_books(vec![dune.clone()]).await.unwrap();
    assert_eq!(first.accepted.len(), 1);
    assert!(first.rejected.is_empty());

    let created = &first.accepted[0];
    assert_eq!(created.title, "Dune");
    assert_eq!(created.author, "Frank Herbert");
    assert_eq!(created.genres, vec!["Sci Fi".to_string()]);
    assert_eq!(created.rating, 4.8);

    let authors = author::Entity::find().all(&db).await.unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].name, "Frank Herbert");
    let genres = genre::Entity::find().all(&db).await.unwrap();
    assert_eq!(genres.len(), 1);
    assert_eq!(genres[0].name, "Sci Fi");

    let second = service.ingest_books(vec![dune.clone()]).await.unwrap();
    assert!(second.accepted.is_empty());
    assert_eq!(second.rejected.len(), 1);
    assert_eq!(
        second.rejected[0].reason,
        Rejection::DuplicateTitle {
            title: "Dune".to_string()
        }
    );
    assert_eq!(second.rejected[0].payload, dune);

    let serialized = serde_json::to_value(&second.rejected[0]).unwrap();
    assert_eq!(serialized["error"], "DuplicateTitle");
    assert_eq!(serialized["title"], "Dune");
    assert_eq!(serialized["index"], 0);

    assert_eq!(count_books(&db).await, 1);
}

#[tokio::test]
async fn test_title_duplicates_are_case_insensitive() {
    let (db, service) = setup_service().await;

    let outcome = service
        .ingest_books(vec![
            book_payload("The Hobbit", "J.R.R. Tolkien"),
            book_payload("the hobbit", "J.R.R. Tolkien"),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.accepted.len(), 1);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].index, 1);
    assert_eq!(outcome.rejected[0].reason.kind(), "DuplicateTitle");
    assert_eq!(count_books(&db).await, 1);
}

#[tokio::test]
async fn test_author_is_shared_between_books() {
    let (db, service) = setup_service().await;

    let outcome = service
        .ingest_books(vec![
            book_payload("Foundation", "isaac asimov"),
            book_payload("I, Robot", "Isaac Asimov"),
        ])
        .await
        .unwrap();
    assert_eq!(outcome.accepted.len(), 2);

    let authors = author::Entity::find().all(&db).await.unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].name, "Isaac Asimov");

    let books = book::Entity::find().all(&db).await.unwrap();
    assert!(books.iter().all(|b| b.author_id == authors[0].id));

    let linked = authors[0].find_related(book::Entity).count(&db).await.unwrap();
    assert_eq!(linked, 2);
}

#[tokio::test]
async fn test_order_is_preserved() {
    let (_db, service) = setup_service().await;

    let invalid = json!({
        "author": "Nobody",
        "synopsis": "No title here.",
        "rating": 1,
        "views": 0
    });

    let outcome = service
        .ingest_books(vec![
            book_payload("Alpha", "Writer One"),
            invalid.clone(),
            book_payload("Gamma", "Writer Two"),
        ])
        .await
        .unwrap();

    let titles: Vec<&str> = outcome.accepted.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha", "Gamma"]);

    assert_eq!(outcome.rejected.len(), 1);
    let rejected = &outcome.rejected[0];
    assert_eq!(rejected.index, 1);
    assert_eq!(rejected.payload, invalid);
    match &rejected.reason {
        Rejection::ValidationError { fields } => assert!(fields.contains_key("title")),
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_one_invalid_record_does_not_block_the_batch() {
    let (db, service) = setup_service().await;

    let mut records: Vec<Value> = (0..10)
        .map(|i| book_payload(&format!("Volume {}", i), "Series Author"))
        .collect();
    records[4]["views"] = json!("many");

    let outcome = service.ingest_books(records).await.unwrap();
    assert_eq!(outcome.accepted.len(), 9);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].index, 4);
    assert_eq!(outcome.total(), 10);
    assert_eq!(count_books(&db).await, 9);
}

#[tokio::test]
async fn test_publisher_editions() {
    let (db, service) = setup_service().await;

    let mut payload = book_payload("The Little Prince", "Antoine de Saint-Exupéry");
    payload["publisher"] = json!("reynal & hitchcock");
    payload["publishers"] = json!([
        {"publisher": "Gallimard", "translation": false, "edition": "First"},
        {"publisher": "Reynal & Hitchcock", "translation": true, "edition": "Original"}
    ]);

    let outcome = service.ingest_books(vec![payload]).await.unwrap();
    assert_eq!(outcome.accepted.len(), 1);

    let created = &outcome.accepted[0];
    // The flat publisher and the repeated list entry collapse to one edition
    assert_eq!(created.publishers.len(), 2);
    assert_eq!(created.publishers[0].publisher, "Reynal & Hitchcock");
    assert!(!created.publishers[0].translation);
    assert_eq!(created.publishers[0].edition, "Original");
    assert_eq!(created.publishers[1].publisher, "Gallimard");
    assert_eq!(created.publishers[1].edition, "First");

    assert_eq!(publisher::Entity::find().count(&db).await.unwrap(), 2);
    let links = book_publishers::Entity::find()
        .filter(book_publishers::Column::BookId.eq(created.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(links.len(), 2);
}

#[tokio::test]
async fn test_genres_attached_as_set() {
    let (db, service) = setup_service().await;

    let mut payload = book_payload("Neuromancer", "William Gibson");
    payload["genres"] = json!(["cyberpunk", "Sci Fi", "CYBERPUNK"]);

    let outcome = service.ingest_books(vec![payload]).await.unwrap();
    assert_eq!(
        outcome.accepted[0].genres,
        vec!["Cyberpunk".to_string(), "Sci Fi".to_string()]
    );

    let stored = book::Entity::find_by_id(outcome.accepted[0].id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let genres = stored.find_related(genre::Entity).all(&db).await.unwrap();
    assert_eq!(genres.len(), 2);
}

#[tokio::test]
async fn test_rejected_duplicate_creates_no_reference_rows() {
    let (db, service) = setup_service().await;

    service
        .ingest_books(vec![book_payload("Emma", "Jane Austen")])
        .await
        .unwrap();

    let mut duplicate = book_payload("EMMA", "Someone Else");
    duplicate["genres"] = json!(["Romance"]);
    duplicate["publisher"] = json!("Murray");

    let outcome = service.ingest_books(vec![duplicate]).await.unwrap();
    assert_eq!(outcome.rejected.len(), 1);

    assert_eq!(author::Entity::find().count(&db).await.unwrap(), 1);
    assert_eq!(genre::Entity::find().count(&db).await.unwrap(), 0);
    assert_eq!(publisher::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_batch() {
    let (_db, service) = setup_service().await;

    let outcome = service.ingest_books(Vec::new()).await.unwrap();
    assert!(outcome.accepted.is_empty());
    assert!(outcome.rejected.is_empty());
}

#[tokio::test]
async fn test_batch_too_large() {
    let db = setup_test_db().await;
    let service = IngestService::new(db.clone(), 2);

    let records = vec![
        book_payload("One", "A"),
        book_payload("Two", "B"),
        book_payload("Three", "C"),
    ];
    let err = service.ingest_books(records).await.unwrap_err();
    assert!(matches!(
        err,
        catalog_ingest::domain::IngestError::BatchTooLarge { size: 3, limit: 2 }
    ));
    assert_eq!(count_books(&db).await, 0);
}

#[tokio::test]
async fn test_chapters_attach_to_existing_book() {
    let (db, service) = setup_service().await;

    let books = service
        .ingest_books(vec![book_payload("Dracula", "Bram Stoker")])
        .await
        .unwrap();
    let book_id = books.accepted[0].id;

    let outcome = service
        .ingest_chapters(vec![
            json!({"book": book_id, "title": "Jonathan Harker's Journal", "content": "3 May. Bistritz.", "chapter_number": 1}),
            json!({"book_title": "dracula", "title": "Chapter II", "file": "chapters/dracula-2.txt"}),
            json!({"book": 9999, "title": "Lost", "content": "..."}),
            json!({"book": book_id, "title": "Jonathan Harker's Journal", "content": "again"}),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.accepted.len(), 2);
    assert_eq!(outcome.accepted[0].chapter_number, Some(1));
    assert_eq!(outcome.accepted[1].book_id, book_id);
    assert_eq!(outcome.accepted[1].file.as_deref(), Some("chapters/dracula-2.txt"));

    assert_eq!(outcome.rejected.len(), 2);
    assert_eq!(
        outcome.rejected[0].reason,
        Rejection::BookNotFound {
            book_id: Some(9999),
            book_title: None
        }
    );
    assert_eq!(outcome.rejected[1].index, 3);
    assert_eq!(outcome.rejected[1].reason.kind(), "DuplicateChapter");

    assert_eq!(chapter::Entity::find().count(&db).await.unwrap(), 2);
}

#[tokio::test]
async fn test_chapter_titles_are_scoped_per_book() {
    let (db, service) = setup_service().await;

    service
        .ingest_books(vec![
            book_payload("First Book", "Author"),
            book_payload("Second Book", "Author"),
        ])
        .await
        .unwrap();

    let outcome = service
        .ingest_chapters(vec![
            json!({"book_title": "First Book", "title": "Prologue", "content": "a"}),
            json!({"book_title": "Second Book", "title": "Prologue", "content": "b"}),
            json!({"book_title": "First Book", "title": "prologue", "content": "c"}),
        ])
        .await
        .unwrap();

    // Exact titles: "prologue" differs from "Prologue"
    assert_eq!(outcome.accepted.len(), 3);
    assert_eq!(chapter::Entity::find().count(&db).await.unwrap(), 3);
}

#[tokio::test]
async fn test_combined_chapters_reference_new_books() {
    let (db, service) = setup_service().await;

    let outcome = service
        .ingest_books_and_chapters(
            vec![book_payload("Moby Dick", "Herman Melville")],
            vec![
                json!({"book_title": "moby dick", "title": "Loomings", "content": "Call me Ishmael."}),
                json!({"book_title": "moby dick", "content": "missing title"}),
            ],
        )
        .await
        .unwrap();

    assert_eq!(outcome.books.accepted.len(), 1);
    assert_eq!(outcome.chapters.accepted.len(), 1);
    assert_eq!(outcome.chapters.accepted[0].book_title, "Moby Dick");
    assert_eq!(outcome.chapters.rejected.len(), 1);
    assert_eq!(outcome.chapters.rejected[0].reason.kind(), "ValidationError");

    // The chapter rejection did not undo the book
    assert_eq!(count_books(&db).await, 1);
    assert_eq!(chapter::Entity::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_combined_storage_failure_rolls_back_books() {
    let (db, service) = setup_service().await;

    // Make the chapter half fail at the storage level
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "DROP TABLE chapters".to_owned(),
    ))
    .await
    .unwrap();

    let result = service
        .ingest_books_and_chapters(
            vec![
                book_payload("Ulysses", "James Joyce"),
                book_payload("Dubliners", "James Joyce"),
            ],
            vec![json!({"book_title": "Ulysses", "title": "Telemachus", "content": "Stately, plump Buck Mulligan"})],
        )
        .await;

    assert!(matches!(
        result,
        Err(catalog_ingest::domain::IngestError::Storage(_))
    ));
    assert_eq!(count_books(&db).await, 0);
    assert_eq!(author::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_book_only_storage_failure_keeps_committed_records() {
    let (db, service) = setup_service().await;

    service
        .ingest_books(vec![book_payload("Persuasion", "Jane Austen")])
        .await
        .unwrap();

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "DROP TABLE book_genres".to_owned(),
    ))
    .await
    .unwrap();

    let mut with_genre = book_payload("Mansfield Park", "Jane Austen");
    with_genre["genres"] = json!(["Classic"]);

    let result = service
        .ingest_books(vec![book_payload("Sense And Sensibility", "Jane Austen"), with_genre])
        .await;
    assert!(result.is_err());

    // The first record committed on its own; the failing one left nothing behind
    let titles: Vec<String> = book::Entity::find()
        .all(&db)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.title)
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Sense And Sensibility".to_string()));
    assert!(!titles.contains(&"Mansfield Park".to_string()));
    assert_eq!(genre::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_store_insert_book_reports_title_conflict() {
    let (db, service) = setup_service().await;
    service
        .ingest_books(vec![book_payload("Emma", "Jane Austen")])
        .await
        .unwrap();

    let store = SeaOrmCatalogStore::new(&db);
    let author = store
        .get_or_create(ReferenceKind::Author, &normalize_name("Jane Austen").unwrap())
        .await
        .unwrap();

    let outcome = store
        .insert_book(&NewBook {
            title: normalize_title("EMMA").unwrap(),
            author_id: author.id,
            synopsis: "Again.".to_string(),
            book_cover: None,
            rating: 3.0,
            views: 0,
        })
        .await
        .unwrap();

    assert_eq!(outcome, InsertOutcome::Conflict);
    assert_eq!(count_books(&db).await, 1);
}

#[tokio::test]
async fn test_get_or_create_reuses_existing_row() {
    let db = setup_test_db().await;
    let store = SeaOrmCatalogStore::new(&db);
    let name = normalize_name("ursula k. le guin").unwrap();

    let first = store.get_or_create(ReferenceKind::Author, &name).await.unwrap();
    assert!(first.created);
    assert_eq!(first.name, "Ursula K. Le Guin");

    let again = store
        .get_or_create(ReferenceKind::Author, &normalize_name("URSULA K. LE GUIN").unwrap())
        .await
        .unwrap();
    assert_eq!(again.id, first.id);
    assert!(!again.created);

    assert_eq!(author::Entity::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_insert_after_missed_lookup_rereads_winner() {
    let db = setup_test_db().await;
    let store = SeaOrmCatalogStore::new(&db);
    let name = normalize_name("Fantasy").unwrap();

    // Another writer commits the row between our lookup and our insert
    let winner = store.get_or_create(ReferenceKind::Genre, &name).await.unwrap();

    let loser = store
        .insert_or_reread(ReferenceKind::Genre, &name)
        .await
        .unwrap();
    assert_eq!(loser.id, winner.id);
    assert_eq!(loser.name, "Fantasy");
    assert!(!loser.created);

    assert_eq!(genre::Entity::find().count(&db).await.unwrap(), 1);
}

/// Store whose title lookup always misses, as if another writer inserted
/// the same title right after the check
struct StaleTitleLookup<'c> {
    inner: SeaOrmCatalogStore<'c, DatabaseConnection>,
}

#[async_trait]
impl<'c> CatalogStore for StaleTitleLookup<'c> {
    async fn find_book_by_title_key(&self, _: &str) -> Result<Option<BookRef>, DomainError> {
        Ok(None)
    }

    async fn find_book_by_id(&self, id: i32) -> Result<Option<BookRef>, DomainError> {
        self.inner.find_book_by_id(id).await
    }

    async fn get_or_create(
        &self,
        kind: ReferenceKind,
        name: &NormalizedName,
    ) -> Result<NamedRef, DomainError> {
        self.inner.get_or_create(kind, name).await
    }

    async fn insert_book(&self, book: &NewBook) -> Result<InsertOutcome, DomainError> {
        self.inner.insert_book(book).await
    }

    async fn attach_genre(&self, book_id: i32, genre_id: i32) -> Result<(), DomainError> {
        self.inner.attach_genre(book_id, genre_id).await
    }

    async fn attach_publisher(
        &self,
        book_id: i32,
        publisher_id: i32,
        translation: bool,
        edition: &str,
    ) -> Result<(), DomainError> {
        self.inner
            .attach_publisher(book_id, publisher_id, translation, edition)
            .await
    }

    async fn chapter_exists(&self, book_id: i32, title: &str) -> Result<bool, DomainError> {
        self.inner.chapter_exists(book_id, title).await
    }

    async fn insert_chapter(&self, chapter: &NewChapter) -> Result<InsertOutcome, DomainError> {
        self.inner.insert_chapter(chapter).await
    }
}

#[tokio::test]
async fn test_title_taken_after_check_is_duplicate() {
    let (db, service) = setup_service().await;
    service
        .ingest_books(vec![book_payload("Middlemarch", "George Eliot")])
        .await
        .unwrap();

    let store = StaleTitleLookup {
        inner: SeaOrmCatalogStore::new(&db),
    };
    let record = validate_book(&book_payload("middlemarch", "George Eliot")).unwrap();

    match ingest_book(&store, &record).await.unwrap() {
        RecordOutcome::Rejected(Rejection::DuplicateTitle { title }) => {
            assert_eq!(title, "Middlemarch")
        }
        RecordOutcome::Rejected(other) => panic!("unexpected rejection: {:?}", other),
        RecordOutcome::Accepted(_) => panic!("duplicate title was accepted"),
    }
    assert_eq!(count_books(&db).await, 1);
}
