//! SeaORM implementation of CatalogStore
#![allow(clippy::needless_update)] // SeaORM ActiveModels require ..Default::default()

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, SqlErr,
};

use crate::domain::{
    BookRef, CatalogStore, DomainError, InsertOutcome, NamedRef, NewBook, NewChapter,
    NormalizedName, ReferenceKind,
};
use crate::models::{book, book_genres, book_publishers, chapter};

/// SeaORM-based implementation of CatalogStore.
///
/// Borrows whatever connection it is given, so the same code runs on a plain
/// connection, a transaction or a savepoint.
pub struct SeaOrmCatalogStore<'c, C> {
    conn: &'c C,
}

impl<'c, C> SeaOrmCatalogStore<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

// The three reference tables share a shape but not a Rust type.
macro_rules! find_named {
    ($conn:expr, $entity:ident, $name:expr) => {{
        use crate::models::$entity::{Column, Entity};

        let name: &NormalizedName = $name;
        Entity::find()
            .filter(Column::NameKey.eq(name.key.as_str()))
            .one($conn)
            .await?
            .map(|existing| NamedRef {
                id: existing.id,
                name: existing.name,
                created: false,
            })
    }};
}

macro_rules! insert_named {
    ($conn:expr, $entity:ident, $kind:expr, $name:expr) => {{
        use crate::models::$entity::{ActiveModel, Column, Entity};

        let conn = $conn;
        let name: &NormalizedName = $name;
        let now = chrono::Utc::now().to_rfc3339();
        let row = ActiveModel {
            name: Set(name.display.clone()),
            name_key: Set(name.key.clone()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = match Entity::insert(row)
            .on_conflict(OnConflict::column(Column::NameKey).do_nothing().to_owned())
            .exec_without_returning(conn)
            .await
        {
            Ok(rows) => rows > 0,
            Err(DbErr::RecordNotInserted) => false,
            Err(e) => return Err(e.into()),
        };

        // Re-read: if another writer won the race, its row is the one to use
        let model = Entity::find()
            .filter(Column::NameKey.eq(name.key.as_str()))
            .one(conn)
            .await?
            .ok_or_else(|| {
                DomainError::Internal(format!(
                    "{} '{}' vanished after insert",
                    $kind.as_str(),
                    name.display
                ))
            })?;

        if !created {
            tracing::debug!(
                "Lost insert race for {} '{}', reusing id {}",
                $kind.as_str(),
                model.name,
                model.id
            );
        }

        NamedRef {
            id: model.id,
            name: model.name,
            created,
        }
    }};
}

impl<'c, C> SeaOrmCatalogStore<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    /// Insert a reference row unless its key exists, then return the stored row.
    ///
    /// This is the path taken after a lookup missed; a row committed by
    /// another writer in between is returned with `created == false`.
    pub async fn insert_or_reread(
        &self,
        kind: ReferenceKind,
        name: &NormalizedName,
    ) -> Result<NamedRef, DomainError> {
        let resolved = match kind {
            ReferenceKind::Author => insert_named!(self.conn, author, kind, name),
            ReferenceKind::Genre => insert_named!(self.conn, genre, kind, name),
            ReferenceKind::Publisher => insert_named!(self.conn, publisher, kind, name),
        };
        Ok(resolved)
    }
}

#[async_trait]
impl<'c, C> CatalogStore for SeaOrmCatalogStore<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn find_book_by_title_key(
        &self,
        title_key: &str,
    ) -> Result<Option<BookRef>, DomainError> {
        let found = book::Entity::find()
            .filter(book::Column::TitleKey.eq(title_key))
            .one(self.conn)
            .await?;

        Ok(found.map(|b| BookRef {
            id: b.id,
            title: b.title,
        }))
    }

    async fn find_book_by_id(&self, id: i32) -> Result<Option<BookRef>, DomainError> {
        let found = book::Entity::find_by_id(id).one(self.conn).await?;

        Ok(found.map(|b| BookRef {
            id: b.id,
            title: b.title,
        }))
    }

    async fn get_or_create(
        &self,
        kind: ReferenceKind,
        name: &NormalizedName,
    ) -> Result<NamedRef, DomainError> {
        let existing = match kind {
            ReferenceKind::Author => find_named!(self.conn, author, name),
            ReferenceKind::Genre => find_named!(self.conn, genre, name),
            ReferenceKind::Publisher => find_named!(self.conn, publisher, name),
        };
        match existing {
            Some(found) => Ok(found),
            None => self.insert_or_reread(kind, name).await,
        }
    }

    async fn insert_book(&self, new_book: &NewBook) -> Result<InsertOutcome, DomainError> {
        let now = chrono::Utc::now().to_rfc3339();

        let row = book::ActiveModel {
            title: Set(new_book.title.display.clone()),
            title_key: Set(new_book.title.key.clone()),
            author_id: Set(new_book.author_id),
            synopsis: Set(new_book.synopsis.clone()),
            book_cover: Set(new_book.book_cover.clone()),
            rating: Set(new_book.rating),
            views: Set(new_book.views),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        match row.insert(self.conn).await {
            Ok(model) => Ok(InsertOutcome::Created(model.id)),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    async fn attach_genre(&self, book_id: i32, genre_id: i32) -> Result<(), DomainError> {
        let link = book_genres::ActiveModel {
            book_id: Set(book_id),
            genre_id: Set(genre_id),
        };
        book_genres::Entity::insert(link)
            .exec_without_returning(self.conn)
            .await?;
        Ok(())
    }

    async fn attach_publisher(
        &self,
        book_id: i32,
        publisher_id: i32,
        translation: bool,
        edition: &str,
    ) -> Result<(), DomainError> {
        let link = book_publishers::ActiveModel {
            book_id: Set(book_id),
            publisher_id: Set(publisher_id),
            translation: Set(translation),
            edition: Set(edition.to_string()),
            ..Default::default()
        };
        book_publishers::Entity::insert(link)
            .exec_without_returning(self.conn)
            .await?;
        Ok(())
    }

    async fn chapter_exists(&self, book_id: i32, title: &str) -> Result<bool, DomainError> {
        let count = chapter::Entity::find()
            .filter(chapter::Column::BookId.eq(book_id))
            .filter(chapter::Column::Title.eq(title))
            .count(self.conn)
            .await?;
        Ok(count > 0)
    }

    async fn insert_chapter(&self, new_chapter: &NewChapter) -> Result<InsertOutcome, DomainError> {
        let row = chapter::ActiveModel {
            book_id: Set(new_chapter.book_id),
            title: Set(new_chapter.title.clone()),
            content: Set(new_chapter.content.clone()),
            file_path: Set(new_chapter.file_path.clone()),
            chapter_number: Set(new_chapter.chapter_number),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        match row.insert(self.conn).await {
            Ok(model) => Ok(InsertOutcome::Created(model.id)),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Conflict),
            Err(e) => Err(e.into()),
        }
    }
}
