pub mod author;
pub mod book;
pub mod book_genres;
pub mod book_publishers;
pub mod chapter;
pub mod genre;
pub mod publisher;
