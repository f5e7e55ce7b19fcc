//! Repository implementations using SeaORM

pub mod catalog_repository;

pub use catalog_repository::SeaOrmCatalogStore;
