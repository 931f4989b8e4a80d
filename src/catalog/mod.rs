//! The product catalog: the persisted set of tracked purchases, plus the
//! sorted/filtered projection shown to the user.

pub mod products;
pub mod store;
pub mod view;

pub use products::ProductCatalog;
pub use store::{CatalogStore, MemoryCatalogStore, SqliteCatalogStore};
pub use view::CatalogView;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid product record: {0}")]
    InvalidRecord(String),

    #[error("Product {0} already has a warranty period")]
    NotEditable(Uuid),

    #[error("Failed to persist catalog: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Failed to serialize catalog: {0}")]
    Serialization(#[from] serde_json::Error),
}
