//! Repository layer: key-scoped database operations.

mod kv_store;

pub use kv_store::*;
