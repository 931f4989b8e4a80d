pub mod catalog; // Product catalog + sorted/filtered view
pub mod claim; // Claim email drafting sessions
pub mod config;
pub mod db;
pub mod gateway; // Extraction + drafting capabilities
pub mod models;
pub mod pipeline; // Intake validation + ingestion state machine
pub mod warranty; // Status classification + reminder schedule

use tracing_subscriber::EnvFilter;

/// Initialize tracing. `RUST_LOG` overrides the default filter. Safe to
/// call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Open the product catalog stored in the application data directory.
pub fn open_catalog() -> Result<catalog::ProductCatalog, db::DatabaseError> {
    let path = config::catalog_db_path();
    let store = catalog::SqliteCatalogStore::open(&path)?;
    Ok(catalog::ProductCatalog::open(Box::new(store)))
}
