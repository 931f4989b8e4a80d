pub mod intake;
pub mod processor; // Ingestion orchestrator: upload → parse → classify
pub mod state;

pub use processor::{FixedClock, IngestionPipeline, ReferenceClock, SystemClock};
pub use state::*;
