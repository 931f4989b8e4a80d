//! External capabilities the core depends on: document intelligence
//! (upload + invoice extraction) and claim-email drafting.
//!
//! Both are modelled as async traits with a plain success/failure contract
//! so any implementation (remote agent, rule engine, manual form) can be
//! plugged into the pipeline and claim sessions.

pub mod agent;
pub mod mock;

pub use agent::*;
pub use mock::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::claim::ClaimRequest;
use crate::models::{ClaimDraft, ExtractedInvoiceDetails};
use crate::pipeline::intake::InvoiceDocument;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Agent service is not reachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Agent service returned error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("{0}")]
    Rejected(String),

    #[error("Malformed agent response: {0}")]
    MalformedResponse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Document-intelligence capability used by the ingestion pipeline.
#[async_trait]
pub trait ExtractionGateway: Send + Sync {
    /// Store the document and return opaque handles for it.
    async fn upload(&self, document: &InvoiceDocument) -> Result<Vec<String>, GatewayError>;

    /// Extract structured invoice fields from previously uploaded documents.
    async fn extract(&self, asset_ids: &[String]) -> Result<ExtractedInvoiceDetails, GatewayError>;
}

/// Natural-language drafting capability used by claim sessions.
#[async_trait]
pub trait ClaimDraftGateway: Send + Sync {
    async fn draft(&self, request: &ClaimRequest) -> Result<ClaimDraft, GatewayError>;
}
