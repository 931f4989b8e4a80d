use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{ClaimDraftGateway, ExtractionGateway, GatewayError};
use crate::claim::ClaimRequest;
use crate::models::{ClaimDraft, ExtractedInvoiceDetails};
use crate::pipeline::intake::InvoiceDocument;

/// Mock extraction gateway for testing. Returns configurable details and
/// counts how often each stage was called.
pub struct MockExtractionGateway {
    details: ExtractedInvoiceDetails,
    upload_error: Option<GatewayError>,
    extract_error: Option<GatewayError>,
    /// Number of leading `extract` calls that fail with `extract_error`.
    extract_failures: AtomicUsize,
    upload_gate: Option<Arc<Notify>>,
    upload_calls: AtomicUsize,
    extract_calls: AtomicUsize,
}

impl MockExtractionGateway {
    pub fn new(details: ExtractedInvoiceDetails) -> Self {
        Self {
            details,
            upload_error: None,
            extract_error: None,
            extract_failures: AtomicUsize::new(0),
            upload_gate: None,
            upload_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
        }
    }

    /// Every upload fails with `message`.
    pub fn failing_upload(mut self, message: &str) -> Self {
        self.upload_error = Some(GatewayError::Rejected(message.to_string()));
        self
    }

    /// The first `times` extractions fail with `error`, later ones succeed.
    pub fn failing_extract(mut self, error: GatewayError, times: usize) -> Self {
        self.extract_error = Some(error);
        self.extract_failures = AtomicUsize::new(times);
        self
    }

    /// Uploads wait until `gate` is notified.
    pub fn with_upload_gate(mut self, gate: Arc<Notify>) -> Self {
        self.upload_gate = Some(gate);
        self
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionGateway for MockExtractionGateway {
    async fn upload(&self, document: &InvoiceDocument) -> Result<Vec<String>, GatewayError> {
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.upload_gate {
            gate.notified().await;
        }
        if let Some(err) = &self.upload_error {
            return Err(err.clone());
        }
        Ok(vec![format!("asset-{call}-{}", document.byte_len)])
    }

    async fn extract(&self, _asset_ids: &[String]) -> Result<ExtractedInvoiceDetails, GatewayError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.extract_error {
            let remaining = self
                .extract_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if remaining.is_ok() {
                return Err(err.clone());
            }
        }
        Ok(self.details.clone())
    }
}

/// Mock drafting gateway for testing.
pub struct MockDraftGateway {
    result: Result<ClaimDraft, GatewayError>,
    calls: AtomicUsize,
}

impl MockDraftGateway {
    pub fn new(draft: ClaimDraft) -> Self {
        Self {
            result: Ok(draft),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(GatewayError::Rejected(message.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClaimDraftGateway for MockDraftGateway {
    async fn draft(&self, _request: &ClaimRequest) -> Result<ClaimDraft, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
