//! Ingestion orchestrator.
//!
//! Drives one invoice through upload → parse → classify and publishes every
//! transition on a `watch` channel. The pipeline never touches the catalog:
//! a finished run sits in `Complete` until the caller takes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{watch, Mutex};

use super::intake::InvoiceDocument;
use super::state::{CompletedIngestion, IngestionError, PipelineStage, PipelineState};
use crate::gateway::ExtractionGateway;
use crate::warranty::classify;

// ---------------------------------------------------------------------------
// Reference clock
// ---------------------------------------------------------------------------

/// Source of the reference date used when classifying.
pub trait ReferenceClock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the machine.
pub struct SystemClock;

impl ReferenceClock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Always the same date. For tests and replays.
pub struct FixedClock(pub NaiveDate);

impl ReferenceClock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Single-document ingestion state machine.
///
/// Only one run may be in flight: `submit` is accepted from `Idle` only.
/// Failures park the pipeline in `Error` with the document retained so
/// `retry` can restart the whole run from `Uploading`.
pub struct IngestionPipeline {
    gateway: Arc<dyn ExtractionGateway>,
    clock: Box<dyn ReferenceClock>,
    state: watch::Sender<PipelineState>,
    document: Mutex<Option<InvoiceDocument>>,
    cancel_requested: AtomicBool,
}

impl IngestionPipeline {
    pub fn new(gateway: Arc<dyn ExtractionGateway>) -> Self {
        Self::with_clock(gateway, Box::new(SystemClock))
    }

    pub fn with_clock(gateway: Arc<dyn ExtractionGateway>, clock: Box<dyn ReferenceClock>) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            gateway,
            clock,
            state,
            document: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Current state (cloned).
    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    /// Receive every subsequent state change.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Validate raw bytes and submit them. Intake rejections are returned
    /// without the pipeline ever leaving its current state.
    pub async fn submit_bytes(
        &self,
        bytes: Vec<u8>,
        declared_media_type: &str,
        file_name: Option<&str>,
    ) -> Result<CompletedIngestion, IngestionError> {
        let document = InvoiceDocument::new(bytes, declared_media_type, file_name)
            .map_err(IngestionError::IntakeRejected)?;
        self.submit(document).await
    }

    /// Run a validated document through all three stages.
    pub async fn submit(&self, document: InvoiceDocument) -> Result<CompletedIngestion, IngestionError> {
        let accepted = self.state.send_if_modified(|state| {
            if matches!(state, PipelineState::Idle) {
                *state = PipelineState::Uploading;
                true
            } else {
                false
            }
        });
        if !accepted {
            tracing::warn!(state = self.state.borrow().name(), "Submit rejected, pipeline busy");
            return Err(IngestionError::Busy);
        }

        self.cancel_requested.store(false, Ordering::SeqCst);
        *self.document.lock().await = Some(document.clone());
        self.run(&document).await
    }

    /// Restart a failed run from `Uploading` with the retained document.
    /// Nothing from the failed attempt is reused.
    pub async fn retry(&self) -> Result<CompletedIngestion, IngestionError> {
        let mut current = "";
        let accepted = self.state.send_if_modified(|state| {
            current = state.name();
            if matches!(state, PipelineState::Error { .. }) {
                *state = PipelineState::Uploading;
                true
            } else {
                false
            }
        });
        if !accepted {
            return Err(IngestionError::InvalidTransition {
                action: "retry",
                state: current,
            });
        }

        let Some(document) = self.document.lock().await.clone() else {
            self.state.send_replace(PipelineState::Idle);
            return Err(IngestionError::InvalidTransition {
                action: "retry",
                state: "error",
            });
        };

        tracing::info!(bytes = document.byte_len, "Retrying ingestion from upload");
        self.cancel_requested.store(false, Ordering::SeqCst);
        self.run(&document).await
    }

    /// Hand over a finished run and return to `Idle`. Returns `None` unless
    /// the pipeline is `Complete`, so each result can be taken once.
    pub async fn take_completed(&self) -> Option<CompletedIngestion> {
        // The document is cleared before `Idle` is published, so a submit
        // that follows keeps its own document
        let mut document = self.document.lock().await;
        let mut taken = None;
        self.state.send_if_modified(|state| {
            match std::mem::replace(state, PipelineState::Idle) {
                PipelineState::Complete(done) => {
                    *document = None;
                    taken = Some(done);
                    true
                }
                other => {
                    *state = other;
                    false
                }
            }
        });
        taken
    }

    /// Discard any finished or failed run. Not allowed mid-run.
    pub async fn reset(&self) -> Result<(), IngestionError> {
        let mut document = self.document.lock().await;
        let mut running = None;
        self.state.send_if_modified(|state| {
            if state.is_running() {
                running = Some(state.name());
                return false;
            }
            *document = None;
            let finished = state.is_terminal();
            if finished {
                *state = PipelineState::Idle;
            }
            finished
        });
        match running {
            Some(state) => Err(IngestionError::InvalidTransition {
                action: "reset",
                state,
            }),
            None => Ok(()),
        }
    }

    /// Ask the in-flight run to stop at the next stage boundary. The
    /// current gateway call still runs to completion.
    pub fn cancel(&self) -> bool {
        if !self.state.borrow().is_running() {
            return false;
        }
        self.cancel_requested.store(true, Ordering::SeqCst);
        true
    }

    async fn run(&self, document: &InvoiceDocument) -> Result<CompletedIngestion, IngestionError> {
        tracing::info!(
            bytes = document.byte_len,
            media_type = %document.media_type,
            "Ingestion started"
        );

        // Stage 1: upload
        let asset_ids = match self.gateway.upload(document).await {
            Ok(ids) => ids,
            Err(e) => return Err(self.fail(PipelineStage::Upload, e.to_string())),
        };
        tracing::debug!(assets = asset_ids.len(), "Upload complete");

        // Stage 2: parse
        self.enter(PipelineState::Parsing)?;
        let details = match self.gateway.extract(&asset_ids).await {
            Ok(details) => details,
            Err(e) => return Err(self.fail(PipelineStage::Parse, e.to_string())),
        };
        let low_confidence = details.low_confidence_fields();
        if !low_confidence.is_empty() {
            tracing::info!(fields = ?low_confidence, "Extraction returned low-confidence fields");
        }

        // Stage 3: classify
        self.enter(PipelineState::Classifying)?;
        let status = classify(
            details.purchase_date,
            details.warranty_period.as_deref(),
            self.clock.today(),
        )
        .map_err(|e| self.fail(PipelineStage::Classify, e.to_string()))?;

        tracing::info!(
            product = %details.display_name(),
            status = %status.state,
            days_until_expiry = status.days_until_expiry,
            "Ingestion complete"
        );

        let completed = CompletedIngestion {
            details,
            status,
            asset_ids,
        };
        self.state.send_replace(PipelineState::Complete(completed.clone()));
        Ok(completed)
    }

    /// Move to the next working state unless cancellation was requested.
    fn enter(&self, next: PipelineState) -> Result<(), IngestionError> {
        if self.cancel_requested.swap(false, Ordering::SeqCst) {
            if let Some(stage) = next.stage() {
                return Err(self.fail(stage, "cancelled".to_string()));
            }
        }
        self.state.send_replace(next);
        Ok(())
    }

    fn fail(&self, stage: PipelineStage, message: String) -> IngestionError {
        tracing::warn!(stage = %stage, error = %message, "Ingestion failed");
        self.state.send_replace(PipelineState::Error {
            stage,
            message: message.clone(),
        });
        IngestionError::for_stage(stage, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, MockExtractionGateway};
    use crate::models::{Confidence, ExtractedInvoiceDetails, FieldConfidence, WarrantyState};
    use tokio::sync::Notify;

    const PDF_BYTES: &[u8] = b"%PDF-1.4 test invoice";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn kettle() -> ExtractedInvoiceDetails {
        ExtractedInvoiceDetails {
            brand: "Breville".into(),
            product_name: "Electric Kettle".into(),
            purchase_date: Some(date(2024, 1, 1)),
            invoice_id: "INV-2201".into(),
            retailer: "Argos".into(),
            warranty_period: Some("12 months".into()),
            confidence_scores: FieldConfidence::uniform(Confidence::High),
        }
    }

    fn document() -> InvoiceDocument {
        InvoiceDocument::new(PDF_BYTES.to_vec(), "application/pdf", Some("kettle.pdf")).unwrap()
    }

    fn pipeline(gateway: Arc<MockExtractionGateway>) -> IngestionPipeline {
        IngestionPipeline::with_clock(gateway, Box::new(FixedClock(date(2024, 12, 20))))
    }

    #[tokio::test]
    async fn full_run_reaches_complete() {
        let gateway = Arc::new(MockExtractionGateway::new(kettle()));
        let pipeline = pipeline(gateway.clone());

        let done = pipeline.submit(document()).await.unwrap();
        assert_eq!(done.details.brand, "Breville");
        assert_eq!(done.status.state, WarrantyState::ExpiringSoon);
        assert_eq!(done.status.days_until_expiry, 12);
        assert_eq!(done.asset_ids, vec![format!("asset-1-{}", PDF_BYTES.len())]);
        assert!(matches!(pipeline.state(), PipelineState::Complete(_)));
        assert_eq!(gateway.upload_calls(), 1);
        assert_eq!(gateway.extract_calls(), 1);
    }

    #[tokio::test]
    async fn take_completed_returns_to_idle_once() {
        let pipeline = pipeline(Arc::new(MockExtractionGateway::new(kettle())));
        pipeline.submit(document()).await.unwrap();

        let taken = pipeline.take_completed().await;
        assert!(taken.is_some());
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.take_completed().await.is_none());
    }

    #[tokio::test]
    async fn upload_failure_stops_at_upload() {
        let gateway = Arc::new(MockExtractionGateway::new(kettle()).failing_upload("storage offline"));
        let pipeline = pipeline(gateway.clone());

        let err = pipeline.submit(document()).await.unwrap_err();
        assert_eq!(err, IngestionError::UploadFailed("storage offline".into()));
        assert_eq!(
            pipeline.state(),
            PipelineState::Error {
                stage: PipelineStage::Upload,
                message: "storage offline".into()
            }
        );
        assert_eq!(gateway.extract_calls(), 0);
    }

    #[tokio::test]
    async fn parse_failure_retry_restarts_from_upload() {
        let gateway = Arc::new(
            MockExtractionGateway::new(kettle())
                .failing_extract(GatewayError::Rejected("agent reported status 'error'".into()), 1),
        );
        let pipeline = pipeline(gateway.clone());

        let err = pipeline.submit(document()).await.unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Parse));
        assert!(pipeline.take_completed().await.is_none());
        assert_eq!(gateway.upload_calls(), 1);

        let done = pipeline.retry().await.unwrap();
        assert_eq!(done.details.product_name, "Electric Kettle");
        // Retry re-executes the upload stage; nothing is resumed
        assert_eq!(gateway.upload_calls(), 2);
        assert_eq!(gateway.extract_calls(), 2);
        assert_eq!(done.asset_ids, vec![format!("asset-2-{}", PDF_BYTES.len())]);
    }

    #[tokio::test]
    async fn classify_overflow_is_classify_error() {
        let mut details = kettle();
        details.purchase_date = Some(NaiveDate::MAX);
        let pipeline = pipeline(Arc::new(MockExtractionGateway::new(details)));

        let err = pipeline.submit(document()).await.unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Classify));
        assert!(matches!(
            pipeline.state(),
            PipelineState::Error { stage: PipelineStage::Classify, .. }
        ));
    }

    #[tokio::test]
    async fn missing_purchase_date_completes_as_unknown() {
        let mut details = kettle();
        details.purchase_date = None;
        let pipeline = pipeline(Arc::new(MockExtractionGateway::new(details)));

        let done = pipeline.submit(document()).await.unwrap();
        assert_eq!(done.status.state, WarrantyState::Unknown);
        assert!(done.status.alert_schedule.is_empty());
    }

    #[tokio::test]
    async fn intake_rejection_never_enters_pipeline() {
        let gateway = Arc::new(MockExtractionGateway::new(kettle()));
        let pipeline = pipeline(gateway.clone());
        let mut rx = pipeline.subscribe();

        let err = pipeline
            .submit_bytes(b"GIF89a".to_vec(), "image/gif", Some("photo.gif"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::IntakeRejected(_)));
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(gateway.upload_calls(), 0);
    }

    #[tokio::test]
    async fn second_submit_while_running_is_busy() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(MockExtractionGateway::new(kettle()).with_upload_gate(gate.clone()));
        let pipeline = Arc::new(pipeline(gateway.clone()));

        let first = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.submit(document()).await })
        };

        let mut rx = pipeline.subscribe();
        rx.wait_for(|s| matches!(s, PipelineState::Uploading)).await.unwrap();

        assert_eq!(pipeline.submit(document()).await.unwrap_err(), IngestionError::Busy);
        assert!(matches!(
            pipeline.reset().await.unwrap_err(),
            IngestionError::InvalidTransition { action: "reset", .. }
        ));

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(gateway.upload_calls(), 1);
    }

    #[tokio::test]
    async fn cancel_is_honored_at_next_stage_boundary() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(MockExtractionGateway::new(kettle()).with_upload_gate(gate.clone()));
        let pipeline = Arc::new(pipeline(gateway.clone()));

        let run = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.submit(document()).await })
        };
        let mut rx = pipeline.subscribe();
        rx.wait_for(|s| matches!(s, PipelineState::Uploading)).await.unwrap();

        assert!(pipeline.cancel());
        gate.notify_one();

        let err = run.await.unwrap().unwrap_err();
        assert_eq!(err, IngestionError::ParseFailed("cancelled".into()));
        assert_eq!(gateway.extract_calls(), 0);
    }

    /// Records the published state each time the pipeline calls out to
    /// the gateway or the clock.
    #[derive(Default)]
    struct StateLog {
        rx: std::sync::Mutex<Option<watch::Receiver<PipelineState>>>,
        seen: std::sync::Mutex<Vec<&'static str>>,
    }

    impl StateLog {
        fn attach(&self, rx: watch::Receiver<PipelineState>) {
            *self.rx.lock().unwrap() = Some(rx);
        }

        fn note(&self) {
            if let Some(rx) = self.rx.lock().unwrap().as_ref() {
                let name = rx.borrow().name();
                self.seen.lock().unwrap().push(name);
            }
        }

        fn seen(&self) -> Vec<&'static str> {
            self.seen.lock().unwrap().clone()
        }
    }

    struct LoggingGateway {
        inner: MockExtractionGateway,
        log: Arc<StateLog>,
    }

    #[async_trait::async_trait]
    impl ExtractionGateway for LoggingGateway {
        async fn upload(&self, document: &InvoiceDocument) -> Result<Vec<String>, GatewayError> {
            self.log.note();
            self.inner.upload(document).await
        }

        async fn extract(&self, asset_ids: &[String]) -> Result<ExtractedInvoiceDetails, GatewayError> {
            self.log.note();
            self.inner.extract(asset_ids).await
        }
    }

    struct LoggingClock {
        today: NaiveDate,
        log: Arc<StateLog>,
    }

    impl ReferenceClock for LoggingClock {
        fn today(&self) -> NaiveDate {
            self.log.note();
            self.today
        }
    }

    #[tokio::test]
    async fn observers_see_stage_progression() {
        let log = Arc::new(StateLog::default());
        let gateway = Arc::new(LoggingGateway {
            inner: MockExtractionGateway::new(kettle()),
            log: log.clone(),
        });
        let clock = LoggingClock {
            today: date(2024, 12, 20),
            log: log.clone(),
        };
        let pipeline = IngestionPipeline::with_clock(gateway, Box::new(clock));
        log.attach(pipeline.subscribe());
        let mut rx = pipeline.subscribe();

        pipeline.submit(document()).await.unwrap();
        assert_eq!(log.seen(), vec!["uploading", "parsing", "classifying"]);
        assert!(rx.has_changed().unwrap());
        assert!(matches!(*rx.borrow_and_update(), PipelineState::Complete(_)));
    }

    #[tokio::test]
    async fn take_completed_clears_document_before_idle() {
        let pipeline = Arc::new(pipeline(Arc::new(MockExtractionGateway::new(kettle()))));
        pipeline.submit(document()).await.unwrap();

        let held = pipeline.document.lock().await;
        let take = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.take_completed().await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        // No submit can start while the old document is still held
        assert!(matches!(pipeline.state(), PipelineState::Complete(_)));

        drop(held);
        assert!(take.await.unwrap().is_some());
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.document.lock().await.is_none());
    }

    #[tokio::test]
    async fn submit_after_reset_keeps_its_document() {
        let gateway = Arc::new(
            MockExtractionGateway::new(kettle())
                .failing_extract(GatewayError::Rejected("agent busy".into()), 2),
        );
        let pipeline = Arc::new(pipeline(gateway.clone()));
        pipeline.submit(document()).await.unwrap_err();

        let held = pipeline.document.lock().await;
        let reset = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.reset().await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(matches!(pipeline.state(), PipelineState::Error { .. }));
        assert_eq!(pipeline.submit(document()).await.unwrap_err(), IngestionError::Busy);

        drop(held);
        reset.await.unwrap().unwrap();

        // The next run fails at parse and can still be retried
        pipeline.submit(document()).await.unwrap_err();
        let done = pipeline.retry().await.unwrap();
        assert_eq!(done.details.brand, "Breville");
        assert_eq!(gateway.extract_calls(), 3);
    }

    #[tokio::test]
    async fn retry_and_reset_guards() {
        let pipeline = pipeline(Arc::new(MockExtractionGateway::new(kettle()).failing_upload("down")));

        assert!(matches!(
            pipeline.retry().await.unwrap_err(),
            IngestionError::InvalidTransition { action: "retry", state: "idle" }
        ));
        assert!(pipeline.reset().await.is_ok());
        assert!(!pipeline.cancel());

        pipeline.submit(document()).await.unwrap_err();
        pipeline.reset().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Idle);
        // Document discarded by reset
        assert!(pipeline.retry().await.is_err());
    }
}
