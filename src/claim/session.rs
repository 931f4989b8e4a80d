use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::request::ClaimRequest;
use super::ClaimError;
use crate::gateway::ClaimDraftGateway;
use crate::models::{ClaimDraft, Product};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

const INVOICE_ATTACHMENT: &str = "Original invoice";

/// Where an open claim currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimSessionState {
    Generating,
    Ready(ClaimDraft),
    Failed(String),
    Closed,
}

impl ClaimSessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
            Self::Closed => "closed",
        }
    }
}

/// One claim being drafted for one product.
///
/// Opening a session issues exactly one drafting request. A failure is
/// reported as `Failed` and is never retried unless the user calls
/// [`regenerate`](Self::regenerate). The draft belongs to the session and
/// is dropped on [`close`](Self::close).
pub struct ClaimSession {
    request: ClaimRequest,
    gateway: Arc<dyn ClaimDraftGateway>,
    state: ClaimSessionState,
}

impl ClaimSession {
    pub async fn open(
        product: &Product,
        issue_description: &str,
        gateway: Arc<dyn ClaimDraftGateway>,
    ) -> Self {
        let mut session = Self {
            request: ClaimRequest::from_product(product, issue_description),
            gateway,
            state: ClaimSessionState::Generating,
        };
        tracing::info!(product_id = %product.id, "Claim session opened");
        session.generate().await;
        session
    }

    pub fn state(&self) -> &ClaimSessionState {
        &self.state
    }

    pub fn request(&self) -> &ClaimRequest {
        &self.request
    }

    pub fn draft(&self) -> Option<&ClaimDraft> {
        match &self.state {
            ClaimSessionState::Ready(draft) => Some(draft),
            _ => None,
        }
    }

    /// Ask for a fresh draft, discarding any edits.
    pub async fn regenerate(&mut self) -> Result<&ClaimDraft, ClaimError> {
        if matches!(self.state, ClaimSessionState::Closed | ClaimSessionState::Generating) {
            return Err(self.invalid("regenerate"));
        }
        self.generate().await;
        match &self.state {
            ClaimSessionState::Ready(draft) => Ok(draft),
            ClaimSessionState::Failed(message) => {
                Err(ClaimError::DraftGenerationFailed(message.clone()))
            }
            other => Err(ClaimError::InvalidTransition {
                action: "regenerate",
                state: other.name(),
            }),
        }
    }

    pub fn edit_recipient(&mut self, recipient: &str) -> Result<(), ClaimError> {
        self.draft_mut("edit recipient")?.recipient_email = recipient.to_string();
        Ok(())
    }

    pub fn edit_subject(&mut self, subject: &str) -> Result<(), ClaimError> {
        self.draft_mut("edit subject")?.subject_line = subject.to_string();
        Ok(())
    }

    pub fn edit_body(&mut self, body: &str) -> Result<(), ClaimError> {
        self.draft_mut("edit body")?.email_body = body.to_string();
        Ok(())
    }

    /// Validate the edited draft and hand back a copy ready for sending
    /// or saving.
    pub fn finalize(&self) -> Result<ClaimDraft, ClaimError> {
        let ClaimSessionState::Ready(draft) = &self.state else {
            return Err(self.invalid("finalize"));
        };

        let recipient = draft.recipient_email.trim();
        if !EMAIL_PATTERN.is_match(recipient) {
            return Err(ClaimError::InvalidDraft(format!(
                "\"{recipient}\" is not a valid email address"
            )));
        }
        if draft.subject_line.trim().is_empty() {
            return Err(ClaimError::InvalidDraft("subject is empty".into()));
        }
        if draft.email_body.trim().is_empty() {
            return Err(ClaimError::InvalidDraft("message body is empty".into()));
        }

        let mut finalized = draft.clone();
        finalized.recipient_email = recipient.to_string();
        finalized.subject_line = draft.subject_line.trim().to_string();
        Ok(finalized)
    }

    /// End the session and discard the draft.
    pub fn close(&mut self) {
        self.state = ClaimSessionState::Closed;
    }

    async fn generate(&mut self) {
        self.state = ClaimSessionState::Generating;
        self.state = match self.gateway.draft(&self.request).await {
            Ok(draft) => ClaimSessionState::Ready(self.seed(draft)),
            Err(e) => {
                tracing::warn!(error = %e, "Claim draft generation failed");
                ClaimSessionState::Failed(e.to_string())
            }
        };
    }

    /// Fill echo fields the drafting service left out.
    fn seed(&self, mut draft: ClaimDraft) -> ClaimDraft {
        let echo = &mut draft.product_details;
        if echo.brand.is_empty() {
            echo.brand = self.request.brand.clone();
        }
        if echo.product_name.is_empty() {
            echo.product_name = self.request.product_name.clone();
        }
        if echo.invoice_id.is_empty() {
            echo.invoice_id = self.request.invoice_id.clone();
        }
        if echo.issue_description.is_empty() {
            echo.issue_description = self.request.issue_description.clone();
        }
        if draft.attachments_required.is_empty() {
            draft.attachments_required.push(INVOICE_ATTACHMENT.to_string());
        }
        draft
    }

    fn draft_mut(&mut self, action: &'static str) -> Result<&mut ClaimDraft, ClaimError> {
        let state = self.state.name();
        match &mut self.state {
            ClaimSessionState::Ready(draft) => Ok(draft),
            _ => Err(ClaimError::InvalidTransition { action, state }),
        }
    }

    fn invalid(&self, action: &'static str) -> ClaimError {
        ClaimError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}
