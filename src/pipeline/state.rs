use serde::Serialize;

use crate::models::{ExtractedInvoiceDetails, WarrantyStatus};

/// The three failable stages of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Upload,
    Parse,
    Classify,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Parse => "parse",
            Self::Classify => "classify",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a successful run, waiting to be committed to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedIngestion {
    pub details: ExtractedInvoiceDetails,
    pub status: WarrantyStatus,
    pub asset_ids: Vec<String>,
}

/// Observable state of an ingestion pipeline.
///
/// ```text
/// Idle → Uploading → Parsing → Classifying → Complete
///           ↓           ↓           ↓
///        Error(upload) Error(parse) Error(classify)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Uploading,
    Parsing,
    Classifying,
    Complete(CompletedIngestion),
    Error { stage: PipelineStage, message: String },
}

impl PipelineState {
    /// A run is in flight (one of the three working states).
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Uploading | Self::Parsing | Self::Classifying)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error { .. })
    }

    /// Stage currently executing, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Uploading => Some(PipelineStage::Upload),
            Self::Parsing => Some(PipelineStage::Parse),
            Self::Classifying => Some(PipelineStage::Classify),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Parsing => "parsing",
            Self::Classifying => "classifying",
            Self::Complete(_) => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// Progress line shown while a run is active.
    pub fn progress_message(&self) -> Option<&'static str> {
        match self {
            Self::Uploading => Some("Uploading invoice..."),
            Self::Parsing => Some("Parsing invoice with AI..."),
            Self::Classifying => Some("Calculating warranty status..."),
            _ => None,
        }
    }
}

/// Errors returned by pipeline operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestionError {
    #[error("{0}")]
    IntakeRejected(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Parsing failed: {0}")]
    ParseFailed(String),

    #[error("Classification failed: {0}")]
    ClassifyFailed(String),

    #[error("A document is already being processed")]
    Busy,

    #[error("Cannot {action} while pipeline is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

impl IngestionError {
    pub fn for_stage(stage: PipelineStage, message: String) -> Self {
        match stage {
            PipelineStage::Upload => Self::UploadFailed(message),
            PipelineStage::Parse => Self::ParseFailed(message),
            PipelineStage::Classify => Self::ClassifyFailed(message),
        }
    }

    /// Stage the failure originated in. `None` for errors raised before a
    /// run starts.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::UploadFailed(_) => Some(PipelineStage::Upload),
            Self::ParseFailed(_) => Some(PipelineStage::Parse),
            Self::ClassifyFailed(_) => Some(PipelineStage::Classify),
            _ => None,
        }
    }
}
