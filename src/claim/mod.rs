//! Claim drafting: turns a catalog product into an editable claim email via
//! the drafting gateway.

pub mod request;
pub mod session;

pub use request::ClaimRequest;
pub use session::{ClaimSession, ClaimSessionState};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("Draft generation failed: {0}")]
    DraftGenerationFailed(String),

    #[error("Invalid claim draft: {0}")]
    InvalidDraft(String),

    #[error("Cannot {action} while claim is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}
