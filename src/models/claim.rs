use serde::{Deserialize, Serialize};

/// Product summary echoed back inside a claim draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProductDetails {
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub invoice_id: String,
    #[serde(default)]
    pub issue_description: String,
}

/// Proposed warranty-claim email. Editable until the claim session closes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDraft {
    #[serde(default)]
    pub recipient_email: String,
    #[serde(default)]
    pub subject_line: String,
    #[serde(default)]
    pub email_body: String,
    #[serde(default)]
    pub attachments_required: Vec<String>,
    #[serde(default)]
    pub product_details: ClaimProductDetails,
}
