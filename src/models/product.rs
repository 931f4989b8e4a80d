use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::invoice::{deserialize_lenient_date, ExtractedInvoiceDetails};

/// Time-based warranty classification.
///
/// Serialized as `ACTIVE | EXPIRING_SOON | EXPIRED | UNKNOWN`; the colour
/// names used by older records (`GREEN | YELLOW | RED | GREY`) are read as
/// aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarrantyState {
    #[serde(alias = "GREEN")]
    Active,
    #[serde(alias = "YELLOW")]
    ExpiringSoon,
    #[serde(alias = "RED")]
    Expired,
    #[serde(alias = "GREY", alias = "GRAY")]
    Unknown,
}

impl WarrantyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::ExpiringSoon => "EXPIRING_SOON",
            Self::Expired => "EXPIRED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Sort rank: most urgent first.
    pub fn severity(&self) -> u8 {
        match self {
            Self::Expired => 0,
            Self::ExpiringSoon => 1,
            Self::Active => 2,
            Self::Unknown => 3,
        }
    }

    pub fn color_code(&self) -> &'static str {
        match self {
            Self::Active => "GREEN",
            Self::ExpiringSoon => "YELLOW",
            Self::Expired => "RED",
            Self::Unknown => "GREY",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::ExpiringSoon => "Expiring Soon",
            Self::Expired => "Expired",
            Self::Unknown => "No Warranty",
        }
    }

    /// Claims are offered only while the warranty is about to lapse or
    /// already has.
    pub fn is_claim_eligible(&self) -> bool {
        matches!(self, Self::ExpiringSoon | Self::Expired)
    }
}

impl std::fmt::Display for WarrantyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time warranty classification for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarrantyStatus {
    #[serde(rename = "warranty_status")]
    pub state: WarrantyState,
    /// Negative once the warranty has expired. Zero for `Unknown`.
    pub days_until_expiry: i64,
    /// `None` only when the state is `Unknown`.
    #[serde(default, deserialize_with = "deserialize_lenient_date")]
    pub expiry_date: Option<NaiveDate>,
    /// Upcoming reminder dates, ascending.
    #[serde(default)]
    pub alert_schedule: Vec<NaiveDate>,
}

impl WarrantyStatus {
    /// Status for a product whose purchase date or warranty period is unknown.
    pub fn unknown() -> Self {
        Self {
            state: WarrantyState::Unknown,
            days_until_expiry: 0,
            expiry_date: None,
            alert_schedule: Vec::new(),
        }
    }

    /// Human-readable remaining time, e.g. "12 days remaining".
    pub fn remaining_label(&self) -> String {
        match self.state {
            WarrantyState::Unknown => "Warranty period unknown".to_string(),
            _ if self.days_until_expiry > 0 => {
                let unit = if self.days_until_expiry == 1 { "day" } else { "days" };
                format!("{} {unit} remaining", self.days_until_expiry)
            }
            _ if self.days_until_expiry == 0 => "Expires today".to_string(),
            _ => {
                let ago = self.days_until_expiry.unsigned_abs();
                let unit = if ago == 1 { "day" } else { "days" };
                format!("Expired {ago} {unit} ago")
            }
        }
    }
}

/// A tracked purchase. Created once when an ingestion run is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(deserialize_with = "deserialize_product_id")]
    pub id: Uuid,
    pub invoice_details: ExtractedInvoiceDetails,
    pub warranty_status: WarrantyStatus,
    /// Handles of the uploaded invoice document(s).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub asset_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Records saved before ids were UUIDs carry a millisecond timestamp
/// (`"1735210000000"`). Those map to a name-based UUID so the same record
/// gets the same id on every load.
pub fn legacy_product_id(raw: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.as_bytes())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredId {
    Text(String),
    Number(u64),
}

fn deserialize_product_id<'de, D>(deserializer: D) -> Result<Uuid, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match StoredId::deserialize(deserializer)? {
        StoredId::Text(text) => text.trim().to_string(),
        StoredId::Number(n) => n.to_string(),
    };
    if raw.is_empty() {
        return Err(serde::de::Error::custom("product id is empty"));
    }
    Ok(Uuid::parse_str(&raw).unwrap_or_else(|_| legacy_product_id(&raw)))
}
