use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::enums::Confidence;

/// Per-field confidence reported by the extraction service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfidence {
    #[serde(default)]
    pub brand: Confidence,
    #[serde(default)]
    pub product_name: Confidence,
    #[serde(default)]
    pub purchase_date: Confidence,
    #[serde(default)]
    pub invoice_id: Confidence,
    #[serde(default)]
    pub retailer: Confidence,
    #[serde(default)]
    pub warranty_period: Confidence,
}

impl FieldConfidence {
    /// Every field at the same level.
    pub fn uniform(level: Confidence) -> Self {
        Self {
            brand: level,
            product_name: level,
            purchase_date: level,
            invoice_id: level,
            retailer: level,
            warranty_period: level,
        }
    }

    fn entries(&self) -> [(&'static str, Confidence); 6] {
        [
            ("brand", self.brand),
            ("product_name", self.product_name),
            ("purchase_date", self.purchase_date),
            ("invoice_id", self.invoice_id),
            ("retailer", self.retailer),
            ("warranty_period", self.warranty_period),
        ]
    }
}

/// Structured invoice fields. Produced once by the extraction gateway and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedInvoiceDetails {
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub product_name: String,
    /// `None` when the date was missing or could not be read.
    #[serde(default, deserialize_with = "deserialize_lenient_date")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default)]
    pub invoice_id: String,
    #[serde(default)]
    pub retailer: String,
    /// Free-form duration as printed on the invoice, e.g. "12 months".
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub warranty_period: Option<String>,
    #[serde(default)]
    pub confidence_scores: FieldConfidence,
}

impl ExtractedInvoiceDetails {
    /// "Brand Product" as shown on catalog cards.
    pub fn display_name(&self) -> String {
        let brand = self.brand.trim();
        let name = self.product_name.trim();
        match (brand.is_empty(), name.is_empty()) {
            (false, false) => format!("{brand} {name}"),
            (false, true) => brand.to_string(),
            (true, false) => name.to_string(),
            (true, true) => "Unnamed product".to_string(),
        }
    }

    /// Fields the user should double-check before committing.
    pub fn low_confidence_fields(&self) -> Vec<&'static str> {
        self.confidence_scores
            .entries()
            .into_iter()
            .filter(|(_, level)| *level == Confidence::Low)
            .map(|(field, _)| field)
            .collect()
    }
}

/// Date formats seen on invoices, tried in order. Slash dates are read
/// month-first.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parse a purchase date as printed on an invoice. Accepts ISO timestamps
/// by keeping only their date part.
pub fn parse_purchase_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = match trimmed.find('T') {
        Some(10) => &trimmed[..10],
        _ => trimmed,
    };

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
}

/// Accepts a date string in any of [`DATE_FORMATS`], `null`, or garbage.
/// Unreadable values become `None` so the warranty is classified as unknown
/// instead of failing the whole extraction.
pub(crate) fn deserialize_lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_purchase_date))
}

fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
