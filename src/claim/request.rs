use chrono::NaiveDate;
use serde::Serialize;

use crate::models::Product;

const DEFAULT_ISSUE: &str = "The product needs warranty service.";

/// Everything the drafting capability gets to see about a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimRequest {
    pub brand: String,
    pub product_name: String,
    pub purchase_date: Option<NaiveDate>,
    pub invoice_id: String,
    pub retailer: String,
    pub issue_description: String,
}

impl ClaimRequest {
    /// Build a request from a catalog product. A blank issue falls back to
    /// a generic service request.
    pub fn from_product(product: &Product, issue_description: &str) -> Self {
        let details = &product.invoice_details;
        let issue = issue_description.trim();
        Self {
            brand: details.brand.trim().to_string(),
            product_name: details.product_name.trim().to_string(),
            purchase_date: details.purchase_date,
            invoice_id: details.invoice_id.trim().to_string(),
            retailer: details.retailer.trim().to_string(),
            issue_description: if issue.is_empty() {
                DEFAULT_ISSUE.to_string()
            } else {
                issue.to_string()
            },
        }
    }

    /// Natural-language instruction sent to the drafting agent.
    pub fn to_prompt(&self) -> String {
        let purchased = self
            .purchase_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "an unknown date".to_string());
        let invoice = or_unknown(&self.invoice_id);
        let retailer = or_unknown(&self.retailer);

        format!(
            "Draft a warranty claim email for a {} {} purchased on {purchased} \
             with invoice ID {invoice} from {retailer}. Issue: {}",
            self.brand, self.product_name, self.issue_description
        )
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}
