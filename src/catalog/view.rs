use chrono::NaiveDate;

use crate::models::{CatalogFilter, Product, WarrantyState};
use crate::warranty::classify;

/// Sorted, filtered projection of the catalog. Never mutates its input.
///
/// In snapshot mode the status stored at ingestion is used as-is. In live
/// mode each product is reclassified against `reference_date` first, so
/// `days_until_expiry` does not go stale as time passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogView {
    pub filter: CatalogFilter,
    reference_date: Option<NaiveDate>,
}

impl CatalogView {
    pub fn snapshot(filter: CatalogFilter) -> Self {
        Self {
            filter,
            reference_date: None,
        }
    }

    pub fn live(filter: CatalogFilter, reference_date: NaiveDate) -> Self {
        Self {
            filter,
            reference_date: Some(reference_date),
        }
    }

    /// Apply the filter, then order by severity (expired first), then by
    /// days until expiry. Ties keep catalog order.
    pub fn apply(&self, products: &[Product]) -> Vec<Product> {
        let mut visible: Vec<Product> = products
            .iter()
            .map(|p| self.refresh(p))
            .filter(|p| matches_filter(self.filter, p.warranty_status.state))
            .collect();

        // sort_by_key is stable
        visible.sort_by_key(|p| {
            (
                p.warranty_status.state.severity(),
                p.warranty_status.days_until_expiry,
            )
        });
        visible
    }

    fn refresh(&self, product: &Product) -> Product {
        let Some(today) = self.reference_date else {
            return product.clone();
        };

        let details = &product.invoice_details;
        match classify(details.purchase_date, details.warranty_period.as_deref(), today) {
            Ok(status) => Product {
                warranty_status: status,
                ..product.clone()
            },
            Err(e) => {
                tracing::warn!(product_id = %product.id, error = %e, "Reclassification failed, using stored status");
                product.clone()
            }
        }
    }
}

impl Default for CatalogView {
    fn default() -> Self {
        Self::snapshot(CatalogFilter::All)
    }
}

pub fn matches_filter(filter: CatalogFilter, state: WarrantyState) -> bool {
    match filter {
        CatalogFilter::All => true,
        CatalogFilter::ExpiringSoon => state == WarrantyState::ExpiringSoon,
        CatalogFilter::Expired => state == WarrantyState::Expired,
        CatalogFilter::Manual => state == WarrantyState::Unknown,
    }
}
