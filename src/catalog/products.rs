use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::store::CatalogStore;
use super::CatalogError;
use crate::config::{CATALOG_BACKUP_KEY, CATALOG_STORAGE_KEY};
use crate::models::{
    Confidence, ExtractedInvoiceDetails, Product, WarrantyState, WarrantyStatus,
};
use crate::pipeline::CompletedIngestion;
use crate::warranty::classify;

/// Owner of every product record.
///
/// Loaded once from its store; every mutation writes the whole list back
/// under [`CATALOG_STORAGE_KEY`] before it becomes visible to readers. The
/// write lock is held across persist + update, so a `list` issued after a
/// successful `add` always sees it.
pub struct ProductCatalog {
    store: Box<dyn CatalogStore>,
    products: RwLock<Vec<Product>>,
}

impl ProductCatalog {
    /// Load the catalog. Opening never fails: records that cannot be read
    /// are skipped with a warning, and an unreadable stored value starts an
    /// empty catalog. In both cases the raw value is first copied under
    /// [`CATALOG_BACKUP_KEY`] so the next save does not destroy it.
    pub fn open(store: Box<dyn CatalogStore>) -> Self {
        let products = match store.load(CATALOG_STORAGE_KEY) {
            Ok(Some(raw)) => {
                let (decoded, skipped) = decode_products(&raw);
                let total = decoded.len();
                let products = dedupe_ids(decoded);
                if skipped > 0 || products.len() != total {
                    back_up_unreadable(&*store, &raw);
                }
                products
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored catalog, starting empty");
                Vec::new()
            }
        };

        tracing::info!(products = products.len(), "Catalog loaded");
        Self {
            store,
            products: RwLock::new(products),
        }
    }

    /// Append a new product with a fresh identity.
    pub fn add(
        &self,
        details: ExtractedInvoiceDetails,
        status: WarrantyStatus,
        asset_ids: Vec<String>,
    ) -> Result<Product, CatalogError> {
        validate_details(&details)?;

        let mut products = self.write();
        let mut id = Uuid::new_v4();
        while products.iter().any(|p| p.id == id) {
            id = Uuid::new_v4();
        }

        let product = Product {
            id,
            invoice_details: details,
            warranty_status: status,
            asset_ids,
            created_at: Utc::now(),
        };

        let mut next = products.clone();
        next.push(product.clone());
        self.persist(&next)?;
        *products = next;

        tracing::info!(
            product_id = %product.id,
            status = %product.warranty_status.state,
            "Product added to catalog"
        );
        Ok(product)
    }

    /// Commit a finished ingestion run.
    pub fn commit(&self, completed: CompletedIngestion) -> Result<Product, CatalogError> {
        self.add(completed.details, completed.status, completed.asset_ids)
    }

    /// Snapshot of all products in insertion order.
    pub fn list(&self) -> Vec<Product> {
        self.read().clone()
    }

    pub fn find(&self, id: Uuid) -> Result<Product, CatalogError> {
        self.read()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Delete a product on explicit user request.
    pub fn remove(&self, id: Uuid) -> Result<Product, CatalogError> {
        let mut products = self.write();
        let index = products
            .iter()
            .position(|p| p.id == id)
            .ok_or(CatalogError::NotFound(id))?;

        let mut next = products.clone();
        let removed = next.remove(index);
        self.persist(&next)?;
        *products = next;

        tracing::info!(product_id = %id, "Product removed from catalog");
        Ok(removed)
    }

    /// Supply the purchase date and warranty period of a product whose
    /// warranty could not be determined (`Unknown`), and classify it.
    /// Any other product is rejected with `NotEditable`.
    pub fn record_manual_warranty(
        &self,
        id: Uuid,
        purchase_date: NaiveDate,
        warranty_period: &str,
        reference_date: NaiveDate,
    ) -> Result<Product, CatalogError> {
        let mut products = self.write();
        let index = products
            .iter()
            .position(|p| p.id == id)
            .ok_or(CatalogError::NotFound(id))?;

        if products[index].warranty_status.state != WarrantyState::Unknown {
            return Err(CatalogError::NotEditable(id));
        }

        let status = classify(Some(purchase_date), Some(warranty_period), reference_date)
            .map_err(|e| CatalogError::InvalidRecord(e.to_string()))?;
        if status.state == WarrantyState::Unknown {
            return Err(CatalogError::InvalidRecord(format!(
                "warranty period \"{warranty_period}\" not recognised"
            )));
        }

        let mut next = products.clone();
        let product = &mut next[index];
        product.invoice_details.purchase_date = Some(purchase_date);
        product.invoice_details.warranty_period = Some(warranty_period.trim().to_string());
        product.invoice_details.confidence_scores.purchase_date = Confidence::High;
        product.invoice_details.confidence_scores.warranty_period = Confidence::High;
        product.warranty_status = status;
        let updated = product.clone();

        self.persist(&next)?;
        *products = next;

        tracing::info!(
            product_id = %id,
            status = %updated.warranty_status.state,
            "Manual warranty recorded"
        );
        Ok(updated)
    }

    fn persist(&self, products: &[Product]) -> Result<(), CatalogError> {
        let json = serde_json::to_string(products)?;
        self.store.save(CATALOG_STORAGE_KEY, &json).map_err(|e| {
            tracing::error!(error = %e, "Failed to persist catalog");
            CatalogError::from(e)
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Product>> {
        self.products.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Product>> {
        self.products.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A product needs at least a brand or a product name to be displayable.
fn validate_details(details: &ExtractedInvoiceDetails) -> Result<(), CatalogError> {
    if details.brand.trim().is_empty() && details.product_name.trim().is_empty() {
        return Err(CatalogError::InvalidRecord(
            "brand or product name is required".into(),
        ));
    }
    Ok(())
}

/// Decode a stored product list record by record. Returns the readable
/// products and how many records were dropped (a value that is not a JSON
/// array counts as one).
fn decode_products(raw: &str) -> (Vec<Product>, usize) {
    let records = match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "Stored catalog is corrupt, starting empty");
            return (Vec::new(), 1);
        }
    };

    let total = records.len();
    let products: Vec<Product> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value::<Product>(record) {
            Ok(product) => Some(product),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping unreadable product record");
                None
            }
        })
        .collect();
    let skipped = total - products.len();
    (products, skipped)
}

fn back_up_unreadable(store: &dyn CatalogStore, raw: &str) {
    match store.save(CATALOG_BACKUP_KEY, raw) {
        Ok(()) => tracing::warn!(key = CATALOG_BACKUP_KEY, "Stored catalog backed up"),
        Err(e) => tracing::error!(error = %e, "Failed to back up stored catalog"),
    }
}

/// Keep the first occurrence of each id.
fn dedupe_ids(products: Vec<Product>) -> Vec<Product> {
    let mut seen = HashSet::new();
    let total = products.len();
    let unique: Vec<Product> = products.into_iter().filter(|p| seen.insert(p.id)).collect();
    if unique.len() != total {
        tracing::warn!(dropped = total - unique.len(), "Stored catalog had duplicate ids");
    }
    unique
}
