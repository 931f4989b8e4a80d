use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Warranty Guardian";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest invoice accepted at intake (10 MiB, inclusive).
pub const MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

/// A warranty with this many days left (or fewer) is "expiring soon".
pub const EXPIRING_SOON_WINDOW_DAYS: i64 = 30;

/// Key under which the serialized product list is stored.
pub const CATALOG_STORAGE_KEY: &str = "warranty_products";

/// Copy of a stored product list that could not be fully read, kept so
/// the next save does not destroy it.
pub const CATALOG_BACKUP_KEY: &str = "warranty_products.unreadable";

const DEFAULT_AGENT_URL: &str = "http://localhost:8787";
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 120;

/// Get the application data directory.
/// `~/WarrantyGuardian/` unless `WARRANTY_GUARDIAN_HOME` points elsewhere.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WARRANTY_GUARDIAN_HOME") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("WarrantyGuardian")
}

/// SQLite file backing the product catalog.
pub fn catalog_db_path() -> PathBuf {
    app_data_dir().join("catalog.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,warranty_guardian_lib=debug,reqwest=warn,hyper=warn"
}

/// Connection settings for the remote agent service that performs
/// invoice extraction and claim drafting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub invoice_agent_id: String,
    pub claim_agent_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AGENT_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_AGENT_TIMEOUT_SECS),
            invoice_agent_id: "invoice-parsing".to_string(),
            claim_agent_id: "claim-drafting".to_string(),
        }
    }
}

impl AgentConfig {
    /// Read overrides from `WARRANTY_AGENT_*` environment variables.
    /// Unset or malformed values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout = match non_empty("WARRANTY_AGENT_TIMEOUT_SECS").map(|v| v.trim().parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
            Some(_) => {
                tracing::warn!("Ignoring invalid WARRANTY_AGENT_TIMEOUT_SECS");
                defaults.timeout
            }
            None => defaults.timeout,
        };

        Self {
            base_url: non_empty("WARRANTY_AGENT_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout,
            invoice_agent_id: non_empty("WARRANTY_INVOICE_AGENT_ID")
                .unwrap_or(defaults.invoice_agent_id),
            claim_agent_id: non_empty("WARRANTY_CLAIM_AGENT_ID")
                .unwrap_or(defaults.claim_agent_id),
        }
    }
}
