//! Warranty Guardian CLI.
//!
//! The catalog lives in `~/WarrantyGuardian/catalog.db` (override with
//! WARRANTY_GUARDIAN_HOME). Ingestion and claim drafting call the agent
//! service configured by WARRANTY_AGENT_URL.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use warranty_guardian_lib::catalog::{CatalogView, ProductCatalog};
use warranty_guardian_lib::claim::{ClaimSession, ClaimSessionState};
use warranty_guardian_lib::config::{APP_NAME, APP_VERSION};
use warranty_guardian_lib::gateway::AgentClient;
use warranty_guardian_lib::init_tracing;
use warranty_guardian_lib::models::{CatalogFilter, Product};
use warranty_guardian_lib::pipeline::intake::InvoiceDocument;
use warranty_guardian_lib::pipeline::IngestionPipeline;
use warranty_guardian_lib::warranty::{due_reminders, ReminderPreferences};

#[derive(Parser)]
#[command(name = "warranty-guardian", version, about = "Track product warranties from purchase invoices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tracked products, most urgent first
    List {
        /// Filter: all, expiring_soon, expired, manual
        #[arg(default_value = "all")]
        filter: String,
        /// Show the status computed at ingestion instead of today's
        #[arg(long)]
        snapshot: bool,
    },
    /// Read an invoice (PDF, JPG or PNG) and add the product
    Ingest {
        /// Path to the invoice file
        file: PathBuf,
    },
    /// Draft a warranty claim email for a product
    Claim {
        /// Product id
        id: Uuid,
        /// What is wrong with the product
        issue: Vec<String>,
        /// Override the recipient and print the validated draft
        #[arg(long)]
        to: Option<String>,
    },
    /// Enter the warranty for a product whose invoice did not state one
    SetWarranty {
        /// Product id
        id: Uuid,
        /// Purchase date (YYYY-MM-DD)
        purchase_date: NaiveDate,
        /// Warranty period, e.g. "2 years"
        period: String,
    },
    /// Remove a product
    Remove {
        /// Product id
        id: Uuid,
    },
    /// Reminders due on a date (default: today)
    Reminders {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn print_product(product: &Product) {
    let status = &product.warranty_status;
    println!(
        "{}  {:<6} [{:<13}] {:<40} {}",
        product.id,
        status.state.color_code(),
        status.state.label(),
        product.invoice_details.display_name(),
        status.remaining_label()
    );
}

fn list(catalog: &ProductCatalog, filter: &str, snapshot: bool) -> anyhow::Result<()> {
    let filter: CatalogFilter = filter
        .parse()
        .with_context(|| format!("Unknown filter '{filter}'"))?;
    let view = if snapshot {
        CatalogView::snapshot(filter)
    } else {
        CatalogView::live(filter, today())
    };

    let products = view.apply(&catalog.list());
    if products.is_empty() {
        println!("No products yet. Upload your first invoice to get started.");
        return Ok(());
    }
    println!("{} ({})", APP_NAME, filter.label());
    for product in &products {
        print_product(product);
    }
    Ok(())
}

async fn ingest(catalog: &ProductCatalog, file: &Path) -> anyhow::Result<()> {
    let document = match InvoiceDocument::from_path(file) {
        Ok(document) => document,
        Err(reason) => bail!(reason),
    };

    let gateway = Arc::new(AgentClient::from_env()?);
    let pipeline = IngestionPipeline::new(gateway);

    let mut progress = pipeline.subscribe();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            if let Some(message) = progress.borrow_and_update().progress_message() {
                eprintln!("{message}");
            }
        }
    });

    let outcome = pipeline.submit(document).await;
    let completed = pipeline.take_completed().await;
    // Dropping the pipeline closes the channel and ends the reporter
    drop(pipeline);
    if let Err(e) = reporter.await {
        tracing::warn!(error = %e, "Progress reporter task failed");
    }

    outcome?;
    let Some(completed) = completed else {
        bail!("Ingestion finished without a result");
    };

    let low_confidence = completed.details.low_confidence_fields();
    let product = catalog.commit(completed)?;
    print_product(&product);
    if !low_confidence.is_empty() {
        println!("Please double-check: {}", low_confidence.join(", "));
    }
    Ok(())
}

async fn claim(
    catalog: &ProductCatalog,
    id: Uuid,
    issue: &str,
    recipient: Option<&str>,
) -> anyhow::Result<()> {
    let product = catalog.find(id)?;
    if !product.warranty_status.state.is_claim_eligible() {
        eprintln!(
            "Note: warranty is {}, claims are usually filed when it is expiring or expired",
            product.warranty_status.state.label()
        );
    }

    let gateway = Arc::new(AgentClient::from_env()?);
    let mut session = ClaimSession::open(&product, issue, gateway).await;
    if let ClaimSessionState::Failed(message) = session.state() {
        bail!("Failed to generate claim draft: {message}");
    }

    if let Some(recipient) = recipient {
        session.edit_recipient(recipient)?;
    }
    let draft = session.finalize()?;
    session.close();

    println!("To:      {}", draft.recipient_email);
    println!("Subject: {}", draft.subject_line);
    if !draft.attachments_required.is_empty() {
        println!("Attach:  {}", draft.attachments_required.join(", "));
    }
    println!();
    println!("{}", draft.email_body);
    Ok(())
}

fn reminders(catalog: &ProductCatalog, date: NaiveDate) {
    let due = due_reminders(&catalog.list(), date, &ReminderPreferences::default());
    if due.is_empty() {
        println!("No reminders due on {date}");
        return;
    }
    for reminder in due {
        println!(
            "{}  {} expires {} ({})",
            reminder.product_id, reminder.product, reminder.expiry_date, reminder.kind
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    tracing::debug!(version = APP_VERSION, "{APP_NAME} starting");

    let catalog = warranty_guardian_lib::open_catalog().context("Failed to open catalog")?;

    match cli.command {
        Commands::List { filter, snapshot } => list(&catalog, &filter, snapshot)?,
        Commands::Ingest { file } => ingest(&catalog, &file).await?,
        Commands::Claim { id, issue, to } => {
            claim(&catalog, id, &issue.join(" "), to.as_deref()).await?
        }
        Commands::SetWarranty {
            id,
            purchase_date,
            period,
        } => {
            let product = catalog.record_manual_warranty(id, purchase_date, &period, today())?;
            print_product(&product);
        }
        Commands::Remove { id } => {
            let product = catalog.remove(id)?;
            println!("Removed {}", product.invoice_details.display_name());
        }
        Commands::Reminders { date } => reminders(&catalog, date.unwrap_or_else(today)),
    }

    Ok(())
}
