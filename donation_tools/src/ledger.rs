use anyhow::{Context, Result};
use chrono::Duration;
use donation_engine::{
    db_types::{PaymentStatus, QR_PLACEHOLDER_PREFIX},
    donation_objects::DonationQueryFilter,
    events::EventProducers,
    ReconciliationApi,
    SqliteDatabase,
};
use log::*;

use crate::formatting::{format_audit, format_donations, format_flags};

async fn open_ledger(url: &str) -> Result<ReconciliationApi<SqliteDatabase>> {
    debug!("🗃️ Opening ledger at {url}");
    let db = SqliteDatabase::new_with_url(url, 1).await.with_context(|| format!("Could not open the ledger at {url}"))?;
    Ok(ReconciliationApi::new(db, EventProducers::default()))
}

pub async fn audit(url: &str) -> Result<()> {
    let api = open_ledger(url).await?;
    let audit = api.audit_batch_totals().await?;
    let drifted = audit.iter().filter(|a| !a.is_consistent()).count();
    println!("{}", format_audit(&audit));
    if drifted == 0 {
        println!("All {} batch totals agree with the ledger.", audit.len());
    } else {
        println!("{drifted} batch total(s) have drifted. Run `donation_tools repair` to fix them.");
    }
    Ok(())
}

pub async fn repair(url: &str, batch_id: Option<i64>, all: bool) -> Result<()> {
    let api = open_ledger(url).await?;
    let repaired = match (batch_id, all) {
        (_, true) => api.repair_all().await?,
        (Some(id), false) => vec![api.repair_batch_total(id).await?],
        (None, false) => anyhow::bail!("Specify a batch with --batch, or use --all"),
    };
    println!("{}", format_audit(&repaired));
    println!("{} batch total(s) reset to the ledger value.", repaired.len());
    Ok(())
}

/// QR donations whose processor call failed keep their placeholder reference forever. These can never be confirmed
/// automatically.
pub async fn orphans(url: &str, older_than_hours: Option<i64>) -> Result<()> {
    let api = open_ledger(url).await?;
    let donations = match older_than_hours {
        Some(hours) => api.stale_pending(Duration::hours(hours)).await?,
        None => {
            let filter = DonationQueryFilter::default().with_status(PaymentStatus::Pending);
            let mut pending = api.search_donations(filter).await?;
            pending.retain(|d| d.transaction_id.starts_with(QR_PLACEHOLDER_PREFIX));
            pending
        },
    };
    println!("{}", format_donations(&donations));
    Ok(())
}

pub async fn flags(url: &str, include_resolved: bool) -> Result<()> {
    let api = open_ledger(url).await?;
    let flags = api.reconciliation_flags(include_resolved).await?;
    println!("{}", format_flags(&flags));
    Ok(())
}
