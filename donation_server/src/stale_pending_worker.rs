use chrono::Duration;
use donation_engine::{db_types::Donation, events::EventProducers, ReconciliationApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

const STALE_PENDING_CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// Starts the stale-pending reporter. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Abandoned donations are only ever reported. Nothing here changes their status.
pub fn start_stale_pending_worker(db: SqliteDatabase, older_than: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(STALE_PENDING_CHECK_INTERVAL);
        let api = ReconciliationApi::new(db, EventProducers::default());
        info!("🕰️ Stale pending donation reporter started");
        loop {
            timer.tick().await;
            debug!("🕰️ Looking for donations that have been pending for more than {} hrs", older_than.num_hours());
            match api.stale_pending(older_than).await {
                Ok(donations) if donations.is_empty() => {
                    debug!("🕰️ No stale pending donations");
                },
                Ok(donations) => {
                    warn!(
                        "🕰️ {} donation(s) have been pending for more than {} hrs: {}",
                        donations.len(),
                        older_than.num_hours(),
                        donation_list(&donations)
                    );
                },
                Err(e) => {
                    error!("🕰️ Error running the stale pending donation report: {e}");
                },
            }
        }
    })
}

fn donation_list(donations: &[Donation]) -> String {
    donations
        .iter()
        .map(|d| format!("[{}] {} {} ({})", d.donation_id, d.transaction_id, d.amount, d.created_at))
        .collect::<Vec<String>>()
        .join(", ")
}
