use std::collections::HashMap;

use cucumber::World;
use donation_engine::{
    db_types::{Batch, Donation, DonationId},
    donation_objects::WebhookOutcome,
    events::EventProducers,
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    ChannelApi,
    ChannelError,
    ConfirmationApi,
    LedgerDatabase,
    ReconciliationApi,
    SqliteDatabase,
};
use log::*;

use crate::support::StubProcessor;

#[derive(Default, Debug, World)]
pub struct DonationWorld {
    pub system: Option<DonationSystem>,
}

#[derive(Debug)]
pub struct DonationSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub processor: StubProcessor,
    pub channel: ChannelApi<SqliteDatabase, StubProcessor>,
    pub confirmation: ConfirmationApi<SqliteDatabase, StubProcessor>,
    pub reconciliation: ReconciliationApi<SqliteDatabase>,
    pub batches: HashMap<String, i64>,
    pub donations: HashMap<String, DonationId>,
    pub last_outcome: Option<WebhookOutcome>,
    pub last_status: Option<String>,
    pub last_channel_error: Option<ChannelError>,
}

impl DonationSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        create_database(&url).await;
        run_migrations(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let processor = StubProcessor::default();
        let producers = EventProducers::default();
        Self {
            db_path: url,
            channel: ChannelApi::new(db.clone(), processor.clone(), producers.clone()),
            confirmation: ConfirmationApi::new(db.clone(), processor.clone(), producers.clone()),
            reconciliation: ReconciliationApi::new(db.clone(), producers),
            processor,
            db,
            batches: HashMap::new(),
            donations: HashMap::new(),
            last_outcome: None,
            last_status: None,
            last_channel_error: None,
        }
    }
}

impl DonationWorld {
    pub fn system(&self) -> &DonationSystem {
        self.system.as_ref().expect("System not initialised")
    }

    pub fn system_mut(&mut self) -> &mut DonationSystem {
        self.system.as_mut().expect("System not initialised")
    }

    pub fn batch_id(&self, name: &str) -> i64 {
        *self.system().batches.get(name).unwrap_or_else(|| panic!("Unknown batch {name}"))
    }

    pub fn donation_id(&self, alias: &str) -> DonationId {
        self.system().donations.get(alias).cloned().unwrap_or_else(|| panic!("Unknown donation {alias}"))
    }

    pub async fn donation(&self, alias: &str) -> Donation {
        let id = self.donation_id(alias);
        self.system().db.fetch_donation(&id).await.expect("Error fetching donation").expect("Donation does not exist")
    }

    pub async fn batch(&self, name: &str) -> Batch {
        let id = self.batch_id(name);
        self.system().db.fetch_batch(id).await.expect("Error fetching batch").expect("Batch does not exist")
    }
}
