use actix_web::{
    body::to_bytes,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use donation_engine::{
    db_types::{Batch, Coordinator, Donation, PaymentMethod, Role},
    donation_objects::{AmountInput, DonationForm, ManualDonationRequest},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{LedgerDatabase, ProcessorOrder},
    ChannelApi,
    SqliteDatabase,
};
use dps_common::Paise;
use log::debug;

use super::mocks::MockProcessor;
use crate::{
    auth::{JwtClaims, TokenIssuer},
    config::AuthConfig,
    middleware::JwtMiddlewareFactory,
    server::json_config,
};

// DO NOT re-use these secrets anywhere.
pub const TEST_JWT_SECRET: &str = "endpoint-tests-only-5d0b1c9e4a7f2e83b6";
pub const TEST_WEBHOOK_SECRET: &str = "endpoint-tests-webhook-secret";

pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new(TEST_JWT_SECRET).expect("Test JWT secret is too short")
}

pub fn issue_token(claims: JwtClaims) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(claims, None).expect("Failed to sign token")
}

pub fn coordinator_token(coordinator_id: i64) -> String {
    issue_token(JwtClaims::new(coordinator_id, vec![Role::Coordinator]))
}

pub fn admin_token() -> String {
    issue_token(JwtClaims::new(1, vec![Role::Admin]).with_name("Root"))
}

/// Sends `req` to an app made up of the routes added by `configure`, behind the bearer-token middleware.
///
/// Errors raised by middleware are rendered into responses the same way the HTTP server does it.
pub async fn send_request<F>(req: TestRequest, auth_token: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let req = if auth_token.is_empty() {
        req
    } else {
        req.insert_header(("Authorization", format!("Bearer {auth_token}")))
    };
    let issuer = TokenIssuer::new(&get_auth_config());
    let app = App::new()
        .app_data(json_config())
        .service(web::scope("").wrap(JwtMiddlewareFactory::new(issuer)).configure(configure));
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.expect("Could not read error body");
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

/// A processor that accepts exactly one checkout order and gives it `order_id`.
pub fn order_processor(order_id: &'static str) -> MockProcessor {
    let mut processor = MockProcessor::new();
    processor.expect_key_id().return_const("rzp_test_key".to_string());
    processor.expect_create_order().times(1).returning(move |req| {
        Ok(ProcessorOrder { id: order_id.to_string(), amount: req.amount, currency: req.currency })
    });
    processor
}

/// A freshly migrated ledger with one batch and one coordinator.
pub struct TestLedger {
    pub db: SqliteDatabase,
    pub batch: Batch,
    pub coordinator: Coordinator,
}

impl TestLedger {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Could not open test database");
        let batch = db.create_batch("Batch 2024", "batch-2024").await.expect("Could not create batch");
        let coordinator =
            db.create_coordinator("Asha", Some("9876500000")).await.expect("Could not create coordinator");
        Self { db, batch, coordinator }
    }

    pub async fn batch_total(&self) -> Paise {
        self.db.fetch_batch(self.batch.id).await.expect("Could not fetch batch").expect("Batch is missing").total_amount
    }

    pub async fn donation(&self, donation_id: &str) -> Option<Donation> {
        self.db.fetch_donation(&donation_id.into()).await.expect("Could not fetch donation")
    }

    /// Creates a PENDING hosted-checkout donation of ₹500 against the batch, keyed by `order_id`.
    pub async fn pending_checkout(&self, order_id: &'static str) -> Donation {
        let api = ChannelApi::new(self.db.clone(), order_processor(order_id), EventProducers::default());
        let form = DonationForm::new(AmountInput::Number(500.0)).with_mobile("9876543210").with_batch(self.batch.id);
        let order = api.create_checkout_order(form, None).await.expect("Could not create checkout order");
        self.donation(order.donation_id.as_str()).await.expect("Donation was not recorded")
    }

    /// Records a cash donation against the batch, collected by the test coordinator.
    pub async fn record_cash(&self, rupees: i64) -> Donation {
        let api = ChannelApi::new(self.db.clone(), MockProcessor::new(), EventProducers::default());
        let form = DonationForm::new(AmountInput::Number(rupees as f64)).with_batch(self.batch.id);
        let request = ManualDonationRequest { form, payment_method: PaymentMethod::Cash, reference: None };
        api.record_manual_donation(request, Some(self.coordinator.id)).await.expect("Could not record donation")
    }
}
