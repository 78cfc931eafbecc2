use std::{path::Path, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use donation_engine::{
    events::EventProducers,
    ChannelApi,
    ConfirmationApi,
    ReconciliationApi,
    SqliteDatabase,
    ViewsApi,
};
use log::*;

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    integrations::razorpay::{create_ledger_event_handlers, RazorpayProcessor},
    middleware::{HmacMiddlewareFactory, JwtMiddlewareFactory, RAZORPAY_SIGNATURE_HEADER},
    routes::{
        health,
        AuditBatchesRoute,
        BatchLeaderboardRoute,
        BatchSummaryRoute,
        CreateCheckoutRoute,
        CreateQrRoute,
        DeleteDonationRoute,
        DistrictTotalsRoute,
        DonationStatusRoute,
        DonorLeaderboardRoute,
        EditDonationRoute,
        MyStatsRoute,
        OverrideStatusRoute,
        PlaceLeaderboardRoute,
        RazorpayWebhookRoute,
        ReconciliationFlagsRoute,
        RecordDonationRoute,
        RepairBatchRoute,
        SearchDonationsRoute,
        SectionTotalsRoute,
        UnitLeaderboardRoute,
    },
    stale_pending_worker::start_stale_pending_worker,
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    ensure_database_directory(&config.database_url)?;
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let processor =
        RazorpayProcessor::new(config.razorpay.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_ledger_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    // The worker is only dropped when the server exits
    let _worker = start_stale_pending_worker(db.clone(), config.stale_pending_age);
    let srv = create_server_instance(config, db, processor, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    processor: RazorpayProcessor,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let channel_api = ChannelApi::new(db.clone(), processor.clone(), producers.clone())
            .with_currency(config.currency.as_str());
        let confirmation_api = ConfirmationApi::new(db.clone(), processor.clone(), producers.clone());
        let reconciliation_api = ReconciliationApi::new(db.clone(), producers.clone());
        let views_api = ViewsApi::new(db.clone());
        let issuer = TokenIssuer::new(&config.auth);
        let api_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(issuer))
            .service(CreateCheckoutRoute::<SqliteDatabase, RazorpayProcessor>::new())
            .service(CreateQrRoute::<SqliteDatabase, RazorpayProcessor>::new())
            .service(DonationStatusRoute::<SqliteDatabase, RazorpayProcessor>::new())
            .service(RecordDonationRoute::<SqliteDatabase, RazorpayProcessor>::new())
            .service(BatchSummaryRoute::<SqliteDatabase>::new())
            .service(BatchLeaderboardRoute::<SqliteDatabase>::new())
            .service(DonorLeaderboardRoute::<SqliteDatabase>::new())
            .service(UnitLeaderboardRoute::<SqliteDatabase>::new())
            .service(PlaceLeaderboardRoute::<SqliteDatabase>::new())
            .service(DistrictTotalsRoute::<SqliteDatabase>::new())
            .service(SectionTotalsRoute::<SqliteDatabase>::new())
            .service(MyStatsRoute::<SqliteDatabase>::new())
            .service(OverrideStatusRoute::<SqliteDatabase>::new())
            .service(EditDonationRoute::<SqliteDatabase>::new())
            .service(DeleteDonationRoute::<SqliteDatabase>::new())
            .service(SearchDonationsRoute::<SqliteDatabase>::new())
            .service(AuditBatchesRoute::<SqliteDatabase>::new())
            .service(RepairBatchRoute::<SqliteDatabase>::new())
            .service(ReconciliationFlagsRoute::<SqliteDatabase>::new());
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                RAZORPAY_SIGNATURE_HEADER,
                config.razorpay.webhook_secret.clone(),
                config.hmac_checks,
            ))
            .service(RazorpayWebhookRoute::<SqliteDatabase, RazorpayProcessor>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("dps::access_log"))
            .app_data(json_config())
            .app_data(web::Data::new(channel_api))
            .app_data(web::Data::new(confirmation_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(views_api))
            .service(health)
            .service(api_scope)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Malformed JSON bodies are reported with the same `{"error": ...}` shape as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!("💻️ Rejecting request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

/// SQLite creates the database file, but not the directory it lives in.
fn ensure_database_directory(url: &str) -> Result<(), ServerError> {
    let Some(path) = url.strip_prefix("sqlite://").map(|p| p.split('?').next().unwrap_or(p)) else {
        return Ok(());
    };
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            info!("🗃️ Creating database directory {}", dir.display());
            std::fs::create_dir_all(dir)?;
            Ok(())
        },
        _ => Ok(()),
    }
}
