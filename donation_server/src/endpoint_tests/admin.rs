use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use donation_engine::{
    db_types::{Donation, PaymentStatus},
    events::EventProducers,
    traits::{BatchAudit, DonationChange},
    ReconciliationApi,
    SqliteDatabase,
};
use dps_common::Paise;
use serde_json::{json, Value};

use super::helpers::{admin_token, coordinator_token, send_request, TestLedger};
use crate::routes::{
    AuditBatchesRoute,
    DeleteDonationRoute,
    EditDonationRoute,
    OverrideStatusRoute,
    ReconciliationFlagsRoute,
    RepairBatchRoute,
    SearchDonationsRoute,
};

fn configure(ledger: &TestLedger) -> impl FnOnce(&mut ServiceConfig) {
    let api = ReconciliationApi::new(ledger.db.clone(), EventProducers::default());
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(api))
            .service(OverrideStatusRoute::<SqliteDatabase>::new())
            .service(EditDonationRoute::<SqliteDatabase>::new())
            .service(DeleteDonationRoute::<SqliteDatabase>::new())
            .service(SearchDonationsRoute::<SqliteDatabase>::new())
            .service(AuditBatchesRoute::<SqliteDatabase>::new())
            .service(RepairBatchRoute::<SqliteDatabase>::new())
            .service(ReconciliationFlagsRoute::<SqliteDatabase>::new());
    }
}

fn set_status(donation: &Donation, status: &str) -> TestRequest {
    TestRequest::patch()
        .uri(&format!("/admin/donations/{}/status", donation.donation_id))
        .set_json(json!({ "status": status }))
}

#[actix_web::test]
async fn admin_routes_need_a_token() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let (status, body) = send_request(TestRequest::get().uri("/admin/donations"), "", configure(&ledger)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No bearer token"), "{body}");
}

#[actix_web::test]
async fn coordinators_cannot_use_admin_routes() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let donation = ledger.record_cash(1000).await;
    let token = coordinator_token(ledger.coordinator.id);
    let (status, body) = send_request(set_status(&donation, "FAILED"), &token, configure(&ledger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Insufficient permissions"), "{body}");
    assert_eq!(ledger.batch_total().await, Paise::from(100_000));
}

#[actix_web::test]
async fn status_overrides_move_the_batch_total() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let donation = ledger.record_cash(1000).await;
    assert_eq!(ledger.batch_total().await, Paise::from(100_000));
    let token = admin_token();

    let (status, body) = send_request(set_status(&donation, "FAILED"), &token, configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let change: DonationChange = serde_json::from_str(&body).unwrap();
    assert_eq!(change.previous.map(|d| d.payment_status), Some(PaymentStatus::Success));
    assert_eq!(change.current.map(|d| d.payment_status), Some(PaymentStatus::Failed));
    assert_eq!(ledger.batch_total().await, Paise::from(0));

    let (status, _) = send_request(set_status(&donation, "SUCCESS"), &token, configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.batch_total().await, Paise::from(100_000));

    // Setting the status it already has changes nothing
    let (status, _) = send_request(set_status(&donation, "SUCCESS"), &token, configure(&ledger)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ledger.batch_total().await, Paise::from(100_000));
}

#[actix_web::test]
async fn overriding_an_unknown_donation_is_not_found() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let req = TestRequest::patch().uri("/admin/donations/don_missing/status").set_json(json!({ "status": "FAILED" }));
    let (status, _) = send_request(req, &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn editing_the_amount_adjusts_by_the_difference() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let donation = ledger.record_cash(1000).await;
    let _other = ledger.record_cash(200).await;
    assert_eq!(ledger.batch_total().await, Paise::from(120_000));
    let req = TestRequest::patch()
        .uri(&format!("/admin/donations/{}", donation.donation_id))
        .set_json(json!({ "amount": "1500", "donor_name": "Meera" }));
    let (status, body) = send_request(req, &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let change: DonationChange = serde_json::from_str(&body).unwrap();
    let current = change.current.unwrap();
    assert_eq!(current.amount, Paise::from(150_000));
    assert_eq!(current.donor_name.as_deref(), Some("Meera"));
    assert_eq!(ledger.batch_total().await, Paise::from(170_000));
}

#[actix_web::test]
async fn edits_with_unknown_fields_are_rejected() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let donation = ledger.record_cash(1000).await;
    let req = TestRequest::patch()
        .uri(&format!("/admin/donations/{}", donation.donation_id))
        .set_json(json!({ "amount": 10, "colour": "blue" }));
    let (status, _) = send_request(req, &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ledger.batch_total().await, Paise::from(100_000));
}

#[actix_web::test]
async fn deleting_a_settled_donation_reverses_its_contribution() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let donation = ledger.record_cash(1000).await;
    let uri = format!("/admin/donations/{}", donation.donation_id);
    let (status, body) = send_request(TestRequest::delete().uri(&uri), &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ledger.batch_total().await, Paise::from(0));
    assert!(ledger.donation(donation.donation_id.as_str()).await.is_none());

    let (status, _) = send_request(TestRequest::delete().uri(&uri), &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn search_filters_by_status() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let settled = ledger.record_cash(1000).await;
    let _pending = ledger.pending_checkout("order_S1").await;
    let req = TestRequest::get().uri("/admin/donations?status=SUCCESS");
    let (status, body) = send_request(req, &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let found: Vec<Donation> = serde_json::from_str(&body).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].donation_id, settled.donation_id);

    let req = TestRequest::get().uri("/admin/donations?colour=blue");
    let (status, _) = send_request(req, &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn audit_and_repair_report_consistent_totals() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    ledger.record_cash(1000).await;
    ledger.record_cash(250).await;
    let (status, body) =
        send_request(TestRequest::get().uri("/admin/batches/audit"), &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let audit: Vec<BatchAudit> = serde_json::from_str(&body).unwrap();
    assert_eq!(audit.len(), 1);
    assert!(audit[0].is_consistent());
    assert_eq!(audit[0].ledger_total, Paise::from(125_000));

    let uri = format!("/admin/batches/{}/repair", ledger.batch.id);
    let (status, body) = send_request(TestRequest::post().uri(&uri), &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let repaired: BatchAudit = serde_json::from_str(&body).unwrap();
    assert_eq!(repaired.batch_id, ledger.batch.id);
    assert_eq!(ledger.batch_total().await, Paise::from(125_000));

    let req = TestRequest::post().uri("/admin/batches/9999/repair");
    let (status, _) = send_request(req, &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn adjustments_against_a_deleted_batch_are_flagged() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let donation = ledger.record_cash(1000).await;
    assert!(ledger.db.delete_batch(ledger.batch.id).await.unwrap());
    let uri = format!("/admin/donations/{}", donation.donation_id);
    let (status, body) = send_request(TestRequest::delete().uri(&uri), &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = send_request(TestRequest::get().uri("/admin/flags"), &admin_token(), configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let flags: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0]["donation_id"], json!(donation.donation_id.as_str()));
    assert_eq!(flags[0]["batch_id"], json!(ledger.batch.id));
    assert_eq!(flags[0]["delta"], json!(-100_000));
}
