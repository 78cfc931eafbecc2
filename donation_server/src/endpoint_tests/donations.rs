use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use donation_engine::{
    db_types::{Donation, PaymentMethod, PaymentStatus, QR_PLACEHOLDER_PREFIX},
    donation_objects::{CheckoutOrder, DonationQueryFilter, DonationStatusReport, QrIntent},
    events::EventProducers,
    traits::{CapturedPayment, LedgerDatabase, PaymentHandle, ProcessorError, ProcessorQrCode},
    ChannelApi,
    ConfirmationApi,
    ReconciliationApi,
    SqliteDatabase,
};
use dps_common::Paise;
use serde_json::json;

use super::{
    helpers::{coordinator_token, order_processor, send_request, TestLedger},
    mocks::MockProcessor,
};
use crate::routes::{CreateCheckoutRoute, CreateQrRoute, DonationStatusRoute, RecordDonationRoute};

fn configure_channels(ledger: &TestLedger, processor: MockProcessor) -> impl FnOnce(&mut ServiceConfig) {
    let api = ChannelApi::new(ledger.db.clone(), processor, EventProducers::default());
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(api))
            .service(CreateCheckoutRoute::<SqliteDatabase, MockProcessor>::new())
            .service(CreateQrRoute::<SqliteDatabase, MockProcessor>::new())
            .service(RecordDonationRoute::<SqliteDatabase, MockProcessor>::new());
    }
}

fn configure_polling(ledger: &TestLedger, processor: MockProcessor) -> impl FnOnce(&mut ServiceConfig) {
    let api = ConfirmationApi::new(ledger.db.clone(), processor, EventProducers::default());
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(api)).service(DonationStatusRoute::<SqliteDatabase, MockProcessor>::new());
    }
}

fn checkout_request(ledger: &TestLedger) -> TestRequest {
    TestRequest::post().uri("/donations/checkout").set_json(json!({
        "amount": 500,
        "donor_name": "Ravi",
        "mobile": "98765 43210",
        "batch_id": ledger.batch.id
    }))
}

#[actix_web::test]
async fn checkout_records_a_pending_donation() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let configure = configure_channels(&ledger, order_processor("order_T1"));
    let (status, body) = send_request(checkout_request(&ledger), "", configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: CheckoutOrder = serde_json::from_str(&body).unwrap();
    assert_eq!(order.order_id, "order_T1");
    assert_eq!(order.key_id, "rzp_test_key");
    assert_eq!(order.amount, Paise::from(50_000));
    assert_eq!(order.currency, "INR");

    let donation = ledger.donation(order.donation_id.as_str()).await.expect("Donation was not recorded");
    assert_eq!(donation.payment_status, PaymentStatus::Pending);
    assert_eq!(donation.payment_method, PaymentMethod::HostedCheckout);
    assert_eq!(donation.transaction_id, "order_T1");
    assert_eq!(donation.mobile.as_deref(), Some("9876543210"));
    assert_eq!(donation.collected_by, None);
    assert_eq!(ledger.batch_total().await, Paise::from(0));
}

#[actix_web::test]
async fn checkout_by_a_coordinator_is_attributed_to_them() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let token = coordinator_token(ledger.coordinator.id);
    let configure = configure_channels(&ledger, order_processor("order_T2"));
    let (status, body) = send_request(checkout_request(&ledger), &token, configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: CheckoutOrder = serde_json::from_str(&body).unwrap();
    let donation = ledger.donation(order.donation_id.as_str()).await.unwrap();
    assert_eq!(donation.collected_by, Some(ledger.coordinator.id));
}

#[actix_web::test]
async fn checkout_with_a_forged_token_is_unauthorized() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let mut token = coordinator_token(ledger.coordinator.id);
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    let configure = configure_channels(&ledger, MockProcessor::new());
    let (status, _) = send_request(checkout_request(&ledger), &token, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn invalid_forms_are_rejected_before_the_processor_is_called() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let forms = [
        json!({ "amount": -5, "mobile": "9876543210" }),
        json!({ "amount": "abc", "mobile": "9876543210" }),
        json!({ "amount": 100 }),
        json!({ "amount": 100, "mobile": "12" }),
        json!({ "amount": 100, "mobile": "9876543210", "batch_id": 9999 }),
        json!({ "amount": 100, "mobile": "9876543210", "location": "district-9999" }),
    ];
    for form in forms {
        let configure = configure_channels(&ledger, MockProcessor::new());
        let req = TestRequest::post().uri("/donations/checkout").set_json(&form);
        let (status, body) = send_request(req, "", configure).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{form} gave {body}");
    }
    let all = ledger.db.search_donations(DonationQueryFilter::default()).await.unwrap();
    assert!(all.is_empty());
}

#[actix_web::test]
async fn malformed_json_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let configure = configure_channels(&ledger, MockProcessor::new());
    let req = TestRequest::post()
        .uri("/donations/checkout")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{ \"amount\": ");
    let (status, body) = send_request(req, "", configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("error"));
}

#[actix_web::test]
async fn processor_failure_is_a_bad_gateway_and_writes_nothing() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let mut processor = MockProcessor::new();
    processor.expect_create_order().times(1).returning(|_| Err(ProcessorError::Unavailable("timed out".into())));
    let configure = configure_channels(&ledger, processor);
    let (status, _) = send_request(checkout_request(&ledger), "", configure).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let all = ledger.db.search_donations(DonationQueryFilter::default()).await.unwrap();
    assert!(all.is_empty());
}

#[actix_web::test]
async fn qr_intent_carries_the_payment_uri() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let mut processor = MockProcessor::new();
    processor.expect_create_qr_code().times(1).returning(|req| {
        assert!(req.description.contains(req.donation_id.as_str()));
        Ok(ProcessorQrCode { id: "qr_T1".into(), image_url: "https://rzp.io/i/abc".into(), payment_uri: None })
    });
    processor
        .expect_resolve_payment_uri()
        .times(1)
        .returning(|_| Some("upi://pay?pa=donations@bank&am=250.00".to_string()));
    let configure = configure_channels(&ledger, processor);
    let req = TestRequest::post().uri("/donations/qr").set_json(json!({ "amount": "250", "mobile": "9876543210" }));
    let (status, body) = send_request(req, "", configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let intent: QrIntent = serde_json::from_str(&body).unwrap();
    assert_eq!(intent.qr_id, "qr_T1");
    assert_eq!(intent.amount, Paise::from(25_000));
    assert_eq!(intent.payment_uri.as_deref(), Some("upi://pay?pa=donations@bank&am=250.00"));
    let donation = ledger.donation(intent.donation_id.as_str()).await.unwrap();
    assert_eq!(donation.transaction_id, "qr_T1");
    assert_eq!(donation.payment_method, PaymentMethod::Qr);
}

#[actix_web::test]
async fn failed_qr_intent_leaves_a_placeholder() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let mut processor = MockProcessor::new();
    processor
        .expect_create_qr_code()
        .times(1)
        .returning(|_| Err(ProcessorError::Rejected { status: 400, message: "bad amount".into() }));
    let configure = configure_channels(&ledger, processor);
    let req = TestRequest::post().uri("/donations/qr").set_json(json!({ "amount": 250, "mobile": "9876543210" }));
    let (status, _) = send_request(req, "", configure).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let filter = DonationQueryFilter::default().with_status(PaymentStatus::Pending);
    let pending = ledger.db.search_donations(filter).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].transaction_id.starts_with(QR_PLACEHOLDER_PREFIX));
}

#[actix_web::test]
async fn polling_confirms_a_captured_payment() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let donation = ledger.pending_checkout("order_P1").await;
    let mut processor = MockProcessor::new();
    processor
        .expect_fetch_captured_payment()
        .withf(|handle| *handle == PaymentHandle::Order("order_P1".into()))
        .times(1)
        .returning(|_| Ok(Some(CapturedPayment { id: "pay_P1".into(), amount: Paise::from(50_000) })));
    let configure = configure_polling(&ledger, processor);
    let uri = format!("/donations/{}/status", donation.donation_id);
    let (status, body) = send_request(TestRequest::get().uri(&uri), "", configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let report: DonationStatusReport = serde_json::from_str(&body).unwrap();
    assert_eq!(report.status, PaymentStatus::Success);
    assert_eq!(ledger.batch_total().await, Paise::from(50_000));
    let settled = ledger.donation(donation.donation_id.as_str()).await.unwrap();
    assert_eq!(settled.transaction_id, "pay_P1");
}

#[actix_web::test]
async fn polling_settles_a_failed_donation_that_was_paid_late() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let donation = ledger.pending_checkout("order_P3").await;
    let admin = ReconciliationApi::new(ledger.db.clone(), EventProducers::default());
    admin.override_status(&donation.donation_id, PaymentStatus::Failed).await.expect("Could not fail donation");
    let mut processor = MockProcessor::new();
    processor
        .expect_fetch_captured_payment()
        .withf(|handle| *handle == PaymentHandle::Order("order_P3".into()))
        .times(1)
        .returning(|_| Ok(Some(CapturedPayment { id: "pay_P3".into(), amount: Paise::from(50_000) })));
    let uri = format!("/donations/{}/status", donation.donation_id);
    let (status, body) = send_request(TestRequest::get().uri(&uri), "", configure_polling(&ledger, processor)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let report: DonationStatusReport = serde_json::from_str(&body).unwrap();
    assert_eq!(report.status, PaymentStatus::Success);
    assert_eq!(ledger.batch_total().await, Paise::from(50_000));

    // Settled donations are answered from the ledger without asking the processor again
    let configure = configure_polling(&ledger, MockProcessor::new());
    let (status, body) = send_request(TestRequest::get().uri(&uri), "", configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let report: DonationStatusReport = serde_json::from_str(&body).unwrap();
    assert_eq!(report.status, PaymentStatus::Success);
    assert_eq!(ledger.batch_total().await, Paise::from(50_000));
}

#[actix_web::test]
async fn polling_reports_pending_when_the_processor_is_down() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let donation = ledger.pending_checkout("order_P2").await;
    let mut processor = MockProcessor::new();
    processor.expect_fetch_captured_payment().returning(|_| Err(ProcessorError::Unavailable("dns".into())));
    let configure = configure_polling(&ledger, processor);
    let uri = format!("/donations/{}/status", donation.donation_id);
    let (status, body) = send_request(TestRequest::get().uri(&uri), "", configure).await;
    assert_eq!(status, StatusCode::OK);
    let report: DonationStatusReport = serde_json::from_str(&body).unwrap();
    assert_eq!(report.status, PaymentStatus::Pending);
    assert_eq!(ledger.batch_total().await, Paise::from(0));
}

#[actix_web::test]
async fn polling_an_unknown_donation_is_not_found() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let configure = configure_polling(&ledger, MockProcessor::new());
    let (status, _) = send_request(TestRequest::get().uri("/donations/don_nope/status"), "", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn manual_entry_requires_a_coordinator() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let body = json!({ "amount": 1000, "payment_method": "CASH", "batch_id": ledger.batch.id });
    let configure = configure_channels(&ledger, MockProcessor::new());
    let req = TestRequest::post().uri("/staff/donations").set_json(&body);
    let (status, _) = send_request(req, "", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(ledger.batch_total().await, Paise::from(0));
}

#[actix_web::test]
async fn manual_entry_settles_immediately() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let token = coordinator_token(ledger.coordinator.id);
    let body = json!({
        "amount": 1000,
        "payment_method": "BANK_TRANSFER",
        "reference": "UTR123456",
        "batch_id": ledger.batch.id
    });
    let configure = configure_channels(&ledger, MockProcessor::new());
    let req = TestRequest::post().uri("/staff/donations").set_json(&body);
    let (status, body) = send_request(req, &token, configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let donation: Donation = serde_json::from_str(&body).unwrap();
    assert_eq!(donation.payment_status, PaymentStatus::Success);
    assert_eq!(donation.transaction_id, "UTR123456");
    assert_eq!(donation.collected_by, Some(ledger.coordinator.id));
    assert_eq!(ledger.batch_total().await, Paise::from(100_000));
}

#[actix_web::test]
async fn oversized_manual_entries_are_rejected() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let token = coordinator_token(ledger.coordinator.id);
    for amount in ["92233720368547758", "10000000.01"] {
        let body = json!({ "amount": amount, "payment_method": "CASH", "batch_id": ledger.batch.id });
        let configure = configure_channels(&ledger, MockProcessor::new());
        let req = TestRequest::post().uri("/staff/donations").set_json(&body);
        let (status, body) = send_request(req, &token, configure).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }
    assert_eq!(ledger.batch_total().await, Paise::from(0));
    let all = ledger.db.search_donations(DonationQueryFilter::default()).await.unwrap();
    assert!(all.is_empty());
}

#[actix_web::test]
async fn hosted_checkout_cannot_be_entered_manually() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let token = coordinator_token(ledger.coordinator.id);
    let body = json!({ "amount": 1000, "payment_method": "HOSTED_CHECKOUT", "batch_id": ledger.batch.id });
    let configure = configure_channels(&ledger, MockProcessor::new());
    let req = TestRequest::post().uri("/staff/donations").set_json(&body);
    let (status, _) = send_request(req, &token, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ledger.batch_total().await, Paise::from(0));
}
