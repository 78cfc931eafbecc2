use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use donation_engine::{
    db_types::PaymentMethod,
    donation_objects::{AmountInput, DonationForm, ManualDonationRequest},
    events::EventProducers,
    traits::CoordinatorStats,
    view_objects::{BatchSummary, LeaderboardEntry, RegionTotal, WELL_WISHER},
    ChannelApi,
    SqliteDatabase,
    ViewsApi,
};
use dps_common::Paise;

use super::{
    helpers::{coordinator_token, send_request, TestLedger},
    mocks::MockProcessor,
};
use crate::routes::{
    BatchLeaderboardRoute,
    BatchSummaryRoute,
    DistrictTotalsRoute,
    DonorLeaderboardRoute,
    MyStatsRoute,
    SectionTotalsRoute,
};

fn configure(ledger: &TestLedger) -> impl FnOnce(&mut ServiceConfig) {
    let api = ViewsApi::new(ledger.db.clone());
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(api))
            .service(BatchSummaryRoute::<SqliteDatabase>::new())
            .service(BatchLeaderboardRoute::<SqliteDatabase>::new())
            .service(DonorLeaderboardRoute::<SqliteDatabase>::new())
            .service(DistrictTotalsRoute::<SqliteDatabase>::new())
            .service(SectionTotalsRoute::<SqliteDatabase>::new())
            .service(MyStatsRoute::<SqliteDatabase>::new());
    }
}

async fn record(ledger: &TestLedger, form: DonationForm) {
    let api = ChannelApi::new(ledger.db.clone(), MockProcessor::new(), EventProducers::default());
    let request = ManualDonationRequest { form, payment_method: PaymentMethod::Cash, reference: None };
    api.record_manual_donation(request, Some(ledger.coordinator.id)).await.expect("Could not record donation");
}

#[actix_web::test]
async fn batch_summary_by_slug() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    ledger.record_cash(750).await;
    let (status, body) = send_request(TestRequest::get().uri("/batches/batch-2024"), "", configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let summary: BatchSummary = serde_json::from_str(&body).unwrap();
    assert_eq!(summary.id, ledger.batch.id);
    assert_eq!(summary.total_amount, Paise::from(75_000));

    let (status, _) = send_request(TestRequest::get().uri("/batches/no-such-batch"), "", configure(&ledger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn batch_leaderboard_honours_the_limit() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let other = ledger.db.create_batch("Batch 2025", "batch-2025").await.unwrap();
    ledger.record_cash(100).await;
    record(&ledger, DonationForm::new(AmountInput::Number(900.0)).with_batch(other.id)).await;
    let req = TestRequest::get().uri("/leaderboard/batches?limit=1");
    let (status, body) = send_request(req, "", configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let board: Vec<LeaderboardEntry> = serde_json::from_str(&body).unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[0].id, Some(other.id));
    assert_eq!(board[0].total, Paise::from(90_000));
}

#[actix_web::test]
async fn hidden_donors_are_well_wishers() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let named = DonationForm::new(AmountInput::Number(1000.0)).with_donor_name("Meera").with_batch(ledger.batch.id);
    let mut hidden = DonationForm::new(AmountInput::Number(500.0)).with_donor_name("Kiran").with_batch(ledger.batch.id);
    hidden.hide_name = true;
    record(&ledger, named).await;
    record(&ledger, hidden).await;

    let uri = format!("/leaderboard/donors?batch_id={}", ledger.batch.id);
    let (status, body) = send_request(TestRequest::get().uri(&uri), "", configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let board: Vec<LeaderboardEntry> = serde_json::from_str(&body).unwrap();
    let labels = board.iter().map(|e| (e.label.as_str(), e.total)).collect::<Vec<_>>();
    assert_eq!(labels, vec![("Meera", Paise::from(100_000)), (WELL_WISHER, Paise::from(50_000))]);
    assert!(!body.contains("Kiran"));
}

#[actix_web::test]
async fn regional_totals_roll_up() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    let section = ledger.db.create_section("North").await.unwrap();
    let district = ledger.db.create_district("Hill District", Some(section.id)).await.unwrap();
    let place = ledger.db.create_place("Village", Some(district.id)).await.unwrap();
    record(&ledger, DonationForm::new(AmountInput::Number(300.0)).with_location(place.id.to_string())).await;
    record(&ledger, DonationForm::new(AmountInput::Number(200.0)).with_location(format!("district-{}", district.id)))
        .await;

    let (status, body) = send_request(TestRequest::get().uri("/stats/districts"), "", configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let districts: Vec<RegionTotal> = serde_json::from_str(&body).unwrap();
    let hill = districts.iter().find(|d| d.id == district.id).expect("District is missing");
    assert_eq!(hill.direct_total, Paise::from(20_000));
    assert_eq!(hill.total, Paise::from(50_000));

    let (status, body) = send_request(TestRequest::get().uri("/stats/sections"), "", configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let sections: Vec<RegionTotal> = serde_json::from_str(&body).unwrap();
    let north = sections.iter().find(|s| s.id == section.id).expect("Section is missing");
    assert_eq!(north.total, Paise::from(50_000));
}

#[actix_web::test]
async fn coordinators_see_their_own_stats() {
    let _ = env_logger::try_init().ok();
    let ledger = TestLedger::new().await;
    ledger.record_cash(400).await;
    ledger.record_cash(600).await;

    let (status, _) = send_request(TestRequest::get().uri("/me/stats"), "", configure(&ledger)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = coordinator_token(ledger.coordinator.id);
    let (status, body) = send_request(TestRequest::get().uri("/me/stats"), &token, configure(&ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let stats: CoordinatorStats = serde_json::from_str(&body).unwrap();
    assert_eq!(stats.coordinator_id, ledger.coordinator.id);
    assert_eq!(stats.settled_count, 2);
    assert_eq!(stats.settled_total, Paise::from(100_000));
    assert_eq!(stats.pending_count, 0);
}
