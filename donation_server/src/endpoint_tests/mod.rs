mod helpers;
mod mocks;

mod admin;
mod donations;
mod views;

use actix_web::{http::StatusCode, test::TestRequest};

use crate::routes::health;

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init().ok();
    let (status, body) = helpers::send_request(TestRequest::get().uri("/health"), "", |cfg| {
        cfg.service(health);
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}
