//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST delegate to the donation engine. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here is async, and every ledger or processor call is
//! awaited, so workers keep serving other requests while they wait.
//!
//! Route registration is done with the [`route!`] macro, since actix cannot register generic handlers directly. The
//! handlers are generic over the ledger backend and the payment processor so that the endpoint tests can swap in
//! mocks.
use actix_web::{get, web, HttpResponse, Responder};
use donation_engine::{
    db_types::{DonationId, Role},
    donation_objects::{DonationForm, DonationQueryFilter, DonationUpdate, ManualDonationRequest},
    traits::{LedgerDatabase, LedgerViews, PaymentProcessor},
    ChannelApi,
    ConfirmationApi,
    ReconciliationApi,
    ViewsApi,
};
use log::*;
use razorpay_tools::WebhookEvent;

use crate::{
    auth::JwtClaims,
    data_objects::{FlagParams, LeaderboardParams, StatusOverride, WebhookAck},
    errors::ServerError,
    integrations::razorpay::notification_from_event,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),*]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Donations  ----------------------------------------------------
route!(create_checkout => Post "/donations/checkout" impl LedgerDatabase, PaymentProcessor);
/// Creates a hosted-checkout order and a PENDING donation for it.
///
/// Anonymous donors may call this. If a valid coordinator token is supplied, the donation is attributed to that
/// coordinator.
pub async fn create_checkout<B: LedgerDatabase, P: PaymentProcessor>(
    claims: Option<JwtClaims>,
    body: web::Json<DonationForm>,
    api: web::Data<ChannelApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let collector = collector_id(claims.as_ref());
    debug!("💻️ POST checkout order. Collector: {collector:?}");
    let order = api.create_checkout_order(body.into_inner(), collector).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(create_qr => Post "/donations/qr" impl LedgerDatabase, PaymentProcessor);
/// Records a PENDING donation and issues a single-use UPI QR code for it.
pub async fn create_qr<B: LedgerDatabase, P: PaymentProcessor>(
    claims: Option<JwtClaims>,
    body: web::Json<DonationForm>,
    api: web::Data<ChannelApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let collector = collector_id(claims.as_ref());
    debug!("💻️ POST QR intent. Collector: {collector:?}");
    let intent = api.create_qr_intent(body.into_inner(), collector).await?;
    Ok(HttpResponse::Ok().json(intent))
}

route!(donation_status => Get "/donations/{id}/status" impl LedgerDatabase, PaymentProcessor);
/// The polling confirmation listener. While a donation is PENDING, each poll asks the processor whether the payment
/// has been captured.
pub async fn donation_status<B: LedgerDatabase, P: PaymentProcessor>(
    path: web::Path<String>,
    api: web::Data<ConfirmationApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let donation_id = DonationId::from(path.into_inner());
    trace!("💻️ GET status for donation {donation_id}");
    let report = api.poll_status(&donation_id).await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(record_donation => Post "/staff/donations" impl LedgerDatabase, PaymentProcessor where requires [Role::Coordinator]);
/// Manual (cash, bank transfer or offline UPI) entry by a coordinator. The donation is recorded as settled.
pub async fn record_donation<B: LedgerDatabase, P: PaymentProcessor>(
    claims: JwtClaims,
    body: web::Json<ManualDonationRequest>,
    api: web::Data<ChannelApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST manual donation by coordinator {}", claims.sub);
    let donation = api.record_manual_donation(body.into_inner(), Some(claims.sub)).await?;
    Ok(HttpResponse::Ok().json(donation))
}

fn collector_id(claims: Option<&JwtClaims>) -> Option<i64> {
    claims.filter(|c| c.has_role(Role::Coordinator)).map(|c| c.sub)
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(razorpay_webhook => Post "/razorpay" impl LedgerDatabase, PaymentProcessor);
/// The processor-driven confirmation listener. The signature has already been checked by the HMAC middleware.
///
/// Every well-formed delivery is acknowledged with 200, including unknown donations and uninteresting events, so that
/// the processor does not keep retrying them.
pub async fn razorpay_webhook<B: LedgerDatabase, P: PaymentProcessor>(
    body: web::Bytes,
    api: web::Data<ConfirmationApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let event = serde_json::from_slice::<WebhookEvent>(&body).map_err(|e| {
        warn!("💻️ Could not deserialize webhook payload. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    trace!("💻️ Received '{}' webhook", event.event);
    let notification = notification_from_event(&event);
    let outcome = api.handle_notification(notification).await?;
    info!("💻️ '{}' webhook handled: {outcome:?}", event.event);
    Ok(HttpResponse::Ok().json(WebhookAck::from(outcome)))
}

//----------------------------------------------   Views  ----------------------------------------------------
route!(batch_summary => Get "/batches/{slug}" impl LedgerViews);
pub async fn batch_summary<B: LedgerViews>(
    path: web::Path<String>,
    api: web::Data<ViewsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let slug = path.into_inner();
    trace!("💻️ GET batch summary for {slug}");
    let summary = api.batch_summary(&slug).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(batch_leaderboard => Get "/leaderboard/batches" impl LedgerViews);
pub async fn batch_leaderboard<B: LedgerViews>(
    params: web::Query<LeaderboardParams>,
    api: web::Data<ViewsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let board = api.batch_leaderboard(params.limit).await?;
    Ok(HttpResponse::Ok().json(board))
}

route!(donor_leaderboard => Get "/leaderboard/donors" impl LedgerViews);
/// Donor rankings, optionally restricted to one batch with `?batch_id=`. Hidden donors are listed as well-wishers.
pub async fn donor_leaderboard<B: LedgerViews>(
    params: web::Query<LeaderboardParams>,
    api: web::Data<ViewsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let board = api.donor_leaderboard(params.batch_id, params.limit).await?;
    Ok(HttpResponse::Ok().json(board))
}

route!(unit_leaderboard => Get "/leaderboard/units" impl LedgerViews);
pub async fn unit_leaderboard<B: LedgerViews>(
    params: web::Query<LeaderboardParams>,
    api: web::Data<ViewsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let board = api.unit_leaderboard(params.limit).await?;
    Ok(HttpResponse::Ok().json(board))
}

route!(place_leaderboard => Get "/leaderboard/places" impl LedgerViews);
pub async fn place_leaderboard<B: LedgerViews>(
    params: web::Query<LeaderboardParams>,
    api: web::Data<ViewsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let board = api.place_leaderboard(params.limit).await?;
    Ok(HttpResponse::Ok().json(board))
}

route!(district_totals => Get "/stats/districts" impl LedgerViews);
pub async fn district_totals<B: LedgerViews>(api: web::Data<ViewsApi<B>>) -> Result<HttpResponse, ServerError> {
    let totals = api.district_totals().await?;
    Ok(HttpResponse::Ok().json(totals))
}

route!(section_totals => Get "/stats/sections" impl LedgerViews);
pub async fn section_totals<B: LedgerViews>(api: web::Data<ViewsApi<B>>) -> Result<HttpResponse, ServerError> {
    let totals = api.section_totals().await?;
    Ok(HttpResponse::Ok().json(totals))
}

route!(my_stats => Get "/me/stats" impl LedgerViews where requires [Role::Coordinator]);
pub async fn my_stats<B: LedgerViews>(
    claims: JwtClaims,
    api: web::Data<ViewsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET stats for coordinator {}", claims.sub);
    let stats = api.coordinator_stats(claims.sub).await?;
    Ok(HttpResponse::Ok().json(stats))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(override_status => Patch "/admin/donations/{id}/status" impl LedgerDatabase where requires [Role::Admin]);
/// Forces a donation into the given status. The batch total follows the change in the same transaction.
pub async fn override_status<B: LedgerDatabase>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<StatusOverride>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let donation_id = DonationId::from(path.into_inner());
    let status = body.into_inner().status;
    info!("💻️ Admin {} is overriding the status of {donation_id} to {status}", claims.sub);
    let change = api.override_status(&donation_id, status).await?;
    Ok(HttpResponse::Ok().json(change))
}

route!(edit_donation => Patch "/admin/donations/{id}" impl LedgerDatabase where requires [Role::Admin]);
pub async fn edit_donation<B: LedgerDatabase>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<DonationUpdate>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let donation_id = DonationId::from(path.into_inner());
    info!("💻️ Admin {} is editing donation {donation_id}", claims.sub);
    let change = api.edit_donation(&donation_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(change))
}

route!(delete_donation => Delete "/admin/donations/{id}" impl LedgerDatabase where requires [Role::Admin]);
pub async fn delete_donation<B: LedgerDatabase>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let donation_id = DonationId::from(path.into_inner());
    info!("💻️ Admin {} is deleting donation {donation_id}", claims.sub);
    let change = api.delete_donation(&donation_id).await?;
    Ok(HttpResponse::Ok().json(change))
}

route!(search_donations => Get "/admin/donations" impl LedgerDatabase where requires [Role::Admin]);
pub async fn search_donations<B: LedgerDatabase>(
    query: web::Query<DonationQueryFilter>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET donation search: {query:?}");
    let donations = api.search_donations(query).await?;
    Ok(HttpResponse::Ok().json(donations))
}

route!(audit_batches => Get "/admin/batches/audit" impl LedgerDatabase where requires [Role::Admin]);
/// Compares every batch's recorded total against the sum of its settled donations.
pub async fn audit_batches<B: LedgerDatabase>(
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let audit = api.audit_batch_totals().await?;
    let drifted = audit.iter().filter(|a| !a.is_consistent()).count();
    if drifted > 0 {
        warn!("💻️ Batch audit found {drifted} batch total(s) that disagree with the ledger");
    }
    Ok(HttpResponse::Ok().json(audit))
}

route!(repair_batch => Post "/admin/batches/{id}/repair" impl LedgerDatabase where requires [Role::Admin]);
pub async fn repair_batch<B: LedgerDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let batch_id = path.into_inner();
    info!("💻️ Admin {} is repairing the total for batch {batch_id}", claims.sub);
    let audit = api.repair_batch_total(batch_id).await?;
    Ok(HttpResponse::Ok().json(audit))
}

route!(reconciliation_flags => Get "/admin/flags" impl LedgerDatabase where requires [Role::Admin]);
pub async fn reconciliation_flags<B: LedgerDatabase>(
    params: web::Query<FlagParams>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let flags = api.reconciliation_flags(params.include_resolved).await?;
    Ok(HttpResponse::Ok().json(flags))
}
