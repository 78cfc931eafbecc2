//! Razorpay as the donation engine's payment processor.
//!
//! [`RazorpayProcessor`] implements [`PaymentProcessor`] over the REST client in `razorpay_tools`, and
//! [`notification_from_event`] turns a verified webhook delivery into the engine's processor-agnostic
//! [`ProcessorNotification`].
use donation_engine::{
    db_types::DonationId,
    donation_objects::{NotificationKind, ProcessorNotification},
    events::{EventHandlers, EventHooks},
    traits::{
        CapturedPayment,
        OrderRequest,
        PaymentHandle,
        PaymentProcessor,
        ProcessorError,
        ProcessorOrder,
        ProcessorQrCode,
        QrCodeRequest,
    },
};
use futures::future::BoxFuture;
use log::*;
use razorpay_tools::{
    NewOrder,
    NewQrCode,
    Notes,
    Payment,
    RazorpayApi,
    RazorpayApiError,
    RazorpayConfig,
    WebhookEvent,
};

pub const LEDGER_EVENT_BUFFER_SIZE: usize = 25;
const DONATION_ID_NOTE: &str = "donationId";
const QR_CODE_NAME: &str = "Donation";

#[derive(Clone)]
pub struct RazorpayProcessor {
    api: RazorpayApi,
}

impl RazorpayProcessor {
    pub fn new(config: RazorpayConfig) -> Result<Self, RazorpayApiError> {
        let api = RazorpayApi::new(config)?;
        Ok(Self { api })
    }
}

impl PaymentProcessor for RazorpayProcessor {
    fn key_id(&self) -> String {
        self.api.key_id().to_string()
    }

    async fn create_order(&self, request: OrderRequest) -> Result<ProcessorOrder, ProcessorError> {
        let order = NewOrder {
            amount: request.amount,
            currency: request.currency,
            receipt: request.receipt,
            notes: donation_notes(&request.donation_id),
        };
        let order = self.api.create_order(order).await.map_err(processor_error)?;
        Ok(ProcessorOrder { id: order.id, amount: order.amount, currency: order.currency })
    }

    async fn create_qr_code(&self, request: QrCodeRequest) -> Result<ProcessorQrCode, ProcessorError> {
        let qr = NewQrCode::single_use_upi(
            QR_CODE_NAME,
            request.amount,
            &request.description,
            donation_notes(&request.donation_id),
        );
        let qr = self.api.create_qr_code(qr).await.map_err(processor_error)?;
        Ok(ProcessorQrCode { id: qr.id, image_url: qr.image_url, payment_uri: None })
    }

    async fn resolve_payment_uri(&self, image_url: &str) -> Option<String> {
        self.api.resolve_upi_uri(image_url).await
    }

    async fn fetch_captured_payment(&self, handle: &PaymentHandle) -> Result<Option<CapturedPayment>, ProcessorError> {
        let payment = match handle {
            PaymentHandle::Order(id) => {
                self.api.fetch_order_payments(id).await.map_err(processor_error)?.captured().cloned()
            },
            PaymentHandle::QrCode(id) => {
                self.api.fetch_qr_code_payments(id).await.map_err(processor_error)?.captured().cloned()
            },
            PaymentHandle::Payment(id) => {
                Some(self.api.fetch_payment(id).await.map_err(processor_error)?).filter(Payment::is_captured)
            },
        };
        if let Some(p) = &payment {
            debug!("💳️ Found captured payment {} for {}", p.id, handle.id());
        }
        Ok(payment.map(|p| CapturedPayment { id: p.id, amount: p.amount }))
    }
}

fn donation_notes(donation_id: &DonationId) -> Notes {
    Notes::from([(DONATION_ID_NOTE.to_string(), donation_id.to_string())])
}

fn processor_error(e: RazorpayApiError) -> ProcessorError {
    match e {
        RazorpayApiError::QueryError { status, message } => ProcessorError::Rejected { status, message },
        RazorpayApiError::JsonError(s) => ProcessorError::InvalidResponse(s),
        RazorpayApiError::RestResponseError(s) | RazorpayApiError::Initialization(s) => ProcessorError::Unavailable(s),
    }
}

/// Converts a verified webhook delivery into a processor-agnostic notification.
pub fn notification_from_event(event: &WebhookEvent) -> ProcessorNotification {
    let kind = match event.event.as_str() {
        "payment.captured" => NotificationKind::PaymentCaptured,
        "order.paid" => NotificationKind::OrderPaid,
        "qr_code.credited" => NotificationKind::QrCodeCredited,
        other => NotificationKind::Other(other.to_string()),
    };
    ProcessorNotification {
        kind,
        payment_id: event.payment_id(),
        order_id: event.order_id(),
        qr_code_id: event.qr_code_id(),
        donation_refs: event.donation_refs().into_iter().map(DonationId::from).collect(),
    }
}

/// Event handlers that record ledger activity in the server log.
///
/// 1. DonationConfirmedEvent - one line per confirmed donation, with the batch adjustments made.
/// 2. DonationModifiedEvent - administrative edits and deletes.
/// 3. AggregateFlaggedEvent - a batch total could not be adjusted. Operators should run the repair tool.
pub fn create_ledger_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_donation_confirmed(|ev| {
        let d = &ev.donation;
        info!(
            "📬️ Donation {} confirmed: {} via {} ({}). Batch adjustments: {:?}",
            d.donation_id, d.amount, d.payment_method, d.transaction_id, ev.adjustments
        );
        no_op()
    });
    hooks.on_donation_modified(|ev| {
        match &ev.new_donation {
            Some(new) => info!(
                "📬️ Donation {} modified. {} {} -> {} {}",
                new.donation_id,
                ev.old_donation.amount,
                ev.old_donation.payment_status,
                new.amount,
                new.payment_status
            ),
            None => info!(
                "📬️ Donation {} ({}, {}) deleted",
                ev.old_donation.donation_id, ev.old_donation.amount, ev.old_donation.payment_status
            ),
        }
        no_op()
    });
    hooks.on_aggregate_flagged(|ev| {
        warn!(
            "📬️🚨️ Batch {} could not be adjusted by {} for donation {}. A reconciliation flag was raised; run the \
             repair tool.",
            ev.adjustment.batch_id, ev.adjustment.delta, ev.donation.donation_id
        );
        no_op()
    });
    EventHandlers::new(LEDGER_EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
