//! The two confirmation listeners: donor-driven polling and processor-driven notifications.
//!
//! Neither listener touches batch totals. Both resolve the donation and hand over to
//! [`ReconciliationApi::confirm_success`], which is idempotent, so they may race freely.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Donation, DonationId, PaymentStatus},
    dps_api::{
        donation_objects::{DonationStatusReport, ProcessorNotification, WebhookOutcome},
        errors::ConfirmationError,
        reconciliation_api::ReconciliationApi,
    },
    events::EventProducers,
    traits::{ConfirmResult, LedgerDatabase, LedgerError, PaymentHandle, PaymentProcessor},
};

pub struct ConfirmationApi<B, P> {
    reconciliation: ReconciliationApi<B>,
    processor: P,
}

impl<B, P> Debug for ConfirmationApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConfirmationApi")
    }
}

impl<B, P> ConfirmationApi<B, P> {
    pub fn new(db: B, processor: P, producers: EventProducers) -> Self {
        Self { reconciliation: ReconciliationApi::new(db, producers), processor }
    }

    pub fn db(&self) -> &B {
        self.reconciliation.db()
    }
}

impl<B, P> ConfirmationApi<B, P>
where
    B: LedgerDatabase,
    P: PaymentProcessor,
{
    /// Reports the status of a donation. Unless it is already `SUCCESS`, the processor is asked whether the payment has
    /// been captured, and if so the donation is confirmed. A `FAILED` donation that was paid late is settled here just
    /// as it would be by a webhook.
    ///
    /// Processor failures are logged and the stored status is reported.
    pub async fn poll_status(&self, donation_id: &DonationId) -> Result<DonationStatusReport, ConfirmationError> {
        let donation = self
            .db()
            .fetch_donation(donation_id)
            .await?
            .ok_or_else(|| ConfirmationError::DonationNotFound(donation_id.clone()))?;
        let report = |status: PaymentStatus| DonationStatusReport { donation_id: donation_id.clone(), status };
        if donation.payment_status == PaymentStatus::Success {
            return Ok(report(donation.payment_status));
        }
        let Some(handle) = PaymentHandle::from_transaction_id(&donation.transaction_id) else {
            trace!("🔄️🔎️ Donation {donation_id} has no processor reference yet ({})", donation.transaction_id);
            return Ok(report(donation.payment_status));
        };
        match self.processor.fetch_captured_payment(&handle).await {
            Ok(Some(payment)) => {
                if payment.amount != donation.amount {
                    warn!(
                        "🔄️🔎️ Payment {} for donation {donation_id} captured {}, but the donation is for {}",
                        payment.id, payment.amount, donation.amount
                    );
                }
                let result = self.confirm(&donation, Some(&payment.id)).await?;
                Ok(report(result.donation().payment_status))
            },
            Ok(None) => {
                trace!("🔄️🔎️ No captured payment yet for donation {donation_id}");
                Ok(report(donation.payment_status))
            },
            Err(e) => {
                warn!("🔄️🔎️ Could not poll the processor for donation {donation_id}. {e}");
                Ok(report(donation.payment_status))
            },
        }
    }

    /// Acts on a verified processor notification. Unknown donations and irrelevant events are acknowledged without
    /// error so that the processor does not retry them.
    pub async fn handle_notification(
        &self,
        notification: ProcessorNotification,
    ) -> Result<WebhookOutcome, ConfirmationError> {
        if !notification.kind.confirms_payment() {
            debug!("🔄️📨️ Ignoring '{}' notification", notification.kind);
            return Ok(WebhookOutcome::Ignored(notification.kind.to_string()));
        }
        let Some(donation) = self.resolve_donation(&notification).await? else {
            info!(
                "🔄️📨️ '{}' notification does not match any donation. order: {:?}, qr: {:?}, payment: {:?}",
                notification.kind, notification.order_id, notification.qr_code_id, notification.payment_id
            );
            return Ok(WebhookOutcome::UnknownDonation);
        };
        let donation_id = donation.donation_id.clone();
        match self.confirm(&donation, notification.payment_id.as_deref()).await {
            Ok(ConfirmResult::Confirmed { .. }) => Ok(WebhookOutcome::Confirmed(donation_id)),
            Ok(ConfirmResult::AlreadySettled(_)) => Ok(WebhookOutcome::AlreadySettled(donation_id)),
            Err(LedgerError::DonationNotFound(_)) => {
                info!("🔄️📨️ Donation {donation_id} was deleted before the notification could be applied");
                Ok(WebhookOutcome::UnknownDonation)
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn confirm(&self, donation: &Donation, payment_id: Option<&str>) -> Result<ConfirmResult, LedgerError> {
        let donation_id = &donation.donation_id;
        match self.reconciliation.confirm_success(donation_id, payment_id).await {
            Err(LedgerError::UniqueViolation(e)) => {
                warn!(
                    "🔄️📨️ Payment id {payment_id:?} is already recorded against another donation. Confirming \
                     {donation_id} without it. {e}"
                );
                self.reconciliation.confirm_success(donation_id, None).await
            },
            other => other,
        }
    }

    /// Embedded donation ids win. Otherwise the transaction reference is matched against the order, QR code and
    /// payment ids, in that order.
    async fn resolve_donation(&self, notification: &ProcessorNotification) -> Result<Option<Donation>, LedgerError> {
        for donation_id in &notification.donation_refs {
            if let Some(donation) = self.db().fetch_donation(donation_id).await? {
                trace!("🔄️📨️ Notification resolved to {donation_id} by embedded reference");
                return Ok(Some(donation));
            }
            debug!("🔄️📨️ Notification references donation {donation_id}, which does not exist");
        }
        let references = [&notification.order_id, &notification.qr_code_id, &notification.payment_id];
        for reference in references.into_iter().flatten() {
            if let Some(donation) = self.db().fetch_donation_by_transaction_id(reference).await? {
                trace!("🔄️📨️ Notification resolved to {} by transaction reference {reference}", donation.donation_id);
                return Ok(Some(donation));
            }
        }
        Ok(None)
    }
}
