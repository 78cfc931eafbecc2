//! The payment channel adapters: hosted checkout, UPI QR and manual entry.
//!
//! Every adapter validates its input completely before anything is written or any processor call is made.
use std::fmt::Debug;

use dps_common::{Paise, DEFAULT_CURRENCY_CODE};
use log::*;

use crate::{
    db_types::{
        generated_manual_reference,
        placeholder_qr_reference,
        Attribution,
        Donation,
        DonationCategory,
        DonationId,
        NewDonation,
        PaymentMethod,
    },
    dps_api::{
        donation_objects::{normalize_mobile, CheckoutOrder, DonationForm, ManualDonationRequest, QrIntent},
        errors::ChannelError,
    },
    events::{AggregateFlaggedEvent, DonationConfirmedEvent, EventProducers},
    traits::{DonationReferences, LedgerDatabase, LedgerError, OrderRequest, PaymentProcessor, QrCodeRequest},
};

pub struct ChannelApi<B, P> {
    db: B,
    processor: P,
    producers: EventProducers,
    currency: String,
}

impl<B, P> Debug for ChannelApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChannelApi ({})", self.currency)
    }
}

impl<B, P> ChannelApi<B, P> {
    pub fn new(db: B, processor: P, producers: EventProducers) -> Self {
        Self { db, processor, producers, currency: DEFAULT_CURRENCY_CODE.to_string() }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }
}

impl<B, P> ChannelApi<B, P>
where
    B: LedgerDatabase,
    P: PaymentProcessor,
{
    /// Creates a hosted-checkout order with the processor and records a `PENDING` donation keyed by the order id.
    ///
    /// `collector` is the authenticated coordinator, if any. Public donations have none.
    ///
    /// Nothing is written if the processor refuses the order.
    pub async fn create_checkout_order(
        &self,
        form: DonationForm,
        collector: Option<i64>,
    ) -> Result<CheckoutOrder, ChannelError> {
        let draft = ValidatedForm::try_from_form(&form, true)?;
        self.db.check_references(&draft.references(collector)).await?;
        let donation_id = DonationId::random();
        let request = OrderRequest {
            amount: draft.amount,
            currency: self.currency.clone(),
            receipt: donation_id.to_string(),
            donation_id: donation_id.clone(),
        };
        let order = self.processor.create_order(request).await.map_err(|e| {
            warn!("🔄️🛒️ Could not create checkout order for {donation_id}. {e}");
            e
        })?;
        let new_donation = draft.into_new_donation(
            donation_id.clone(),
            order.id.clone(),
            PaymentMethod::HostedCheckout,
            collector,
            &self.currency,
        );
        let donation = self.db.insert_pending_donation(new_donation).await?;
        info!("🔄️🛒️ Checkout order {} created for donation {donation_id} ({})", order.id, donation.amount);
        Ok(CheckoutOrder {
            order_id: order.id,
            key_id: self.processor.key_id(),
            amount: donation.amount,
            currency: donation.currency,
            donation_id,
        })
    }

    /// Records a `PENDING` donation, then asks the processor for a single-use, fixed-amount UPI QR code carrying the
    /// donation id in its metadata.
    ///
    /// The donation row is written before the processor call. If the processor fails, the error is returned and the
    /// row is left with its placeholder transaction id for operators to triage.
    pub async fn create_qr_intent(&self, form: DonationForm, collector: Option<i64>) -> Result<QrIntent, ChannelError> {
        let draft = ValidatedForm::try_from_form(&form, true)?;
        self.db.check_references(&draft.references(collector)).await?;
        let donation_id = DonationId::random();
        let placeholder = placeholder_qr_reference();
        let new_donation =
            draft.into_new_donation(donation_id.clone(), placeholder.clone(), PaymentMethod::Qr, collector, &self.currency);
        let donation = self.db.insert_pending_donation(new_donation).await?;
        debug!("🔄️📷️ Donation {donation_id} recorded with placeholder reference {placeholder}");
        let request = QrCodeRequest {
            amount: donation.amount,
            donation_id: donation_id.clone(),
            description: format!("Donation {donation_id}"),
        };
        let qr = self.processor.create_qr_code(request).await.map_err(|e| {
            warn!(
                "🔄️📷️ QR code creation failed for donation {donation_id}. The donation remains PENDING under \
                 {placeholder}. {e}"
            );
            e
        })?;
        self.db.update_transaction_id(&donation_id, &qr.id).await?;
        let payment_uri = match qr.payment_uri {
            Some(uri) => Some(uri),
            None => self.processor.resolve_payment_uri(&qr.image_url).await,
        };
        if payment_uri.is_none() {
            debug!("🔄️📷️ No payment URI for QR code {}. Only the image will be offered.", qr.id);
        }
        info!("🔄️📷️ QR code {} issued for donation {donation_id} ({})", qr.id, donation.amount);
        Ok(QrIntent { donation_id, qr_id: qr.id, image_url: qr.image_url, payment_uri, amount: donation.amount })
    }

    /// Records a staff-collected donation directly as `SUCCESS`. The batch total is incremented in the same
    /// transaction.
    pub async fn record_manual_donation(
        &self,
        request: ManualDonationRequest,
        collector: Option<i64>,
    ) -> Result<Donation, ChannelError> {
        if request.payment_method == PaymentMethod::HostedCheckout {
            return Err(ChannelError::ValidationError(
                "Hosted checkout donations cannot be entered manually".to_string(),
            ));
        }
        let draft = ValidatedForm::try_from_form(&request.form, false)?;
        self.db.check_references(&draft.references(collector)).await?;
        let transaction_id = request
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(generated_manual_reference);
        let donation_id = DonationId::random();
        let new_donation =
            draft.into_new_donation(donation_id.clone(), transaction_id, request.payment_method, collector, &self.currency);
        let change = self.db.insert_settled_donation(new_donation).await?;
        let donation = change.current.clone().ok_or_else(|| {
            error!("🔄️✍️ Donation {donation_id} was inserted but the store did not return it.");
            LedgerError::DonationNotFound(donation_id.clone())
        })?;
        for adjustment in change.unapplied() {
            self.producers.publish_flagged(AggregateFlaggedEvent::new(donation.clone(), *adjustment)).await;
        }
        self.producers.publish_confirmed(DonationConfirmedEvent::new(donation.clone(), change.adjustments)).await;
        info!(
            "🔄️✍️ Manual {} donation {donation_id} of {} recorded by collector {collector:?}",
            donation.payment_method, donation.amount
        );
        Ok(donation)
    }
}

/// A donation form after amount, mobile and location parsing.
#[derive(Debug, Clone)]
struct ValidatedForm {
    amount: Paise,
    donor_name: Option<String>,
    mobile: Option<String>,
    hide_name: bool,
    batch_id: Option<i64>,
    unit_id: Option<i64>,
    attribution: Attribution,
    category: DonationCategory,
}

impl ValidatedForm {
    fn try_from_form(form: &DonationForm, require_mobile: bool) -> Result<Self, ChannelError> {
        let amount = form.amount.to_paise().map_err(ChannelError::ValidationError)?;
        let mobile = match form.mobile.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(m) => Some(normalize_mobile(m).map_err(ChannelError::ValidationError)?),
            None if require_mobile => {
                return Err(ChannelError::ValidationError("A mobile number is required".to_string()))
            },
            None => None,
        };
        let attribution = form
            .location
            .as_deref()
            .unwrap_or_default()
            .parse::<Attribution>()
            .map_err(|e| ChannelError::ValidationError(e.to_string()))?;
        let category = form.category.unwrap_or(match form.batch_id {
            Some(_) => DonationCategory::Batch,
            None => DonationCategory::General,
        });
        Ok(Self {
            amount,
            donor_name: form.donor_name.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from),
            mobile,
            hide_name: form.hide_name,
            batch_id: form.batch_id,
            unit_id: form.unit_id,
            attribution,
            category,
        })
    }

    fn references(&self, collector: Option<i64>) -> DonationReferences {
        DonationReferences {
            batch_id: self.batch_id,
            unit_id: self.unit_id,
            attribution: self.attribution,
            collected_by: collector,
        }
    }

    fn into_new_donation(
        self,
        donation_id: DonationId,
        transaction_id: String,
        method: PaymentMethod,
        collector: Option<i64>,
        currency: &str,
    ) -> NewDonation {
        let mut donation = NewDonation::new(donation_id, transaction_id, self.amount, method)
            .with_donor(self.donor_name, self.mobile, self.hide_name)
            .with_attribution(self.attribution)
            .with_collector(collector)
            .with_currency(currency);
        donation.batch_id = self.batch_id;
        donation.unit_id = self.unit_id;
        donation.with_category(self.category)
    }
}
