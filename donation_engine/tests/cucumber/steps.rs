use cucumber::{then, when};
use donation_engine::{
    db_types::{PaymentMethod, PaymentStatus, QR_PLACEHOLDER_PREFIX},
    donation_objects::{
        AmountInput,
        DonationForm,
        DonationQueryFilter,
        DonationUpdate,
        ManualDonationRequest,
        NotificationKind,
        ProcessorNotification,
        WebhookOutcome,
    },
    ChannelError,
    LedgerDatabase,
};
use dps_common::Paise;
use log::*;

use crate::cucumber::DonationWorld;

const DONOR_MOBILE: &str = "+919876543210";

fn form(rupees: i64) -> DonationForm {
    DonationForm::new(AmountInput::Number(rupees as f64)).with_mobile(DONOR_MOBILE).with_donor_name("Asha")
}

fn paid_notification(kind: NotificationKind, payment_id: &str) -> ProcessorNotification {
    ProcessorNotification {
        kind,
        payment_id: Some(payment_id.to_string()),
        order_id: None,
        qr_code_id: None,
        donation_refs: vec![],
    }
}

//--------------------------------------     Donation channels     -----------------------------------------------------
#[when(expr = "a donor starts a checkout donation '{word}' of {int} for batch '{word}'")]
async fn start_checkout(world: &mut DonationWorld, alias: String, rupees: i64, batch: String) {
    let batch_id = world.batch_id(&batch);
    let order = world
        .system()
        .channel
        .create_checkout_order(form(rupees).with_batch(batch_id), None)
        .await
        .expect("Error creating checkout order");
    debug!("🚀️ Checkout order {} created for {alias}", order.order_id);
    world.system_mut().donations.insert(alias, order.donation_id);
}

#[when(expr = "a donor tries to start a checkout donation of {int} for batch '{word}'")]
async fn try_checkout(world: &mut DonationWorld, rupees: i64, batch: String) {
    let batch_id = world.batch_id(&batch);
    let result = world.system().channel.create_checkout_order(form(rupees).with_batch(batch_id), None).await;
    world.system_mut().last_channel_error = result.err();
}

#[when(expr = "a donor requests a QR donation '{word}' of {int} with no batch")]
async fn request_qr(world: &mut DonationWorld, alias: String, rupees: i64) {
    let intent = world.system().channel.create_qr_intent(form(rupees), None).await.expect("Error creating QR intent");
    world.system_mut().donations.insert(alias, intent.donation_id);
}

#[when(expr = "a donor requests a QR donation '{word}' of {int} for batch '{word}'")]
async fn request_qr_for_batch(world: &mut DonationWorld, alias: String, rupees: i64, batch: String) {
    let batch_id = world.batch_id(&batch);
    let intent = world
        .system()
        .channel
        .create_qr_intent(form(rupees).with_batch(batch_id), None)
        .await
        .expect("Error creating QR intent");
    world.system_mut().donations.insert(alias, intent.donation_id);
}

#[when(expr = "a donor tries to request a QR donation of {int} with no batch")]
async fn try_qr(world: &mut DonationWorld, rupees: i64) {
    let result = world.system().channel.create_qr_intent(form(rupees), None).await;
    world.system_mut().last_channel_error = result.err();
}

#[when(expr = "a settled cash donation '{word}' of {int} for batch '{word}' is recorded")]
async fn record_cash(world: &mut DonationWorld, alias: String, rupees: i64, batch: String) {
    let batch_id = world.batch_id(&batch);
    let request = ManualDonationRequest {
        form: DonationForm::new(AmountInput::Number(rupees as f64)).with_batch(batch_id),
        payment_method: PaymentMethod::Cash,
        reference: None,
    };
    let donation =
        world.system().channel.record_manual_donation(request, None).await.expect("Error recording cash donation");
    world.system_mut().donations.insert(alias, donation.donation_id);
}

//--------------------------------------        Confirmation       -----------------------------------------------------
#[when(expr = "the processor notifies that the order for '{word}' was paid with payment '{word}'")]
async fn order_paid(world: &mut DonationWorld, alias: String, payment_id: String) {
    let donation = world.donation(&alias).await;
    let mut notification = paid_notification(NotificationKind::OrderPaid, &payment_id);
    notification.order_id = Some(donation.transaction_id);
    notify(world, notification).await;
}

#[when(expr = "the processor notifies that order '{word}' was paid with payment '{word}'")]
async fn unknown_order_paid(world: &mut DonationWorld, order_id: String, payment_id: String) {
    let mut notification = paid_notification(NotificationKind::OrderPaid, &payment_id);
    notification.order_id = Some(order_id);
    notify(world, notification).await;
}

#[when(expr = "the processor notifies that the QR code for '{word}' was credited with payment '{word}'")]
async fn qr_credited(world: &mut DonationWorld, alias: String, payment_id: String) {
    let donation = world.donation(&alias).await;
    let mut notification = paid_notification(NotificationKind::QrCodeCredited, &payment_id);
    notification.qr_code_id = Some(donation.transaction_id);
    notification.donation_refs = vec![donation.donation_id];
    notify(world, notification).await;
}

#[when(expr = "the processor sends a '{word}' notification for '{word}'")]
async fn other_notification(world: &mut DonationWorld, kind: String, alias: String) {
    let donation = world.donation(&alias).await;
    let mut notification = paid_notification(NotificationKind::Other(kind), "pay_ignored");
    notification.donation_refs = vec![donation.donation_id];
    notify(world, notification).await;
}

async fn notify(world: &mut DonationWorld, notification: ProcessorNotification) {
    let outcome =
        world.system().confirmation.handle_notification(notification).await.expect("Error handling notification");
    debug!("🚀️ Notification outcome: {outcome:?}");
    world.system_mut().last_outcome = Some(outcome);
}

#[when(expr = "the processor captures payment '{word}' of {int} for '{word}'")]
async fn capture(world: &mut DonationWorld, payment_id: String, rupees: i64, alias: String) {
    let donation = world.donation(&alias).await;
    world.system().processor.capture(&donation.transaction_id, &payment_id, Paise::from_rupees(rupees));
}

#[when("the processor becomes unreachable")]
async fn processor_down(world: &mut DonationWorld) {
    world.system().processor.fail_polls();
}

#[when(expr = "the donor polls the status of '{word}'")]
async fn poll(world: &mut DonationWorld, alias: String) {
    let id = world.donation_id(&alias);
    let report = world.system().confirmation.poll_status(&id).await.expect("Error polling donation status");
    world.system_mut().last_status = Some(report.status.to_string());
}

#[when(expr = "donation '{word}' is confirmed with payment '{word}'")]
async fn confirm(world: &mut DonationWorld, alias: String, payment_id: String) {
    let id = world.donation_id(&alias);
    world.system().reconciliation.confirm_success(&id, Some(&payment_id)).await.expect("Error confirming donation");
}

//--------------------------------------       Administration      -----------------------------------------------------
#[when(expr = "an admin sets the status of '{word}' to {word}")]
async fn override_status(world: &mut DonationWorld, alias: String, status: String) {
    let id = world.donation_id(&alias);
    let status = status.parse::<PaymentStatus>().expect("Invalid status");
    world.system().reconciliation.override_status(&id, status).await.expect("Error overriding status");
}

#[when(expr = "an admin changes the amount of '{word}' to {int}")]
async fn edit_amount(world: &mut DonationWorld, alias: String, rupees: i64) {
    let id = world.donation_id(&alias);
    let update = DonationUpdate::default().with_amount(Paise::from_rupees(rupees));
    world.system().reconciliation.edit_donation(&id, update).await.expect("Error editing donation");
}

#[when(expr = "an admin moves '{word}' to batch '{word}'")]
async fn move_batch(world: &mut DonationWorld, alias: String, batch: String) {
    let id = world.donation_id(&alias);
    let batch_id = world.batch_id(&batch);
    let update = DonationUpdate::default().with_batch(Some(batch_id));
    world.system().reconciliation.edit_donation(&id, update).await.expect("Error moving donation");
}

#[when(expr = "an admin deletes donation '{word}'")]
async fn delete(world: &mut DonationWorld, alias: String) {
    let id = world.donation_id(&alias);
    world.system().reconciliation.delete_donation(&id).await.expect("Error deleting donation");
}

#[when(expr = "batch '{word}' is deleted")]
async fn delete_batch(world: &mut DonationWorld, batch: String) {
    let batch_id = world.batch_id(&batch);
    let deleted = world.system().db.delete_batch(batch_id).await.expect("Error deleting batch");
    assert!(deleted, "Batch {batch} was not deleted");
}

#[when(expr = "an admin repairs batch '{word}'")]
async fn repair(world: &mut DonationWorld, batch: String) {
    let batch_id = world.batch_id(&batch);
    world.system().reconciliation.repair_batch_total(batch_id).await.expect("Error repairing batch");
}

//--------------------------------------         Assertions        -----------------------------------------------------
#[then(expr = "donation '{word}' is {word}")]
async fn donation_status(world: &mut DonationWorld, alias: String, status: String) {
    let donation = world.donation(&alias).await;
    assert_eq!(donation.payment_status.to_string(), status);
}

#[then(expr = "donation '{word}' has transaction id '{word}'")]
async fn donation_txid(world: &mut DonationWorld, alias: String, txid: String) {
    let donation = world.donation(&alias).await;
    assert_eq!(donation.transaction_id, txid);
}

#[then(expr = "donation '{word}' references a QR code")]
async fn donation_has_qr(world: &mut DonationWorld, alias: String) {
    let donation = world.donation(&alias).await;
    assert!(donation.transaction_id.starts_with("qr_"));
    assert!(!donation.transaction_id.starts_with(QR_PLACEHOLDER_PREFIX));
}

#[then(expr = "batch '{word}' has a total of {int}")]
async fn batch_total(world: &mut DonationWorld, batch: String, rupees: i64) {
    let batch = world.batch(&batch).await;
    assert_eq!(batch.total_amount, Paise::from_rupees(rupees), "Unexpected total for batch {}", batch.name);
}

#[then("all batch totals agree with the ledger")]
async fn totals_agree(world: &mut DonationWorld) {
    let audits = world.system().reconciliation.audit_batch_totals().await.expect("Error auditing batches");
    for audit in audits {
        assert!(audit.is_consistent(), "Batch {} has drifted by {}", audit.name, audit.drift());
    }
}

#[then(expr = "the notification outcome is {word}")]
async fn notification_outcome(world: &mut DonationWorld, expected: String) {
    let outcome = world.system().last_outcome.clone().expect("No notification was handled");
    let name = match outcome {
        WebhookOutcome::Confirmed(_) => "Confirmed",
        WebhookOutcome::AlreadySettled(_) => "AlreadySettled",
        WebhookOutcome::UnknownDonation => "UnknownDonation",
        WebhookOutcome::Ignored(_) => "Ignored",
    };
    assert_eq!(name, expected);
}

#[then(expr = "the reported status is {word}")]
async fn reported_status(world: &mut DonationWorld, expected: String) {
    let status = world.system().last_status.clone().expect("No status was polled");
    assert_eq!(status, expected);
}

#[then("the channel reports a processor error")]
async fn processor_error(world: &mut DonationWorld) {
    let err = world.system().last_channel_error.as_ref().expect("No channel error was recorded");
    assert!(matches!(err, ChannelError::ProcessorError(_)), "Unexpected error: {err}");
}

#[then(expr = "there are {int} donations in the ledger")]
async fn donation_count(world: &mut DonationWorld, count: usize) {
    let donations =
        world.system().db.search_donations(DonationQueryFilter::default()).await.expect("Error searching donations");
    assert_eq!(donations.len(), count);
}

#[then(expr = "there is {int} pending donation with a placeholder reference")]
async fn placeholder_count(world: &mut DonationWorld, count: usize) {
    let filter = DonationQueryFilter::default().with_status(PaymentStatus::Pending);
    let donations = world.system().db.search_donations(filter).await.expect("Error searching donations");
    let placeholders = donations.iter().filter(|d| d.transaction_id.starts_with(QR_PLACEHOLDER_PREFIX)).count();
    assert_eq!(placeholders, count);
}

#[then(expr = "there is {int} open reconciliation flag")]
async fn open_flags(world: &mut DonationWorld, count: usize) {
    let flags = world.system().reconciliation.reconciliation_flags(false).await.expect("Error fetching flags");
    assert_eq!(flags.len(), count);
}
