use cucumber::given;

use crate::cucumber::{donation_world::DonationSystem, DonationWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut DonationWorld) {
    let system = DonationSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a batch '{word}'")]
async fn a_batch(world: &mut DonationWorld, name: String) {
    let slug = name.to_lowercase();
    let batch = world.system().db.create_batch(&name, &slug).await.expect("Error creating batch");
    world.system_mut().batches.insert(name, batch.id);
}

#[given("the processor refuses to create orders")]
async fn refuse_orders(world: &mut DonationWorld) {
    world.system().processor.fail_orders();
}

#[given("the processor refuses to create QR codes")]
async fn refuse_qr_codes(world: &mut DonationWorld) {
    world.system().processor.fail_qr_codes();
}
