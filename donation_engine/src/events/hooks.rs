use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{AggregateFlaggedEvent, DonationConfirmedEvent, DonationModifiedEvent, EventHandler, EventProducer, Handler};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub donation_confirmed_producer: Vec<EventProducer<DonationConfirmedEvent>>,
    pub donation_modified_producer: Vec<EventProducer<DonationModifiedEvent>>,
    pub aggregate_flagged_producer: Vec<EventProducer<AggregateFlaggedEvent>>,
}

impl EventProducers {
    pub async fn publish_confirmed(&self, event: DonationConfirmedEvent) {
        for producer in &self.donation_confirmed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_modified(&self, event: DonationModifiedEvent) {
        for producer in &self.donation_modified_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_flagged(&self, event: AggregateFlaggedEvent) {
        for producer in &self.aggregate_flagged_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_donation_confirmed: Option<EventHandler<DonationConfirmedEvent>>,
    pub on_donation_modified: Option<EventHandler<DonationModifiedEvent>>,
    pub on_aggregate_flagged: Option<EventHandler<AggregateFlaggedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_donation_confirmed = hooks.on_donation_confirmed.map(|f| EventHandler::new(buffer_size, f));
        let on_donation_modified = hooks.on_donation_modified.map(|f| EventHandler::new(buffer_size, f));
        let on_aggregate_flagged = hooks.on_aggregate_flagged.map(|f| EventHandler::new(buffer_size, f));
        Self { on_donation_confirmed, on_donation_modified, on_aggregate_flagged }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_donation_confirmed {
            result.donation_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_donation_modified {
            result.donation_modified_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_aggregate_flagged {
            result.aggregate_flagged_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_donation_confirmed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_donation_modified {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_aggregate_flagged {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_donation_confirmed: Option<Handler<DonationConfirmedEvent>>,
    pub on_donation_modified: Option<Handler<DonationModifiedEvent>>,
    pub on_aggregate_flagged: Option<Handler<AggregateFlaggedEvent>>,
}

impl EventHooks {
    pub fn on_donation_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DonationConfirmedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_donation_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_donation_modified<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DonationModifiedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_donation_modified = Some(Arc::new(f));
        self
    }

    pub fn on_aggregate_flagged<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AggregateFlaggedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_aggregate_flagged = Some(Arc::new(f));
        self
    }
}
