use std::sync::Arc;

use log::*;

use crate::{
    db_types::{Payment, PaymentStatus},
    events::{
        BusError,
        BusEvent,
        EventBus,
        EventProducers,
        OrderCompleted,
        OrderFailed,
        PaymentAnnulledEvent,
        PaymentCreated,
        PaymentFailed,
        PaymentSettledEvent,
        PaymentStatusUpdated,
        PaymentSucceeded,
        StockReduced,
    },
};

/// Typed front for the bus. Lifecycle events for terminal payments are also forwarded to any in-process hooks.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    producers: EventProducers,
}

impl EventPublisher {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus, producers: EventProducers::default() }
    }

    pub fn with_hooks(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    pub async fn publish(&self, event: BusEvent) -> Result<(), BusError> {
        let envelope = event.to_envelope()?;
        let topic = event.topic();
        self.bus.publish(event.exchange(), topic, envelope).await?;
        debug!("📬️ Published {topic}");
        Ok(())
    }

    pub async fn payment_created(&self, payment: &Payment) -> Result<(), BusError> {
        self.publish(BusEvent::PaymentCreated(PaymentCreated::from(payment))).await
    }

    pub async fn status_updated(&self, payment: &Payment, old_status: PaymentStatus) -> Result<(), BusError> {
        self.publish(BusEvent::PaymentStatusUpdated(PaymentStatusUpdated::new(payment, old_status))).await
    }

    pub async fn payment_success(&self, payment: &Payment) -> Result<(), BusError> {
        let result = self.publish(BusEvent::PaymentSuccess(PaymentSucceeded::from(payment))).await;
        self.producers.payment_settled(PaymentSettledEvent::new(payment.clone())).await;
        result
    }

    pub async fn payment_failed(&self, payment: &Payment, reason: String) -> Result<(), BusError> {
        let result = self.publish(BusEvent::PaymentFailed(PaymentFailed::new(payment, reason))).await;
        self.producers.payment_annulled(PaymentAnnulledEvent::new(payment.clone())).await;
        result
    }

    pub async fn stock_reduced(&self, event: StockReduced) -> Result<(), BusError> {
        self.publish(BusEvent::StockReduced(event)).await
    }

    pub async fn order_completed(&self, event: OrderCompleted) -> Result<(), BusError> {
        self.publish(BusEvent::OrderCompleted(event)).await
    }

    pub async fn order_failed(&self, event: OrderFailed) -> Result<(), BusError> {
        self.publish(BusEvent::OrderFailed(event)).await
    }
}
