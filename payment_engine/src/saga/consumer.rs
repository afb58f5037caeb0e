use std::sync::Arc;

use log::*;
use tokio::task::JoinHandle;

use crate::{
    events::{
        BusError,
        BusEvent,
        EventBus,
        Subscription,
        CHECKOUT_INIT,
        PRODUCT_VALIDATION_RESPONSE,
        USER_VALIDATION_RESPONSE,
    },
    saga::ValidationCoordinator,
};

/// Feeds the validation topics into a [`ValidationCoordinator`], with one task per topic.
pub struct ValidationConsumer;

impl ValidationConsumer {
    pub const TOPICS: [&'static str; 3] = [CHECKOUT_INIT, PRODUCT_VALIDATION_RESPONSE, USER_VALIDATION_RESPONSE];

    /// Subscribes to every validation topic and spawns the consumer tasks. Each task ends when its subscription closes.
    pub async fn start(
        bus: Arc<dyn EventBus>,
        coordinator: Arc<ValidationCoordinator>,
    ) -> Result<Vec<JoinHandle<()>>, BusError> {
        let mut handles = Vec::with_capacity(Self::TOPICS.len());
        for topic in Self::TOPICS {
            let subscription = bus.subscribe(topic).await?;
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(consume(subscription, coordinator)));
        }
        info!("🤝️ Validation consumer started on {} topics", handles.len());
        Ok(handles)
    }
}

async fn consume(mut subscription: Subscription, coordinator: Arc<ValidationCoordinator>) {
    let topic = subscription.topic().to_string();
    debug!("🤝️ Listening on {topic}");
    while let Some(envelope) = subscription.next().await {
        let event = match BusEvent::decode(&envelope) {
            Ok(event) => event,
            Err(e) => {
                warn!("🤝️ Dropping undecodable message on {topic}: {e}");
                continue;
            },
        };
        match event {
            BusEvent::CheckoutInit(init) => coordinator.begin_validation(init),
            BusEvent::ProductValidation(reply) => {
                let outcome = coordinator.on_product_reply(reply).await;
                trace!("🤝️ Product reply outcome: {outcome:?}");
            },
            BusEvent::UserValidation(reply) => {
                let outcome = coordinator.on_user_reply(reply).await;
                trace!("🤝️ User reply outcome: {outcome:?}");
            },
            other => warn!("🤝️ Unexpected {} event on {topic}. Ignoring it.", other.topic()),
        }
    }
    debug!("🤝️ Subscription to {topic} closed");
}
