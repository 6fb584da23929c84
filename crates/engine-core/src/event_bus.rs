use model::events::Event;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

// Event TypeId -> (subscriber id -> boxed typed sender).
type Subscribers = Arc<RwLock<HashMap<TypeId, HashMap<u64, Box<dyn Any + Send + Sync>>>>>;

/// Handle returned by `subscribe`, used to drop the subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    event_type_id: TypeId,
    subscriber_id: u64,
}

/// Progress channel between the orchestrator and its observers (CLI, UI
/// bridge). Publishing never blocks: a full subscriber channel drops the
/// event for that subscriber with a warning.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Subscribers,
    next_id: Arc<RwLock<u64>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    pub async fn subscribe<E>(&self, sender: mpsc::Sender<Arc<E>>) -> Subscription
    where
        E: Event + Clone,
    {
        let event_type_id = TypeId::of::<E>();
        let subscriber_id = {
            let mut next = self.next_id.write().await;
            let id = *next;
            *next += 1;
            id
        };

        self.subscribers
            .write()
            .await
            .entry(event_type_id)
            .or_default()
            .insert(subscriber_id, Box::new(sender));

        debug!(
            event_type = std::any::type_name::<E>(),
            subscriber_id, "subscribed"
        );

        Subscription {
            event_type_id,
            subscriber_id,
        }
    }

    pub async fn publish<E>(&self, event: E)
    where
        E: Event + Clone,
    {
        let event = Arc::new(event);
        let subscribers = self.subscribers.read().await;
        let Some(for_type) = subscribers.get(&TypeId::of::<E>()) else {
            return;
        };

        for (subscriber_id, boxed) in for_type {
            let Some(sender) = boxed.downcast_ref::<mpsc::Sender<Arc<E>>>() else {
                warn!(subscriber_id, "subscriber sender failed to downcast");
                continue;
            };
            if let Err(err) = sender.try_send(event.clone()) {
                warn!(
                    event_type = std::any::type_name::<E>(),
                    subscriber_id,
                    error = ?err,
                    "dropped event for slow subscriber"
                );
            }
        }
    }

    pub async fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(for_type) = subscribers.get_mut(&subscription.event_type_id) {
            for_type.remove(&subscription.subscriber_id);
            if for_type.is_empty() {
                subscribers.remove(&subscription.event_type_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::{
        core::identifiers::{ObjectId, ObjectKind},
        events::{MigrationPhase, ObjectProgress},
    };

    fn progress(phase: MigrationPhase) -> ObjectProgress {
        ObjectProgress {
            run_id: "run-1".into(),
            object: ObjectId::new("HR", "EMP", ObjectKind::Table),
            phase,
            detail: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::channel(8);
        let _sub = bus.subscribe::<ObjectProgress>(tx).await;

        bus.publish(progress(MigrationPhase::Deploy)).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.phase, MigrationPhase::Deploy);
    }

    #[tokio::test]
    async fn unsubscribed_channels_go_quiet() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::channel(8);
        let sub = bus.subscribe::<ObjectProgress>(tx).await;
        bus.unsubscribe(sub).await;

        bus.publish(progress(MigrationPhase::Done)).await;
        assert!(rx.try_recv().is_err());
    }
}
