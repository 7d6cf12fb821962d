use extbus_types::Event;
use tokio::sync::mpsc;

use crate::core::{EventBus, PublishReport};
use crate::error::Result;
use crate::owner::Owner;
use crate::post_order::PostOrder;
use crate::subscription::Subscription;

/// A view of the bus bound to one owner.
///
/// Extensions receive one of these instead of the bare bus so every
/// subscription they create is attributed to them and torn down together.
#[derive(Clone, Debug)]
pub struct OwnerScope {
    bus: EventBus,
    owner: Owner,
}

impl OwnerScope {
    pub fn new(bus: EventBus, owner: Owner) -> Self {
        Self { bus, owner }
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe<E, F>(&self, order: PostOrder, handler: F) -> Result<Subscription>
    where
        E: Event,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.subscribe(&self.owner, order, handler)
    }

    /// Subscribe at [`PostOrder::Normal`].
    pub fn on<E, F>(&self, handler: F) -> Result<Subscription>
    where
        E: Event,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(PostOrder::Normal, handler)
    }

    pub fn subscribe_with_owner<E, F>(&self, order: PostOrder, handler: F) -> Result<Subscription>
    where
        E: Event,
        F: Fn(&Owner, &E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.subscribe_with_owner(&self.owner, order, handler)
    }

    pub fn subscribe_channel<E>(
        &self,
        order: PostOrder,
    ) -> Result<(Subscription, mpsc::UnboundedReceiver<E>)>
    where
        E: Event + Clone,
    {
        self.bus.subscribe_channel(&self.owner, order)
    }

    pub fn publish<E: Event>(&self, event: &E) -> PublishReport {
        self.bus.publish(event)
    }

    pub fn subscription_count(&self) -> usize {
        self.bus.owner_subscription_count(&self.owner)
    }

    /// Drop every subscription made through this owner.
    pub fn revoke(&self) -> usize {
        self.bus.unsubscribe_all(&self.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug)]
    struct Tick;
    impl Event for Tick {}

    #[test]
    fn test_scope_attributes_subscriptions_to_owner() {
        let bus = EventBus::default();
        let scope = bus.scope(Owner::new("clock"));
        let ticks = Arc::new(AtomicUsize::new(0));

        let ticks_clone = ticks.clone();
        let sub = scope
            .on(move |_: &Tick| {
                ticks_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        scope.subscribe(PostOrder::Late, |_: &Tick| Ok(())).unwrap();

        assert_eq!(sub.owner(), scope.owner());
        assert_eq!(sub.order(), PostOrder::Normal);
        assert_eq!(scope.subscription_count(), 2);

        scope.publish(&Tick);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        assert_eq!(scope.revoke(), 2);
        assert_eq!(scope.subscription_count(), 0);
        scope.publish(&Tick);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scope_channel_subscription() {
        let bus = EventBus::default();
        let scope = bus.scope(Owner::new("listener"));
        let (_sub, mut rx) = scope.subscribe_channel::<Tick>(PostOrder::Monitor).unwrap();

        bus.publish(&Tick);
        assert!(rx.recv().await.is_some());
    }
}
