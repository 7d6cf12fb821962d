//! Subscription handles.
//!
//! The bus owns every piece of subscription state. A [`Subscription`] handed
//! back to callers is only an id plus a weak reference to the bus, so
//! dropping it does not unsubscribe and keeping it does not keep the bus
//! alive.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use extbus_types::Event;

use crate::core::BusInner;
use crate::owner::Owner;
use crate::post_order::PostOrder;

/// Unique identifier for event subscriptions, unique across all buses in
/// the process and increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Type identity of an event, used as the registry key.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: type_name::<E>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    /// Terminal
    Unsubscribed,
}

/// What every subscription handle can do, independent of the handler's
/// signature.
pub trait EventSubscription {
    fn is_active(&self) -> bool;

    /// Idempotent; calling it on an inactive subscription does nothing.
    fn unsubscribe(&self);

    /// Rank of the subscription's [`PostOrder`] tier.
    fn post_order(&self) -> i32;
}

/// Handle to one registered interest.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    event_type: EventType,
    owner: Owner,
    order: PostOrder,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        event_type: EventType,
        owner: Owner,
        order: PostOrder,
        bus: Weak<BusInner>,
    ) -> Self {
        Self {
            id,
            event_type,
            owner,
            order,
            bus,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn order(&self) -> PostOrder {
        self.order
    }

    pub fn state(&self) -> SubscriptionState {
        if self.is_active() {
            SubscriptionState::Active
        } else {
            SubscriptionState::Unsubscribed
        }
    }

    pub(crate) fn is_bound_to(&self, bus: &Arc<BusInner>) -> bool {
        std::ptr::eq(self.bus.as_ptr(), Arc::as_ptr(bus))
    }
}

impl EventSubscription for Subscription {
    fn is_active(&self) -> bool {
        self.bus
            .upgrade()
            .map(|bus| bus.contains(self.id))
            .unwrap_or(false)
    }

    fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }

    fn post_order(&self) -> i32 {
        self.order.rank()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("owner", &self.owner)
            .field("order", &self.order)
            .finish()
    }
}
