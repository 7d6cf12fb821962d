//! Per-event-type storage of subscriptions.
//!
//! Each bucket is kept sorted by `(rank, insertion)`: a new entry goes after
//! every entry with rank <= its own, so equal ranks stay FIFO. Buckets are
//! guarded by their own lock; dispatch only holds it long enough to clone the
//! entry list.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::owner::Owner;
use crate::post_order::PostOrder;
use crate::subscription::{EventType, SubscriptionId};

pub(crate) type ErasedHandler = Box<dyn Fn(&dyn Any) -> anyhow::Result<()> + Send + Sync>;

/// Bus-side record of one subscription.
pub(crate) struct Registration {
    pub(crate) id: SubscriptionId,
    pub(crate) event_type: EventType,
    pub(crate) owner: Owner,
    pub(crate) order: PostOrder,
    active: AtomicBool,
    handler: ErasedHandler,
}

impl Registration {
    pub(crate) fn new(
        id: SubscriptionId,
        event_type: EventType,
        owner: Owner,
        order: PostOrder,
        handler: ErasedHandler,
    ) -> Self {
        Self {
            id,
            event_type,
            owner,
            order,
            active: AtomicBool::new(true),
            handler,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns true only for the call that performed the transition.
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn call(&self, event: &dyn Any) -> anyhow::Result<()> {
        (self.handler)(event)
    }
}

#[derive(Default)]
struct Bucket {
    entries: Mutex<Vec<Arc<Registration>>>,
}

impl Bucket {
    fn insert(&self, registration: Arc<Registration>) {
        let mut entries = self.entries.lock();
        let rank = registration.order.rank();
        let position = entries.partition_point(|entry| entry.order.rank() <= rank);
        entries.insert(position, registration);
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|entry| entry.id == id) {
            Some(position) => {
                entries.remove(position);
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Vec<Arc<Registration>> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.is_active())
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    buckets: RwLock<HashMap<TypeId, Arc<Bucket>>>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, event_type: TypeId) -> Option<Arc<Bucket>> {
        self.buckets.read().get(&event_type).cloned()
    }

    fn bucket_or_create(&self, event_type: TypeId) -> Arc<Bucket> {
        if let Some(bucket) = self.bucket(event_type) {
            return bucket;
        }
        self.buckets.write().entry(event_type).or_default().clone()
    }

    pub(crate) fn insert(&self, registration: Arc<Registration>) {
        self.bucket_or_create(registration.event_type.id())
            .insert(registration);
    }

    /// Removing a registration that is not in its bucket is a no-op. A bucket
    /// left empty is dropped.
    ///
    /// Callers serialize `insert` and `remove` under the bus index lock, so an
    /// empty bucket cannot gain an entry between the check and the drop.
    pub(crate) fn remove(&self, registration: &Registration) -> bool {
        let event_type = registration.event_type.id();
        let Some(bucket) = self.bucket(event_type) else {
            return false;
        };
        let removed = bucket.remove(registration.id);
        if removed && bucket.len() == 0 {
            self.buckets.write().remove(&event_type);
        }
        removed
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    /// Ordered point-in-time copy of the active entries for one event type.
    pub(crate) fn snapshot(&self, event_type: TypeId) -> Vec<Arc<Registration>> {
        self.bucket(event_type)
            .map(|bucket| bucket.snapshot())
            .unwrap_or_default()
    }

    pub(crate) fn subscriber_count(&self, event_type: TypeId) -> usize {
        self.bucket(event_type)
            .map(|bucket| bucket.len())
            .unwrap_or(0)
    }

    pub(crate) fn clear(&self) {
        self.buckets.write().clear();
    }
}
