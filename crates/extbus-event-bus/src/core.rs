//! Core Event Bus Implementation
//!
//! Typed, priority-ordered, synchronous dispatch:
//! - Subscription lifecycle management (subscribe/unsubscribe/unsubscribe_all)
//! - Snapshot-based dispatch that tolerates concurrent mutation and reentrancy
//! - Handler failure isolation
//! - Performance metrics
//!
//! Lock order is always index -> bucket. No lock is held while a handler runs.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use extbus_types::{Event, EventBusConfig};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{EventBusError, Result};
use crate::owner::Owner;
use crate::post_order::PostOrder;
use crate::registry::{ErasedHandler, Registration, SubscriberRegistry};
use crate::scope::OwnerScope;
use crate::subscription::{EventType, Subscription, SubscriptionId};

/// Statistics for event bus performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBusStats {
    /// Total number of events published
    pub events_published: usize,
    /// Total number of handler invocations, failed ones included
    pub events_delivered: usize,
    /// Handlers that returned an error or panicked
    pub handler_failures: usize,
    /// Current number of active subscriptions
    pub active_subscriptions: usize,
    /// Total number of subscriptions created
    pub total_subscriptions: usize,
    /// Subscriptions removed individually, by owner, or by shutdown
    pub revocations: usize,
}

/// A handler that failed during one dispatch pass.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub subscription: SubscriptionId,
    pub event_type: &'static str,
    pub owner: Owner,
    pub order: PostOrder,
    pub message: String,
}

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    /// Handlers that were started
    pub invoked: usize,
    /// Snapshot entries revoked before their turn came
    pub skipped: usize,
    pub failures: Vec<HandlerFailure>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct SubscriptionIndex {
    by_id: HashMap<SubscriptionId, Arc<Registration>>,
    by_owner: HashMap<Owner, HashSet<SubscriptionId>>,
    known_types: HashSet<TypeId>,
    shut_down: bool,
}

impl SubscriptionIndex {
    fn forget_owner_entry(&mut self, registration: &Registration) {
        if let Some(ids) = self.by_owner.get_mut(&registration.owner) {
            ids.remove(&registration.id);
            if ids.is_empty() {
                self.by_owner.remove(&registration.owner);
            }
        }
    }
}

#[derive(Default)]
struct Counters {
    events_published: AtomicUsize,
    events_delivered: AtomicUsize,
    handler_failures: AtomicUsize,
    total_subscriptions: AtomicUsize,
    revocations: AtomicUsize,
}

pub(crate) struct BusInner {
    config: EventBusConfig,
    registry: SubscriberRegistry,
    index: Mutex<SubscriptionIndex>,
    counters: Counters,
    /// Mirrors `SubscriptionIndex::shut_down` for the publish path
    closed: AtomicBool,
}

impl BusInner {
    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.index.lock().by_id.contains_key(&id)
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut index = self.index.lock();
        let Some(registration) = index.by_id.remove(&id) else {
            return false;
        };
        index.forget_owner_entry(&registration);
        registration.deactivate();
        self.registry.remove(&registration);
        self.counters.revocations.fetch_add(1, Ordering::Relaxed);

        log::trace!(
            "[EventBus] Unsubscribed: {:?} ({}, owner: {})",
            id,
            registration.event_type.name(),
            registration.owner
        );
        true
    }

    fn remove_owner(&self, owner: &Owner) -> usize {
        let mut index = self.index.lock();
        let Some(ids) = index.by_owner.remove(owner) else {
            return 0;
        };
        let registrations: Vec<Arc<Registration>> = ids
            .iter()
            .filter_map(|id| index.by_id.remove(id))
            .collect();

        // Flip every flag before touching buckets so an in-progress pass
        // cannot start any of them once we return.
        for registration in &registrations {
            registration.deactivate();
        }
        for registration in &registrations {
            self.registry.remove(registration);
        }
        self.counters
            .revocations
            .fetch_add(registrations.len(), Ordering::Relaxed);
        registrations.len()
    }
}

/// Typed event bus shared by the host and its extensions.
///
/// Cloning is cheap and every clone refers to the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new(config: EventBusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                config,
                registry: SubscriberRegistry::new(),
                index: Mutex::new(SubscriptionIndex::default()),
                counters: Counters::default(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.inner.config
    }

    /// Mark `E` as a recognized event type. Only consulted when
    /// `strict_event_types` is enabled.
    pub fn register_event_type<E: Event>(&self) {
        let event_type = EventType::of::<E>();
        if self.inner.index.lock().known_types.insert(event_type.id()) {
            log::debug!("[EventBus] Registered event type {}", event_type.name());
        }
    }

    /// Subscribe `handler` to every published `E`.
    ///
    /// Registering the same handler twice yields two independent
    /// subscriptions.
    pub fn subscribe<E, F>(
        &self,
        owner: &Owner,
        order: PostOrder,
        handler: F,
    ) -> Result<Subscription>
    where
        E: Event,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let erased: ErasedHandler =
            Box::new(move |event: &dyn Any| match event.downcast_ref::<E>() {
                Some(event) => handler(event),
                None => Err(anyhow::anyhow!(
                    "event is not a {}",
                    std::any::type_name::<E>()
                )),
            });
        self.register(EventType::of::<E>(), owner, order, erased)
    }

    /// Like [`EventBus::subscribe`], but the handler also receives its owner.
    pub fn subscribe_with_owner<E, F>(
        &self,
        owner: &Owner,
        order: PostOrder,
        handler: F,
    ) -> Result<Subscription>
    where
        E: Event,
        F: Fn(&Owner, &E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let bound = owner.clone();
        self.subscribe(owner, order, move |event: &E| handler(&bound, event))
    }

    /// Forward clones of every `E` into an unbounded channel.
    ///
    /// Once the receiver is dropped the handler keeps its slot but does
    /// nothing; unsubscribe to release it.
    pub fn subscribe_channel<E>(
        &self,
        owner: &Owner,
        order: PostOrder,
    ) -> Result<(Subscription, mpsc::UnboundedReceiver<E>)>
    where
        E: Event + Clone,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(owner, order, move |event: &E| {
            let _ = tx.send(event.clone());
            Ok(())
        })?;
        Ok((subscription, rx))
    }

    fn register(
        &self,
        event_type: EventType,
        owner: &Owner,
        order: PostOrder,
        handler: ErasedHandler,
    ) -> Result<Subscription> {
        if !owner.is_valid() {
            return Err(EventBusError::InvalidArgument(
                "owner name must not be empty".to_string(),
            ));
        }

        let mut index = self.inner.index.lock();
        if index.shut_down {
            return Err(EventBusError::ShutDown);
        }
        if self.inner.config.strict_event_types && !index.known_types.contains(&event_type.id()) {
            return Err(EventBusError::InvalidArgument(format!(
                "event type {} is not registered",
                event_type.name()
            )));
        }

        let id = SubscriptionId::new();
        let registration = Arc::new(Registration::new(
            id,
            event_type,
            owner.clone(),
            order,
            handler,
        ));
        self.inner.registry.insert(registration.clone());
        index.by_id.insert(id, registration);
        index.by_owner.entry(owner.clone()).or_default().insert(id);
        drop(index);

        self.inner
            .counters
            .total_subscriptions
            .fetch_add(1, Ordering::Relaxed);

        log::trace!(
            "[EventBus] New subscription: {:?} on {} (owner: {}, order: {})",
            id,
            event_type.name(),
            owner,
            order
        );
        Ok(Subscription::new(
            id,
            event_type,
            owner.clone(),
            order,
            Arc::downgrade(&self.inner),
        ))
    }

    /// Unsubscribe using a handle.
    ///
    /// Returns true if this call removed the subscription; repeats and
    /// handles from another bus return false.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        if !subscription.is_bound_to(&self.inner) {
            log::warn!(
                "[EventBus] Ignoring unsubscribe for {:?}: handle belongs to another bus",
                subscription.id()
            );
            return false;
        }
        self.inner.remove(subscription.id())
    }

    pub fn unsubscribe_id(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    /// Revoke every subscription created by `owner`.
    ///
    /// Once this returns, none of them will be started again, including by a
    /// dispatch pass that is already running. Returns how many were revoked.
    pub fn unsubscribe_all(&self, owner: &Owner) -> usize {
        let revoked = self.inner.remove_owner(owner);
        if revoked > 0 {
            log::debug!(
                "[EventBus] Revoked {} subscriptions owned by {}",
                revoked,
                owner
            );
        }
        revoked
    }

    /// Publish an event to all active subscribers of its type.
    ///
    /// Handlers run on the calling thread in ascending rank order, FIFO within
    /// a rank. Failures are logged and collected; they never stop the pass.
    pub fn publish<E: Event>(&self, event: &E) -> PublishReport {
        let event_type = EventType::of::<E>();
        if self.inner.closed.load(Ordering::Acquire) {
            log::trace!("[EventBus] Dropping {}: bus is shut down", event_type.name());
            return PublishReport::default();
        }
        self.inner
            .counters
            .events_published
            .fetch_add(1, Ordering::Relaxed);

        let snapshot = self.inner.registry.snapshot(event_type.id());
        let mut report = PublishReport::default();
        if snapshot.is_empty() {
            log::trace!("[EventBus] No subscribers for {}", event_type.name());
            return report;
        }

        for registration in &snapshot {
            // Revoked after the snapshot was taken
            if !registration.is_active() {
                report.skipped += 1;
                continue;
            }

            let started = Instant::now();
            let outcome = self.invoke(registration, event);
            report.invoked += 1;
            self.inner
                .counters
                .events_delivered
                .fetch_add(1, Ordering::Relaxed);

            if let Err(err) = outcome {
                self.inner
                    .counters
                    .handler_failures
                    .fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "[EventBus] Handler {:?} for {} (owner: {}, order: {}) failed: {:#}",
                    registration.id,
                    event_type.name(),
                    registration.owner,
                    registration.order,
                    err
                );
                report.failures.push(HandlerFailure {
                    subscription: registration.id,
                    event_type: event_type.name(),
                    owner: registration.owner.clone(),
                    order: registration.order,
                    message: format!("{:#}", err),
                });
            }

            if let Some(limit) = self.inner.config.slow_handler_warn_ms {
                let elapsed = started.elapsed();
                if elapsed.as_millis() >= u128::from(limit) {
                    log::warn!(
                        "[EventBus] Slow handler {:?} for {} (owner: {}) took {:?}",
                        registration.id,
                        event_type.name(),
                        registration.owner,
                        elapsed
                    );
                }
            }
        }

        log::debug!(
            "[EventBus] Published {} to {} subscribers ({} skipped, {} failed)",
            event_type.name(),
            report.invoked,
            report.skipped,
            report.failures.len()
        );
        report
    }

    fn invoke<E: Event>(&self, registration: &Registration, event: &E) -> anyhow::Result<()> {
        let event: &dyn Any = event;
        if !self.inner.config.catch_panics {
            return registration.call(event);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| registration.call(event))) {
            Ok(result) => result,
            Err(payload) => Err(anyhow::anyhow!(
                "handler panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }

    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.inner.contains(id)
    }

    /// Number of subscriptions currently stored for `E`.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.inner.registry.subscriber_count(TypeId::of::<E>())
    }

    /// Number of active subscriptions across all event types.
    pub fn subscription_count(&self) -> usize {
        self.inner.index.lock().by_id.len()
    }

    pub fn owner_subscription_count(&self, owner: &Owner) -> usize {
        self.inner
            .index
            .lock()
            .by_owner
            .get(owner)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    /// Get current statistics
    pub fn stats(&self) -> EventBusStats {
        let counters = &self.inner.counters;
        EventBusStats {
            events_published: counters.events_published.load(Ordering::Relaxed),
            events_delivered: counters.events_delivered.load(Ordering::Relaxed),
            handler_failures: counters.handler_failures.load(Ordering::Relaxed),
            active_subscriptions: self.subscription_count(),
            total_subscriptions: counters.total_subscriptions.load(Ordering::Relaxed),
            revocations: counters.revocations.load(Ordering::Relaxed),
        }
    }

    /// An owner-bound view of this bus.
    pub fn scope(&self, owner: Owner) -> OwnerScope {
        OwnerScope::new(self.clone(), owner)
    }

    /// Revoke everything and refuse new subscriptions.
    ///
    /// Publishing afterwards is a no-op. Returns how many subscriptions were
    /// revoked; calling it again returns 0.
    pub fn shutdown(&self) -> usize {
        let mut index = self.inner.index.lock();
        if index.shut_down {
            return 0;
        }
        index.shut_down = true;
        self.inner.closed.store(true, Ordering::Release);
        index.by_owner.clear();
        let registrations: Vec<Arc<Registration>> =
            index.by_id.drain().map(|(_, registration)| registration).collect();
        for registration in &registrations {
            registration.deactivate();
        }
        self.inner.registry.clear();
        drop(index);

        self.inner
            .counters
            .revocations
            .fetch_add(registrations.len(), Ordering::Relaxed);
        log::info!(
            "[EventBus] Shut down, revoked {} subscriptions",
            registrations.len()
        );
        registrations.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.index.lock().shut_down
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.inner.config)
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
