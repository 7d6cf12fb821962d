//! Extension lifecycle on top of the event bus.
//!
//! Every loaded extension gets a fresh [`Owner`] and an [`OwnerScope`]; on
//! unload all of its subscriptions are revoked in one step.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use extbus_event_bus::{EventBus, Owner, OwnerScope};
use extbus_types::{ExtensionLoadedEvent, ExtensionUnloadedEvent, HostConfig};
use parking_lot::{Mutex, RwLock};

/// Implemented by everything the host can load.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    /// Register subscriptions here. If this fails, whatever was subscribed
    /// so far is revoked again.
    fn on_load(&self, ctx: &ExtensionContext) -> Result<()>;

    /// Called before the extension's subscriptions are revoked.
    fn on_unload(&self, _ctx: &ExtensionContext) -> Result<()> {
        Ok(())
    }
}

/// What an extension sees of the host.
#[derive(Clone, Debug)]
pub struct ExtensionContext {
    name: String,
    events: OwnerScope,
}

impl ExtensionContext {
    fn new(name: String, events: OwnerScope) -> Self {
        Self { name, events }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &Owner {
        self.events.owner()
    }

    /// Subscriptions made here belong to this extension.
    pub fn events(&self) -> &OwnerScope {
        &self.events
    }

    pub fn bus(&self) -> &EventBus {
        self.events.bus()
    }
}

struct LoadedExtension {
    extension: Arc<dyn Extension>,
    context: ExtensionContext,
    loaded_at: DateTime<Utc>,
}

/// Loads and unloads extensions in registration order.
pub struct ExtensionManager {
    bus: EventBus,
    config: HostConfig,
    extensions: RwLock<Vec<LoadedExtension>>,
    loading: Mutex<HashSet<String>>,
}

impl ExtensionManager {
    pub fn new(bus: EventBus, config: HostConfig) -> Self {
        Self {
            bus,
            config,
            extensions: RwLock::new(Vec::new()),
            loading: Mutex::new(HashSet::new()),
        }
    }

    /// Load an extension.
    ///
    /// Returns `Ok(false)` when the extension is disabled in the config.
    pub fn load(&self, extension: Arc<dyn Extension>) -> Result<bool> {
        let name = extension.name().to_string();
        if name.trim().is_empty() {
            bail!("Extension name must not be empty");
        }
        if !self.config.is_extension_enabled(&name) {
            log::info!("[ExtensionManager] Extension {} is disabled, skipping", name);
            return Ok(false);
        }
        self.reserve(&name)?;

        let owner = Owner::new(name.clone());
        let context = ExtensionContext::new(name.clone(), self.bus.scope(owner));
        let result = extension.on_load(&context);
        if let Err(err) = result {
            let revoked = context.events().revoke();
            self.loading.lock().remove(&name);
            log::error!(
                "[ExtensionManager] Failed to load {} (revoked {} subscriptions): {:#}",
                name,
                revoked,
                err
            );
            return Err(err.context(format!("Failed to load extension {}", name)));
        }

        let loaded_at = Utc::now();
        let subscriptions = context.events().subscription_count();
        self.extensions.write().push(LoadedExtension {
            extension,
            context,
            loaded_at,
        });
        self.loading.lock().remove(&name);

        log::info!(
            "[ExtensionManager] Loaded {} with {} subscriptions",
            name,
            subscriptions
        );
        self.bus.publish(&ExtensionLoadedEvent { name, loaded_at });
        Ok(true)
    }

    fn reserve(&self, name: &str) -> Result<()> {
        let extensions = self.extensions.read();
        let mut loading = self.loading.lock();
        if extensions.iter().any(|loaded| loaded.context.name() == name)
            || !loading.insert(name.to_string())
        {
            bail!("Extension {} is already loaded", name);
        }
        Ok(())
    }

    /// Unload an extension and revoke all of its subscriptions.
    ///
    /// Unknown names are a no-op and return false. The subscriptions are
    /// revoked even if `on_unload` fails.
    pub fn unload(&self, name: &str) -> bool {
        let removed = {
            let mut extensions = self.extensions.write();
            let index = extensions
                .iter()
                .position(|loaded| loaded.context.name() == name);
            index.map(|index| extensions.remove(index))
        };
        let Some(loaded) = removed else {
            log::debug!("[ExtensionManager] Extension {} is not loaded", name);
            return false;
        };

        if let Err(err) = loaded.extension.on_unload(&loaded.context) {
            log::warn!(
                "[ExtensionManager] {} failed during unload: {:#}",
                name,
                err
            );
        }
        let revoked = loaded.context.events().revoke();

        log::info!(
            "[ExtensionManager] Unloaded {} (revoked {} subscriptions, loaded at {})",
            name,
            revoked,
            loaded.loaded_at
        );
        self.bus.publish(&ExtensionUnloadedEvent {
            name: name.to_string(),
            revoked_subscriptions: revoked,
        });
        true
    }

    /// Unload everything, most recently loaded first.
    pub fn unload_all(&self) -> usize {
        let names: Vec<String> = self.loaded().into_iter().rev().collect();
        names.iter().filter(|name| self.unload(name)).count()
    }

    pub fn loaded(&self) -> Vec<String> {
        self.extensions
            .read()
            .iter()
            .map(|loaded| loaded.context.name().to_string())
            .collect()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.extensions
            .read()
            .iter()
            .any(|loaded| loaded.context.name() == name)
    }

    pub fn owner_of(&self, name: &str) -> Option<Owner> {
        self.extensions
            .read()
            .iter()
            .find(|loaded| loaded.context.name() == name)
            .map(|loaded| loaded.context.owner().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extbus_event_bus::PostOrder;
    use extbus_types::{Event, ExtensionConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ping;
    impl Event for Ping {}

    struct Counter {
        name: &'static str,
        hits: Arc<AtomicUsize>,
        fail_after_subscribe: bool,
    }

    impl Counter {
        fn new(name: &'static str) -> (Arc<Self>, Arc<AtomicUsize>) {
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = Arc::new(Self {
                name,
                hits: hits.clone(),
                fail_after_subscribe: false,
            });
            (counter, hits)
        }
    }

    impl Extension for Counter {
        fn name(&self) -> &str {
            self.name
        }

        fn on_load(&self, ctx: &ExtensionContext) -> Result<()> {
            let hits = self.hits.clone();
            ctx.events().subscribe(PostOrder::Normal, move |_: &Ping| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })?;
            if self.fail_after_subscribe {
                bail!("broken extension");
            }
            Ok(())
        }
    }

    #[test]
    fn test_load_and_unload() {
        let bus = EventBus::default();
        let manager = ExtensionManager::new(bus.clone(), HostConfig::default());
        let (counter, hits) = Counter::new("counter");

        assert!(manager.load(counter).unwrap());
        assert!(manager.is_loaded("counter"));
        bus.publish(&Ping);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(manager.unload("counter"));
        assert!(!manager.unload("counter"));
        bus.publish(&Ping);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_duplicate_load_rejected() {
        let manager = ExtensionManager::new(EventBus::default(), HostConfig::default());
        let (first, _) = Counter::new("counter");
        let (second, _) = Counter::new("counter");

        manager.load(first).unwrap();
        assert!(manager.load(second).is_err());
        assert_eq!(manager.loaded(), vec!["counter".to_string()]);
    }

    #[test]
    fn test_failed_load_revokes_partial_subscriptions() {
        let bus = EventBus::default();
        let manager = ExtensionManager::new(bus.clone(), HostConfig::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let broken = Arc::new(Counter {
            name: "broken",
            hits: hits.clone(),
            fail_after_subscribe: true,
        });

        let err = manager.load(broken).unwrap_err();
        assert!(format!("{:#}", err).contains("broken extension"));
        assert!(!manager.is_loaded("broken"));
        assert_eq!(bus.subscription_count(), 0);

        bus.publish(&Ping);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let (retry, _) = Counter::new("broken");
        assert!(manager.load(retry).unwrap());
    }

    #[test]
    fn test_disabled_extension_is_skipped() {
        let mut config = HostConfig::default();
        config
            .extensions
            .insert("counter".to_string(), ExtensionConfig { enabled: false });
        let manager = ExtensionManager::new(EventBus::default(), config);
        let (counter, _) = Counter::new("counter");

        assert!(!manager.load(counter).unwrap());
        assert!(manager.loaded().is_empty());
    }

    #[test]
    fn test_unload_all_in_reverse_order() {
        let bus = EventBus::default();
        let manager = ExtensionManager::new(bus.clone(), HostConfig::default());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let order_clone = order.clone();
        let listener = Owner::new("listener");
        bus.subscribe(&listener, PostOrder::Monitor, move |event: &ExtensionUnloadedEvent| {
            order_clone.lock().push(event.name.clone());
            Ok(())
        })
        .unwrap();

        manager.load(Counter::new("a").0).unwrap();
        manager.load(Counter::new("b").0).unwrap();

        assert_eq!(manager.unload_all(), 2);
        assert_eq!(*order.lock(), vec!["b".to_string(), "a".to_string()]);
    }
}
