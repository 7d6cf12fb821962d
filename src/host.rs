use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use extbus_event_bus::EventBus;
use extbus_types::{
    CustomItemData, DefineCustomItemsEvent, ExtensionLoadedEvent, ExtensionUnloadedEvent,
    HostConfig, HostShutdownEvent, HostStartedEvent,
};
use parking_lot::RwLock;

use crate::extension::{Extension, ExtensionManager};

/// Owns the event bus and the extensions attached to it.
///
/// Construct one per process and pass it (or its bus) to whoever needs it.
pub struct Host {
    config: HostConfig,
    bus: EventBus,
    extensions: ExtensionManager,
    custom_items: RwLock<Vec<CustomItemData>>,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        let bus = EventBus::new(config.bus.clone());
        bus.register_event_type::<HostStartedEvent>();
        bus.register_event_type::<HostShutdownEvent>();
        bus.register_event_type::<ExtensionLoadedEvent>();
        bus.register_event_type::<ExtensionUnloadedEvent>();
        bus.register_event_type::<DefineCustomItemsEvent>();

        let extensions = ExtensionManager::new(bus.clone(), config.clone());
        Self {
            config,
            bus,
            extensions,
            custom_items: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn extensions(&self) -> &ExtensionManager {
        &self.extensions
    }

    pub fn load_extension(&self, extension: Arc<dyn Extension>) -> Result<bool> {
        self.extensions.load(extension)
    }

    /// Announce startup and collect custom item definitions from the loaded
    /// extensions.
    pub fn start(&self) -> Vec<CustomItemData> {
        let extension_count = self.extensions.loaded().len();
        self.bus.publish(&HostStartedEvent {
            started_at: Utc::now(),
            extension_count,
        });

        let define = DefineCustomItemsEvent::new();
        let report = self.bus.publish(&define);
        for failure in &report.failures {
            tracing::warn!(
                owner = %failure.owner,
                "Custom item definition failed: {}",
                failure.message
            );
        }

        let items = define.items();
        tracing::info!(
            extensions = extension_count,
            items = items.len(),
            "Host started"
        );
        *self.custom_items.write() = items.clone();
        items
    }

    pub fn custom_items(&self) -> Vec<CustomItemData> {
        self.custom_items.read().clone()
    }

    /// Unload every extension and shut the bus down.
    pub fn shutdown(&self, reason: &str) {
        self.bus.publish(&HostShutdownEvent {
            reason: reason.to_string(),
        });
        let unloaded = self.extensions.unload_all();
        let revoked = self.bus.shutdown();
        tracing::info!(unloaded, revoked, reason, "Host shut down");
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{CustomItemPack, LifecycleAudit};
    use crate::extension::ExtensionContext;
    use extbus_types::CustomItemOptions;

    fn item(name: &str) -> CustomItemData {
        CustomItemData::new(
            name,
            CustomItemOptions {
                custom_model_data: Some(7),
                ..Default::default()
            },
        )
        .unwrap()
    }

    struct Duplicator;

    impl Extension for Duplicator {
        fn name(&self) -> &str {
            "duplicator"
        }

        fn on_load(&self, ctx: &ExtensionContext) -> Result<()> {
            ctx.events().on(|event: &DefineCustomItemsEvent| {
                event.register(item("ruby"))?;
                Ok(())
            })?;
            Ok(())
        }
    }

    #[test]
    fn test_start_collects_custom_items() {
        let host = Host::default();
        let pack = CustomItemPack::new("pack", vec![item("ruby"), item("sapphire")]);
        assert!(host.load_extension(Arc::new(pack)).unwrap());

        let items = host.start();
        let names: Vec<_> = items.iter().map(|item| item.name().to_string()).collect();
        assert_eq!(names, vec!["ruby", "sapphire"]);
        assert_eq!(host.custom_items().len(), 2);
    }

    #[test]
    fn test_duplicate_item_does_not_stop_other_extensions() {
        let host = Host::default();
        host.load_extension(Arc::new(CustomItemPack::new("pack", vec![item("ruby")])))
            .unwrap();
        host.load_extension(Arc::new(Duplicator)).unwrap();

        let items = host.start();
        assert_eq!(items.len(), 1);
        assert_eq!(host.bus().stats().handler_failures, 1);
    }

    #[test]
    fn test_lifecycle_audit_sees_full_lifecycle() {
        let host = Host::default();
        let audit = Arc::new(LifecycleAudit::new());
        host.load_extension(audit.clone()).unwrap();
        host.load_extension(Arc::new(CustomItemPack::new("pack", Vec::new())))
            .unwrap();

        host.start();
        host.shutdown("test");

        let entries = audit.entries();
        assert_eq!(
            entries,
            vec![
                "loaded:lifecycle-audit",
                "loaded:pack",
                "started:2",
                "shutdown:test",
                "unloaded:pack:1",
            ]
        );
    }

    #[test]
    fn test_shutdown_revokes_everything() {
        let host = Host::default();
        host.load_extension(Arc::new(LifecycleAudit::new())).unwrap();
        assert_eq!(host.bus().subscription_count(), 4);

        host.shutdown("test");
        assert!(host.extensions().loaded().is_empty());
        assert_eq!(host.bus().subscription_count(), 0);
        assert!(host.bus().is_shut_down());
    }
}
