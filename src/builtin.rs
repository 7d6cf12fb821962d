//! Extensions shipped with the host.

use std::sync::Arc;

use anyhow::Result;
use extbus_event_bus::PostOrder;
use extbus_types::{
    CustomItemData, DefineCustomItemsEvent, ExtensionLoadedEvent, ExtensionUnloadedEvent,
    HostShutdownEvent, HostStartedEvent,
};
use parking_lot::Mutex;

use crate::extension::{Extension, ExtensionContext};

/// Contributes a fixed set of custom items at startup.
pub struct CustomItemPack {
    name: String,
    items: Vec<CustomItemData>,
}

impl CustomItemPack {
    pub fn new(name: impl Into<String>, items: Vec<CustomItemData>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

impl Extension for CustomItemPack {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_load(&self, ctx: &ExtensionContext) -> Result<()> {
        let items = self.items.clone();
        ctx.events()
            .on(move |event: &DefineCustomItemsEvent| {
                for item in &items {
                    event.register(item.clone())?;
                }
                Ok(())
            })?;
        Ok(())
    }
}

/// Records host and extension lifecycle events at the monitor tier.
#[derive(Default)]
pub struct LifecycleAudit {
    entries: Arc<Mutex<Vec<String>>>,
}

impl LifecycleAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

impl Extension for LifecycleAudit {
    fn name(&self) -> &str {
        "lifecycle-audit"
    }

    fn on_load(&self, ctx: &ExtensionContext) -> Result<()> {
        let events = ctx.events();

        let entries = self.entries.clone();
        events.subscribe(PostOrder::Monitor, move |event: &HostStartedEvent| {
            tracing::debug!(extensions = event.extension_count, "audit: host started");
            entries
                .lock()
                .push(format!("started:{}", event.extension_count));
            Ok(())
        })?;

        let entries = self.entries.clone();
        events.subscribe(PostOrder::Monitor, move |event: &ExtensionLoadedEvent| {
            entries.lock().push(format!("loaded:{}", event.name));
            Ok(())
        })?;

        let entries = self.entries.clone();
        events.subscribe(PostOrder::Monitor, move |event: &ExtensionUnloadedEvent| {
            entries.lock().push(format!(
                "unloaded:{}:{}",
                event.name, event.revoked_subscriptions
            ));
            Ok(())
        })?;

        let entries = self.entries.clone();
        events.subscribe(PostOrder::Monitor, move |event: &HostShutdownEvent| {
            entries.lock().push(format!("shutdown:{}", event.reason));
            Ok(())
        })?;

        Ok(())
    }
}
