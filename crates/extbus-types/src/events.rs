use std::any::Any;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::items::CustomItemData;

/// Marker for values that can be published on the event bus.
///
/// The concrete Rust type is the event's identity; payload fields are never
/// inspected by the bus.
pub trait Event: Any + Send + Sync {}

/// Published once the host has finished loading its extensions
#[derive(Clone, Debug)]
pub struct HostStartedEvent {
    pub started_at: DateTime<Utc>,
    pub extension_count: usize,
}

/// Published before extensions are unloaded during host shutdown
#[derive(Clone, Debug)]
pub struct HostShutdownEvent {
    pub reason: String,
}

/// An extension finished `on_load` successfully
#[derive(Clone, Debug)]
pub struct ExtensionLoadedEvent {
    pub name: String,
    pub loaded_at: DateTime<Utc>,
}

/// An extension was unloaded and its subscriptions revoked
#[derive(Clone, Debug)]
pub struct ExtensionUnloadedEvent {
    pub name: String,
    pub revoked_subscriptions: usize,
}

/// Lets extensions contribute custom items while the host starts.
///
/// Handlers only get a shared reference, so registrations go through an
/// internal lock.
#[derive(Debug, Default)]
pub struct DefineCustomItemsEvent {
    items: Mutex<Vec<CustomItemData>>,
}

impl DefineCustomItemsEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if an item with the same name was already registered.
    pub fn register(&self, item: CustomItemData) -> Result<()> {
        let mut items = self.items.lock();
        if items.iter().any(|existing| existing.name() == item.name()) {
            bail!("custom item '{}' is already registered", item.name());
        }
        items.push(item);
        Ok(())
    }

    pub fn items(&self) -> Vec<CustomItemData> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl Event for HostStartedEvent {}
impl Event for HostShutdownEvent {}
impl Event for ExtensionLoadedEvent {}
impl Event for ExtensionUnloadedEvent {}
impl Event for DefineCustomItemsEvent {}
