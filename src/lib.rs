pub mod builtin;
pub mod extension;
pub mod host;

pub use extension::{Extension, ExtensionContext, ExtensionManager};
pub use host::Host;

// Re-export the bus and payload types for extensions
pub use extbus_event_bus::{
    Event, EventBus, EventBusError, EventBusStats, EventSubscription, Owner, OwnerScope,
    PostOrder, PublishReport, Subscription, SubscriptionId,
};
pub use extbus_types::{
    CustomItemData, CustomItemOptions, DefineCustomItemsEvent, EventBusConfig, HostConfig,
    config_manager,
};

use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling it more than once is harmless.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,extbus_event_bus=debug"));

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .try_init();
}
