pub mod config;
pub mod config_manager;
pub mod events;
pub mod items;

pub use config::{EventBusConfig, ExtensionConfig, HostConfig};
pub use events::{
    DefineCustomItemsEvent, Event, ExtensionLoadedEvent, ExtensionUnloadedEvent,
    HostShutdownEvent, HostStartedEvent,
};
pub use items::{
    CustomItemData, CustomItemOptions, CustomRenderOffsets, DEFAULT_TEXTURE_SIZE, Hand, Offset,
    OffsetXyz,
};
