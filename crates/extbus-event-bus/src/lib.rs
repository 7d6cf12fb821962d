pub mod core;
pub mod error;
pub mod owner;
pub mod post_order;
mod registry;
pub mod scope;
pub mod subscription;

pub use crate::core::{EventBus, EventBusStats, HandlerFailure, PublishReport};
pub use error::{EventBusError, Result};
pub use owner::Owner;
pub use post_order::PostOrder;
pub use scope::OwnerScope;
pub use subscription::{
    EventSubscription, EventType, Subscription, SubscriptionId, SubscriptionState,
};

// Re-export types for convenience
pub use extbus_types::{Event, EventBusConfig};
