use thiserror::Error;

/// Errors returned by registration on the event bus.
///
/// Revocation and dispatch never fail; see [`crate::EventBus::unsubscribe`]
/// and [`crate::EventBus::publish`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// Rejected before any state was touched
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The bus was shut down and accepts no new subscriptions
    #[error("event bus has been shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, EventBusError>;
