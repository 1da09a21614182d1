//! Delivery of notifications to destination channels.
//!
//! The [`Dispatcher`] trait is the only thing the poller knows about the
//! messaging side.  Two transports ship with the crate:
//!
//! * [`ConsoleDispatcher`] — prints the plain form to stdout.
//! * [`WebhookDispatcher`] — POSTs both forms as JSON to a relay endpoint.

mod console;
mod message;
mod webhook;

pub use console::ConsoleDispatcher;
pub use message::Message;
pub use webhook::WebhookDispatcher;

use async_trait::async_trait;

use crate::error::DispatchError;

/// Capability to deliver one formatted message to a destination.
///
/// Implementations must enforce their own timeouts; the poller awaits each
/// delivery before moving to the next item.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn deliver(&self, destination: &str, rich: &str, plain: &str)
        -> Result<(), DispatchError>;
}
