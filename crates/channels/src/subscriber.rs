use {async_trait::async_trait, courier_common::ChatEvent};

use crate::Result;

/// A fan-out destination for normalized events.
///
/// Deliveries to different subscribers run independently; an error (or
/// panic) from one is logged against [`Subscriber::name`] and never reaches
/// the others.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Stable identity used in logs and for removal.
    fn name(&self) -> &str;

    async fn deliver(&self, event: &ChatEvent) -> Result<()>;
}
