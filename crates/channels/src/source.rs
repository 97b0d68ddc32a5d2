//! Shared update source trait.

use async_trait::async_trait;
use proto::{ChannelError, ReviewerUpdate};
use tokio::sync::{mpsc, watch};

/// Bounded queue between update sources and the dispatcher.
pub const UPDATE_QUEUE_CAPACITY: usize = 128;

/// Delivers reviewer updates (long polling, webhook push).
#[async_trait]
pub trait UpdateSource: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Run until `shutdown` flips to `true`, publishing updates to `tx` in
    /// delivery order.
    async fn run(
        self,
        tx: mpsc::Sender<ReviewerUpdate>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ChannelError>;
}

/// Resolves once `shutdown` is `true` or its sender is gone.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
