//! Push channel port.
//!
//! A subscription yields row-level change events interleaved with channel
//! status updates. Dropping the [`FeedSubscription`] detaches it from the
//! channel.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::Stream;
use tokio::sync::mpsc;

use crate::domain::{ActorId, ChangeEvent, ChannelStatus};
use crate::error::RemoteError;

/// A message delivered on a push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Status(ChannelStatus),
    Change(ChangeEvent),
}

/// What to subscribe to: one table, filtered to the actor's own rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedTopic {
    pub table: &'static str,
    pub actor: ActorId,
}

impl FeedTopic {
    #[must_use]
    pub const fn new(table: &'static str, actor: ActorId) -> Self {
        Self { table, actor }
    }

    /// Channel name, e.g. `public:properties`.
    #[must_use]
    pub fn channel_name(&self) -> String {
        format!("public:{}", self.table)
    }
}

/// Receiving half of a push channel subscription.
///
/// Ends once the channel side is gone.
#[derive(Debug)]
pub struct FeedSubscription {
    rx: mpsc::Receiver<FeedMessage>,
}

impl FeedSubscription {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<FeedMessage>) -> Self {
        Self { rx }
    }
}

impl Stream for FeedSubscription {
    type Item = FeedMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, topic: &FeedTopic) -> Result<FeedSubscription, RemoteError>;
}
