//! Realtime push-channel contract and the reconnecting link task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::PushMessage;
use crate::backend::BackendError;

/// Stream of messages delivered by a live push connection.
pub type PushStream = BoxStream<'static, PushMessage>;

/// The push collaborator delivering asynchronous state updates.
///
/// A successful `connect` yields the message stream for one connection;
/// the stream ending means the link closed. The transport behind it (the
/// backend's `/ws/state` WebSocket in production) is not implemented here.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Opens one connection to the push source.
    async fn connect(&self) -> Result<PushStream, BackendError>;
}

/// What the link task reports back to the session.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LinkEvent {
    /// A connection was established.
    Opened,
    /// A message arrived on the live connection.
    Message(PushMessage),
    /// The connection closed or a connect attempt failed.
    Closed,
}

/// Spawns the task that owns the realtime connection.
///
/// The task reconnects forever on a fixed delay; it stops when the session
/// drops its receiver or aborts the handle. Spawning is the session's
/// "schedule reconnect" primitive — while the task is alive, scheduling
/// again is a no-op.
pub(crate) fn spawn_link_task(
    channel: Arc<dyn PushChannel>,
    events: UnboundedSender<LinkEvent>,
    retry_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match channel.connect().await {
                Ok(mut stream) => {
                    if events.send(LinkEvent::Opened).is_err() {
                        return;
                    }
                    while let Some(message) = stream.next().await {
                        if events.send(LinkEvent::Message(message)).is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    debug!(%error, "realtime connect attempt failed");
                }
            }
            if events.send(LinkEvent::Closed).is_err() {
                return;
            }
            tokio::time::sleep(retry_delay).await;
        }
    })
}
