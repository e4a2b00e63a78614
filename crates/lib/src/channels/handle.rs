//! Channel handle: the outbound side of a chat platform.

use async_trait::async_trait;

use crate::message::MessageDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel not configured: {0}")]
    NotConfigured(&'static str),
    #[error("channel request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel api error: {0}")]
    Api(String),
}

/// Outbound operations the tour needs from a channel.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "line").
    fn id(&self) -> &str;

    /// Reply to the event identified by `reply_token` with `messages`, in order, as one reply.
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[MessageDescriptor],
    ) -> Result<(), ChannelError>;

    /// Display name of a user, for greetings.
    async fn display_name(&self, user_id: &str) -> Result<String, ChannelError>;
}
