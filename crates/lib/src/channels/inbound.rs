//! Inbound event from a channel: delivered to the gateway for session/tour handling.

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// User added the bot as a friend (or unblocked it).
    Follow,
    /// User blocked or removed the bot. LINE sends no reply token for this.
    Unfollow,
    /// User sent a text message (raw, untrimmed).
    Text(String),
}

/// One event from a channel, with what is needed to answer it.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub channel_id: String,
    pub user_id: String,
    /// One-time token scoping the reply to this event. `None` for unfollow.
    pub reply_token: Option<String>,
    pub kind: InboundKind,
}
