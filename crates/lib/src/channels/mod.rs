//! Communication channels (LINE).
//!
//! A channel turns platform webhooks into [`InboundEvent`]s and implements
//! [`ChannelHandle`] so the tour engine can reply without knowing the platform.

mod handle;
mod inbound;
mod line;

pub use handle::{ChannelError, ChannelHandle};
pub use inbound::{InboundEvent, InboundKind};
pub use line::{
    sign_body, verify_signature, LineChannel, LineEvent, LineProfile, WebhookBody,
    SIGNATURE_HEADER,
};
