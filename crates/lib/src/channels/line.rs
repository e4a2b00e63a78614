//! LINE channel: webhook payload types, signature check, and the Messaging API client (reply, profile).

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

use crate::channels::handle::{ChannelError, ChannelHandle};
use crate::channels::inbound::{InboundEvent, InboundKind};
use crate::message::MessageDescriptor;

const LINE_API_BASE: &str = "https://api.line.me";

/// Header carrying the base64 HMAC-SHA256 of the raw webhook body.
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

/// Timeout for each Messaging API call; replies are sent one at a time.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type HmacSha256 = Hmac<Sha256>;

fn keyed_mac(channel_secret: &str) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(channel_secret.as_bytes()).ok()
}

/// Base64 HMAC-SHA256 of `body` keyed with the channel secret (the value LINE puts in `X-Line-Signature`).
pub fn sign_body(channel_secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = keyed_mac(channel_secret)?;
    mac.update(body);
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a webhook signature. Empty secret or undecodable signature never verifies.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    if channel_secret.is_empty() {
        return false;
    }
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Some(mut mac) = keyed_mac(channel_secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Webhook POST body: `{ "destination", "events": [...] }`.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<LineEvent>,
}

/// One webhook event. Only the fields the tour reads; everything else is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl LineEvent {
    /// Follow, unfollow and text-message events become inbound events; everything else (postback,
    /// stickers, events without a user id) is dropped. Follow and text events also need a reply token.
    pub fn into_inbound(self) -> Option<InboundEvent> {
        let user_id = self.source?.user_id?;
        let kind = match self.typ.as_str() {
            "follow" => InboundKind::Follow,
            "unfollow" => InboundKind::Unfollow,
            "message" => {
                let msg = self.message?;
                if msg.typ != "text" {
                    return None;
                }
                InboundKind::Text(msg.text?)
            }
            _ => return None,
        };
        let reply_token = self.reply_token;
        if reply_token.is_none() && kind != InboundKind::Unfollow {
            return None;
        }
        Some(InboundEvent {
            channel_id: "line".to_string(),
            user_id,
            reply_token,
            kind,
        })
    }
}

/// Profile returned by `GET /v2/bot/profile/{userId}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineProfile {
    pub display_name: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub picture_url: Option<String>,
}

/// LINE Messaging API client for replies and profile lookups.
pub struct LineChannel {
    id: String,
    access_token: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl LineChannel {
    /// `api_base` defaults to https://api.line.me (override for tests or proxies).
    pub fn new(access_token: Option<String>, api_base: Option<String>) -> Result<Self, ChannelError> {
        Self::with_timeout(access_token, api_base, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        access_token: Option<String>,
        api_base: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| LINE_API_BASE.to_string());
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            id: "line".to_string(),
            access_token,
            api_base,
            client,
        })
    }

    fn token(&self) -> Result<&str, ChannelError> {
        self.access_token
            .as_deref()
            .ok_or(ChannelError::NotConfigured("line channel access token"))
    }

    /// POST /v2/bot/message/reply.
    pub async fn reply_message(
        &self,
        reply_token: &str,
        messages: &[MessageDescriptor],
    ) -> Result<(), ChannelError> {
        let token = self.token()?;
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let messages: Vec<serde_json::Value> =
            messages.iter().map(MessageDescriptor::to_line_json).collect();
        let body = serde_json::json!({ "replyToken": reply_token, "messages": messages });
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("reply failed: {} {}", status, body)));
        }
        Ok(())
    }

    /// GET /v2/bot/profile/{userId}.
    pub async fn get_profile(&self, user_id: &str) -> Result<LineProfile, ChannelError> {
        let token = self.token()?;
        let url = format!("{}/v2/bot/profile/{}", self.api_base, user_id);
        let res = self.client.get(&url).bearer_auth(token).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!(
                "get profile failed: {} {}",
                status, body
            )));
        }
        Ok(res.json().await?)
    }
}

#[async_trait]
impl ChannelHandle for LineChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn reply(
        &self,
        reply_token: &str,
        messages: &[MessageDescriptor],
    ) -> Result<(), ChannelError> {
        self.reply_message(reply_token, messages).await
    }

    async fn display_name(&self, user_id: &str) -> Result<String, ChannelError> {
        Ok(self.get_profile(user_id).await?.display_name)
    }
}
