//! Tour engine: sessions + dispatcher, and the handling of follow and text events.

use anyhow::{Context, Result};
use std::path::Path;

use crate::channels::{ChannelError, ChannelHandle, InboundEvent, InboundKind};
use crate::config::{self, Config, DispatchMode};
use crate::dialogue::{DispatchResult, Dispatcher, Stage};
use crate::message::MessageDescriptor;
use crate::script::Script;
use crate::session::SessionStore;

/// Drives one tour for many users.
pub struct TourEngine {
    dispatcher: Dispatcher,
    sessions: SessionStore,
    mode: DispatchMode,
}

impl TourEngine {
    pub fn new(dispatcher: Dispatcher, mode: DispatchMode) -> Self {
        Self {
            dispatcher,
            sessions: SessionStore::new(),
            mode,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// New follower: restart their session and return the welcome message.
    pub async fn follow(&self, user_id: &str, display_name: &str) -> Vec<MessageDescriptor> {
        self.sessions.reset(user_id, Stage::AwaitGoGo).await;
        vec![MessageDescriptor::text(
            self.dispatcher.script().welcome_for(display_name),
        )]
    }

    /// Handle one text message: trim, dispatch for the user's stage, advance on match.
    /// Unmatched input returns the fallback and leaves the stage unchanged; a user
    /// without a session only gets one once something matches.
    pub async fn respond(&self, user_id: &str, raw_text: &str) -> DispatchResult {
        let text = raw_text.trim();
        let (from, result) = self
            .sessions
            .update_or_start(user_id, |session| {
                let from = session.stage;
                let result = match self.mode {
                    DispatchMode::Scoped => self.dispatcher.dispatch_at(from, text),
                    DispatchMode::Global => self.dispatcher.dispatch(text),
                };
                session.turns += 1;
                if let Some(next) = result.next {
                    session.stage = next;
                }
                (!result.is_fallback(), (from, result))
            })
            .await;
        match (&result.rule_id, result.next) {
            (Some(rule), Some(next)) => {
                log::debug!("tour: user {} rule {} ({} -> {})", user_id, rule, from, next)
            }
            _ => log::debug!("tour: user {} no rule matched at {}", user_id, from),
        }
        result
    }

    /// Handle an inbound channel event end to end: look up the display name when needed,
    /// compute the reply, and send it through `channel`. A failed profile lookup is
    /// returned as is and nothing is sent.
    pub async fn handle_event(
        &self,
        channel: &dyn ChannelHandle,
        event: &InboundEvent,
    ) -> Result<(), ChannelError> {
        let messages = match &event.kind {
            InboundKind::Follow => {
                let name = channel.display_name(&event.user_id).await?;
                log::info!("tour: {} followed on {}", event.user_id, event.channel_id);
                self.follow(&event.user_id, &name).await
            }
            InboundKind::Unfollow => {
                if self.sessions.remove(&event.user_id).await.is_some() {
                    log::info!("tour: {} unfollowed, session dropped", event.user_id);
                }
                return Ok(());
            }
            InboundKind::Text(text) => self.respond(&event.user_id, text).await.messages,
        };
        let Some(reply_token) = event.reply_token.as_deref() else {
            log::debug!("tour: no reply token for {}, nothing sent", event.user_id);
            return Ok(());
        };
        channel.reply(reply_token, &messages).await
    }
}

/// Load the configured script (or the bundled one), validate it, and build an engine.
pub fn engine_from_config(config: &Config, config_path: &Path) -> Result<TourEngine> {
    let script = match config::resolve_script_path(config, config_path) {
        Some(path) => {
            log::info!("loading tour script from {}", path.display());
            Script::load(&path)?
        }
        None => {
            log::info!("using bundled tour script");
            Script::bundled()?
        }
    };
    let rules = script.rules.len();
    let dispatcher = Dispatcher::new(script).context("validating tour script")?;
    log::info!(
        "tour script ready: {} rule(s), dispatch mode {:?}",
        rules,
        config.tour.mode
    );
    Ok(TourEngine::new(dispatcher, config.tour.mode))
}
