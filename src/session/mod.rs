//! The seam between the triage logic and the Discord client library.

mod discord;

pub use discord::DiscordSession;

use crate::error::TriageError;
use crate::permissions::{Overwrite, RoleGrant};
use crate::watch::ChannelWatch;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct BotIdentity {
    pub id: u64,
    pub name: String,
    pub discriminator: Option<u16>,
    pub global_name: Option<String>,
}

impl std::fmt::Display for BotIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.discriminator {
            Some(discriminator) => write!(f, "{}#{:04}", self.name, discriminator),
            None => write!(f, "{}", self.name),
        }
    }
}

/// State captured from the gateway's READY payload
#[derive(Debug, Clone)]
pub struct ReadyInfo {
    pub identity: BotIdentity,
    /// Visible guild ids in the order Discord reported them
    pub guild_ids: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct GuildProfile {
    pub name: String,
    pub owner_id: u64,
    pub member_count: Option<u64>,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub roles: Vec<RoleGrant>,
    pub verification_level: String,
    pub mfa_level: String,
    pub nsfw_level: String,
    pub premium_tier: String,
    pub premium_subscribers: Option<u64>,
    /// Seconds of voice inactivity before a move to the AFK channel
    pub afk_timeout: Option<u16>,
    pub system_channel_id: Option<u64>,
    pub emojis_total: usize,
    pub stickers_total: usize,
}

/// The bot's own membership in one guild
#[derive(Debug, Clone, Default)]
pub struct MemberRecord {
    pub roles: Vec<u64>,
    pub nick: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[display("text")]
    Text,
    #[display("voice")]
    Voice,
    #[display("category")]
    Category,
    #[display("news")]
    News,
    #[display("stage")]
    Stage,
    #[display("forum")]
    Forum,
    #[display("thread")]
    Thread,
    #[display("other")]
    Other,
}

impl ChannelKind {
    /// Channels that carry a message history the bot could read or post to
    pub fn is_text_like(self) -> bool {
        matches!(self, ChannelKind::Text | ChannelKind::News)
    }
}

#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: u64,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<u64>,
    pub position: u16,
    pub nsfw: bool,
    pub topic: Option<String>,
    /// Zero when slowmode is off
    pub slowmode_seconds: u16,
    pub overwrites: Vec<Overwrite>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MessageLine {
    pub id: u64,
    pub author_id: u64,
    pub author: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InviteOptions {
    /// Zero means the invite never expires
    pub max_age: Duration,
    /// Zero means unlimited uses
    pub max_uses: u8,
}

impl Default for InviteOptions {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(600),
            max_uses: 1,
        }
    }
}

/// A connected bot session.
///
/// Every network call goes through here so the snapshot builder and actions can run against an
/// in-memory session in tests.
#[serenity::async_trait]
pub trait Session: Send + Sync {
    /// Fails with [`TriageError::SessionNotReady`] until the gateway has delivered READY
    fn ready(&self) -> Result<&ReadyInfo, TriageError>;

    async fn guild_profile(&self, guild_id: u64) -> Result<GuildProfile, Error>;

    async fn channels(&self, guild_id: u64) -> Result<Vec<ChannelInfo>, Error>;

    async fn member(&self, guild_id: u64, user_id: u64) -> Result<MemberRecord, Error>;

    /// Most recent messages, newest first as Discord returns them
    async fn recent_messages(&self, channel_id: u64, limit: u8) -> Result<Vec<MessageLine>, Error>;

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<u64, Error>;

    /// Returns the invite URL
    async fn create_invite(&self, channel_id: u64, options: InviteOptions) -> Result<String, Error>;

    /// Start receiving new messages for one channel
    fn watch(&self, channel_id: u64) -> Result<ChannelWatch, TriageError>;

    /// Close the connection. Later calls are no-ops.
    async fn shutdown(&self);
}
