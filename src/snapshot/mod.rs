//! Point-in-time report of everything a bot token can reach.
//!
//! Fields that could not be observed are `None` (exported as `null`) and the reason is recorded
//! in [`GuildSummary::failures`], so "not checked" stays distinguishable from "checked and denied".

mod builder;

pub use builder::SnapshotBuilder;

use crate::permissions::PermissionFlags;
use crate::session::{BotIdentity, ChannelKind};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AccessSnapshot {
    pub bot: BotIdentity,
    pub captured_at: DateTime<Utc>,
    pub guilds: Vec<GuildSummary>,
}

impl AccessSnapshot {
    pub fn guild(&self, guild_id: u64) -> Option<&GuildSummary> {
        self.guilds.iter().find(|g| g.id == guild_id)
    }

    pub fn total_members(&self) -> u64 {
        self.guilds.iter().filter_map(|g| g.member_count).sum()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    #[display("profile")]
    Profile,
    #[display("channels")]
    Channels,
    #[display("permissions")]
    Permissions,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FacetFailure {
    pub facet: Facet,
    pub error: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct OwnerInfo {
    pub id: u64,
    pub bot_is_owner: bool,
}

/// The bot's own membership, present whenever the member record could be fetched
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct BotMember {
    pub id: u64,
    /// Guild nickname, then global name, then username
    pub display_name: String,
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuildSummary {
    pub id: u64,
    pub name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub owner: Option<OwnerInfo>,
    pub member_count: Option<u64>,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
    pub roles_total: Option<usize>,
    pub verification_level: Option<String>,
    pub mfa_level: Option<String>,
    pub nsfw_level: Option<String>,
    pub premium_tier: Option<String>,
    pub premium_subscribers: Option<u64>,
    pub afk_timeout: Option<u16>,
    pub system_channel_id: Option<u64>,
    pub emojis_total: Option<usize>,
    pub stickers_total: Option<usize>,
    pub bot_member: Option<BotMember>,
    pub top_role: Option<String>,
    pub permissions: Option<PermissionFlags>,
    pub channel_types: Option<ChannelTypeCounts>,
    pub risk_flags: Option<RiskFlags>,
    pub channels: Option<Vec<ChannelSummary>>,
    pub failures: Vec<FacetFailure>,
}

impl GuildSummary {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("<guild {}>", self.id))
    }

    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failed(&self, facet: Facet) -> bool {
        self.failures.iter().any(|f| f.facet == facet)
    }

    /// Text-like channels the bot can at least view, or all text-like channels when access is unknown
    pub fn browsable_channels(&self) -> Vec<&ChannelSummary> {
        self.channels
            .iter()
            .flatten()
            .filter(|c| c.kind.is_text_like() && c.can_view != Some(false))
            .collect()
    }

    pub fn capability(&self) -> CapabilitySummary {
        let mut summary = CapabilitySummary::default();
        for channel in self.channels.iter().flatten() {
            match channel.kind {
                kind if kind.is_text_like() => {
                    summary.text_total += 1;
                    summary.text_viewable += usize::from(channel.can_view == Some(true));
                    summary.text_history += usize::from(channel.can_read == Some(true));
                    summary.text_send += usize::from(channel.can_send == Some(true));
                    summary.text_invite += usize::from(channel.can_invite == Some(true));
                }
                ChannelKind::Voice | ChannelKind::Stage => summary.voice_total += 1,
                _ => {}
            }
        }
        summary
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct CapabilitySummary {
    pub text_total: usize,
    pub text_viewable: usize,
    pub text_history: usize,
    pub text_send: usize,
    pub text_invite: usize,
    pub voice_total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub category: Option<String>,
    pub position: u16,
    pub nsfw: bool,
    pub slowmode_seconds: u16,
    pub topic: String,
    pub can_view: Option<bool>,
    pub can_read: Option<bool>,
    pub can_send: Option<bool>,
    pub can_invite: Option<bool>,
    pub permissions: Option<PermissionFlags>,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ChannelTypeCounts {
    pub text: usize,
    pub voice: usize,
    pub category: usize,
    pub news: usize,
    pub stage: usize,
    pub forum: usize,
    pub thread: usize,
    pub other: usize,
}

impl ChannelTypeCounts {
    pub fn tally(kinds: impl IntoIterator<Item = ChannelKind>) -> Self {
        let mut counts = Self::default();
        for kind in kinds {
            let slot = match kind {
                ChannelKind::Text => &mut counts.text,
                ChannelKind::Voice => &mut counts.voice,
                ChannelKind::Category => &mut counts.category,
                ChannelKind::News => &mut counts.news,
                ChannelKind::Stage => &mut counts.stage,
                ChannelKind::Forum => &mut counts.forum,
                ChannelKind::Thread => &mut counts.thread,
                ChannelKind::Other => &mut counts.other,
            };
            *slot += 1;
        }
        counts
    }

    pub fn entries(&self) -> [(&'static str, usize); 8] {
        [
            ("text", self.text),
            ("voice", self.voice),
            ("categories", self.category),
            ("news", self.news),
            ("stage", self.stage),
            ("forum", self.forum),
            ("threads", self.thread),
            ("other", self.other),
        ]
    }
}

/// Text channels where the bot's access is partial
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct RiskFlags {
    pub text_no_view_count: usize,
    pub view_but_no_history_count: usize,
    pub view_but_no_send_count: usize,
    pub view_but_no_invite_count: usize,
    pub view_but_no_history: Vec<String>,
    pub view_but_no_send: Vec<String>,
    pub view_but_no_invite: Vec<String>,
}

impl RiskFlags {
    /// `None` when any text channel's access is unknown
    pub fn from_channels(channels: &[ChannelSummary]) -> Option<Self> {
        let mut flags = Self::default();

        for channel in channels.iter().filter(|c| c.kind.is_text_like()) {
            let permissions = channel.permissions?;
            let label = format!("#{}", channel.name);

            if !permissions.view_channel {
                flags.text_no_view_count += 1;
                continue;
            }
            if !permissions.read_message_history {
                flags.view_but_no_history.push(label.clone());
            }
            if !permissions.send_messages {
                flags.view_but_no_send.push(label.clone());
            }
            if !permissions.create_instant_invite {
                flags.view_but_no_invite.push(label);
            }
        }

        flags.view_but_no_history_count = flags.view_but_no_history.len();
        flags.view_but_no_send_count = flags.view_but_no_send.len();
        flags.view_but_no_invite_count = flags.view_but_no_invite.len();

        Some(flags)
    }
}
