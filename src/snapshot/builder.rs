use crate::credential::snowflake_time;
use crate::error::TriageError;
use crate::permissions::{MemberContext, PermissionFlags};
use crate::session::{BotIdentity, ChannelInfo, ChannelKind, MemberRecord, Session};
use crate::snapshot::{
    AccessSnapshot, BotMember, ChannelSummary, ChannelTypeCounts, Facet, FacetFailure, GuildSummary, OwnerInfo,
    RiskFlags,
};
use crate::util::clip;
use chrono::{DateTime, Utc};
use serenity::all::Permissions;
use std::collections::HashMap;
use tracing::{debug, info, warn};

const TOPIC_CLIP: usize = 140;

/// Walks every visible guild and records what the bot can reach.
///
/// Calls are made one at a time, guild by guild. A failure only nulls the facet it belongs to;
/// the snapshot itself only fails when the session was never ready.
pub struct SnapshotBuilder<'a, S: ?Sized> {
    session: &'a S,
}

impl<'a, S: Session + ?Sized> SnapshotBuilder<'a, S> {
    pub fn new(session: &'a S) -> Self {
        Self { session }
    }

    pub async fn build(&self, captured_at: DateTime<Utc>) -> Result<AccessSnapshot, TriageError> {
        let ready = self.session.ready()?;

        let mut guilds = Vec::with_capacity(ready.guild_ids.len());
        for &guild_id in &ready.guild_ids {
            guilds.push(self.summarize(guild_id, &ready.identity).await);
        }

        let degraded = guilds.iter().filter(|g| g.is_degraded()).count();
        info!(
            "Snapshot captured: {} guild(s), {} degraded",
            guilds.len(),
            degraded
        );

        Ok(AccessSnapshot {
            bot: ready.identity.clone(),
            captured_at,
            guilds,
        })
    }

    async fn summarize(&self, guild_id: u64, bot: &BotIdentity) -> GuildSummary {
        let bot_id = bot.id;
        debug!("Summarizing guild {}", guild_id);
        let mut failures = Vec::new();

        let profile = match self.session.guild_profile(guild_id).await {
            Ok(profile) => Some(profile),
            Err(err) => {
                record(&mut failures, guild_id, Facet::Profile, err.to_string());
                None
            }
        };

        let channels = match self.session.channels(guild_id).await {
            Ok(channels) => Some(channels),
            Err(err) => {
                record(&mut failures, guild_id, Facet::Channels, err.to_string());
                None
            }
        };

        let membership = match &profile {
            Some(_) => match self.session.member(guild_id, bot_id).await {
                Ok(membership) => Some(membership),
                Err(err) => {
                    record(&mut failures, guild_id, Facet::Permissions, err.to_string());
                    None
                }
            },
            None => {
                let reason = "guild roles unavailable".to_string();
                record(&mut failures, guild_id, Facet::Permissions, reason);
                None
            }
        };

        let member = match (&profile, &membership) {
            (Some(profile), Some(membership)) => Some(MemberContext {
                guild_id,
                owner_id: profile.owner_id,
                user_id: bot_id,
                roles: &profile.roles,
                member_roles: &membership.roles,
            }),
            _ => None,
        };

        let channels = channels.map(|channels| summarize_channels(&channels, member.as_ref()));

        GuildSummary {
            id: guild_id,
            created_at: profile.as_ref().and_then(|_| snowflake_time(guild_id)),
            name: profile.as_ref().map(|p| p.name.clone()),
            owner: profile.as_ref().map(|p| OwnerInfo {
                id: p.owner_id,
                bot_is_owner: p.owner_id == bot_id,
            }),
            member_count: profile.as_ref().and_then(|p| p.member_count),
            description: profile.as_ref().and_then(|p| p.description.clone()),
            features: profile.as_ref().map(|p| p.features.clone()),
            roles_total: profile.as_ref().map(|p| p.roles.len()),
            verification_level: profile.as_ref().map(|p| p.verification_level.clone()),
            mfa_level: profile.as_ref().map(|p| p.mfa_level.clone()),
            nsfw_level: profile.as_ref().map(|p| p.nsfw_level.clone()),
            premium_tier: profile.as_ref().map(|p| p.premium_tier.clone()),
            premium_subscribers: profile.as_ref().and_then(|p| p.premium_subscribers),
            afk_timeout: profile.as_ref().and_then(|p| p.afk_timeout),
            system_channel_id: profile.as_ref().and_then(|p| p.system_channel_id),
            emojis_total: profile.as_ref().map(|p| p.emojis_total),
            stickers_total: profile.as_ref().map(|p| p.stickers_total),
            bot_member: membership.as_ref().map(|m| bot_member(bot, m)),
            top_role: member
                .as_ref()
                .map(|m| m.top_role().map_or_else(|| "@everyone".to_string(), |r| r.name.clone())),
            permissions: member.as_ref().map(|m| PermissionFlags::from(m.base_permissions())),
            channel_types: channels
                .as_ref()
                .map(|cs| ChannelTypeCounts::tally(cs.iter().map(|c| c.kind))),
            risk_flags: member
                .as_ref()
                .and(channels.as_deref())
                .and_then(RiskFlags::from_channels),
            channels,
            failures,
        }
    }
}

fn bot_member(bot: &BotIdentity, record: &MemberRecord) -> BotMember {
    let display_name = record
        .nick
        .clone()
        .or_else(|| bot.global_name.clone())
        .unwrap_or_else(|| bot.name.clone());

    BotMember {
        id: bot.id,
        display_name,
        joined_at: record.joined_at,
    }
}

fn record(failures: &mut Vec<FacetFailure>, guild_id: u64, facet: Facet, error: String) {
    warn!("Guild {}: {} unavailable: {}", guild_id, facet, error);
    failures.push(FacetFailure { facet, error });
}

/// Channels ordered by position then id, with access resolved when the member is known
fn summarize_channels(channels: &[ChannelInfo], member: Option<&MemberContext<'_>>) -> Vec<ChannelSummary> {
    let categories: HashMap<u64, &str> = channels
        .iter()
        .filter(|c| c.kind == ChannelKind::Category)
        .map(|c| (c.id, c.name.as_str()))
        .collect();

    let mut summaries: Vec<ChannelSummary> = channels
        .iter()
        .map(|channel| {
            let permissions = member.map(|m| m.channel_permissions(&channel.overwrites));
            let has = |p: Permissions| permissions.map(|perms| perms.contains(p));

            ChannelSummary {
                id: channel.id,
                name: channel.name.clone(),
                kind: channel.kind,
                category: channel
                    .parent_id
                    .and_then(|id| categories.get(&id))
                    .map(|name| name.to_string()),
                position: channel.position,
                nsfw: channel.nsfw,
                slowmode_seconds: channel.slowmode_seconds,
                topic: clip(channel.topic.as_deref(), TOPIC_CLIP),
                can_view: has(Permissions::VIEW_CHANNEL),
                can_read: has(Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY),
                can_send: has(Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES),
                can_invite: has(Permissions::CREATE_INSTANT_INVITE),
                permissions: permissions.map(PermissionFlags::from),
            }
        })
        .collect();

    summaries.sort_by_key(|c| (c.position, c.id));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{Overwrite, OverwriteTarget};
    use crate::test_util::{self, FakeSession, BOT_ID, BOT_ROLE, GUILD_A, GUILD_B};

    #[tokio::test]
    async fn all_guilds_are_reported_even_when_degraded() {
        let mut session = test_util::two_guild_session();
        session.members.insert(GUILD_B, Err("Missing Access".to_string()));

        let snapshot = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap();

        assert_eq!(snapshot.guilds.len(), 2);
        assert_eq!(snapshot.bot.id, BOT_ID);

        let a = &snapshot.guilds[0];
        assert_eq!(a.id, GUILD_A);
        assert!(!a.is_degraded());
        assert_eq!(a.owner.map(|o| o.bot_is_owner), Some(false));
        assert_eq!(a.member_count, Some(10));
        assert_eq!(a.channels.as_ref().map(Vec::len), Some(3));
        assert!(a.permissions.is_some());

        let b = &snapshot.guilds[1];
        assert_eq!(b.id, GUILD_B);
        assert!(b.permissions.is_none());
        assert!(b.risk_flags.is_none());
        assert_eq!(b.name.as_deref(), Some("Guild B"));
        assert!(b.owner.is_some());
        assert!(b.member_count.is_some());
        assert!(b.channels.is_some());
        assert!(b.channel_types.is_some());
        assert_eq!(b.failures.len(), 1);
        assert_eq!(b.failures[0].facet, Facet::Permissions);
        assert_eq!(b.failures[0].error, "Missing Access");
    }

    #[tokio::test]
    async fn unknown_permissions_null_channel_access() {
        let mut session = test_util::two_guild_session();
        session.members.insert(GUILD_B, Err("Missing Access".to_string()));

        let snapshot = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap();

        for channel in snapshot.guilds[1].channels.iter().flatten() {
            assert!(channel.can_read.is_none());
            assert!(channel.can_send.is_none());
            assert!(channel.permissions.is_none());
        }
    }

    #[tokio::test]
    async fn profile_failure_nulls_profile_and_permissions_only() {
        let mut session = test_util::two_guild_session();
        session.profiles.insert(GUILD_A, Err("Unknown Guild".to_string()));

        let snapshot = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap();
        let a = &snapshot.guilds[0];

        assert!(a.name.is_none());
        assert!(a.owner.is_none());
        assert!(a.member_count.is_none());
        assert!(a.permissions.is_none());
        assert_eq!(a.channels.as_ref().map(Vec::len), Some(3));
        assert!(a.created_at.is_none());
        assert!(a.verification_level.is_none());
        assert!(a.premium_subscribers.is_none());
        assert!(a.emojis_total.is_none());
        assert!(a.bot_member.is_none());
        assert!(a.failed(Facet::Profile));
        assert!(a.failed(Facet::Permissions));
        assert!(!a.failed(Facet::Channels));
        assert_eq!(a.display_name(), format!("<guild {GUILD_A}>"));
    }

    #[tokio::test]
    async fn channel_failure_keeps_permissions() {
        let mut session = test_util::two_guild_session();
        session.channels.insert(GUILD_A, Err("rate limited".to_string()));

        let snapshot = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap();
        let a = &snapshot.guilds[0];

        assert!(a.channels.is_none());
        assert!(a.channel_types.is_none());
        assert!(a.permissions.is_some());
        assert_eq!(a.failures.len(), 1);
    }

    #[tokio::test]
    async fn all_degraded_snapshot_is_still_a_snapshot() {
        let session = FakeSession::ready_with_guilds(vec![GUILD_A, GUILD_B]);

        let snapshot = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap();

        assert_eq!(snapshot.guilds.len(), 2);
        assert!(snapshot.guilds.iter().all(|g| g.is_degraded()));
        assert!(snapshot.guilds.iter().all(|g| g.failures.len() == 3));
    }

    #[tokio::test]
    async fn not_ready_session_is_rejected() {
        let session = FakeSession::default();

        let err = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap_err();

        assert!(matches!(err, TriageError::SessionNotReady));
    }

    #[tokio::test]
    async fn guild_order_matches_ready_order() {
        let mut session = test_util::two_guild_session();
        session.ready.as_mut().unwrap().guild_ids = vec![GUILD_B, GUILD_A];

        let snapshot = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap();
        let ids: Vec<u64> = snapshot.guilds.iter().map(|g| g.id).collect();

        assert_eq!(ids, vec![GUILD_B, GUILD_A]);
    }

    #[tokio::test]
    async fn channel_overwrite_revokes_guild_send() {
        let mut session = test_util::two_guild_session();
        let deny_send = Overwrite {
            target: OverwriteTarget::Role(BOT_ROLE),
            allow: Permissions::empty(),
            deny: Permissions::SEND_MESSAGES,
        };
        if let Some(Ok(channels)) = session.channels.get_mut(&GUILD_A) {
            channels[0].overwrites.push(deny_send);
        }

        let snapshot = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap();
        let a = &snapshot.guilds[0];
        let guild_send = a.permissions.map(|p| p.send_messages);
        let general = a.channels.iter().flatten().find(|c| c.name == "general").unwrap();
        let other = a.channels.iter().flatten().find(|c| c.name == "chat").unwrap();

        assert_eq!(guild_send, Some(true));
        assert_eq!(general.can_send, Some(false));
        assert_eq!(general.can_read, Some(true));
        assert_eq!(other.can_send, Some(true));

        let risk = a.risk_flags.as_ref().unwrap();
        assert_eq!(risk.view_but_no_send, vec!["#general".to_string()]);
    }

    #[tokio::test]
    async fn channels_are_sorted_and_categorized() {
        let session = test_util::two_guild_session();

        let snapshot = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap();
        let names: Vec<&str> = snapshot.guilds[0]
            .channels
            .iter()
            .flatten()
            .map(|c| c.name.as_str())
            .collect();

        assert_eq!(names, vec!["Text", "general", "chat"]);
        let general = snapshot.guilds[0].channels.iter().flatten().nth(1).unwrap();
        assert_eq!(general.category.as_deref(), Some("Text"));
    }

    #[tokio::test]
    async fn guild_settings_and_bot_membership_are_reported() {
        let mut session = test_util::two_guild_session();
        let mut nicknamed = test_util::bot_membership(vec![BOT_ROLE]);
        nicknamed.nick = Some("Triage Desk".to_string());
        session.members.insert(GUILD_A, Ok(nicknamed));
        if let Some(Ok(channels)) = session.channels.get_mut(&GUILD_A) {
            channels[0].slowmode_seconds = 30;
        }

        let snapshot = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap();
        let a = &snapshot.guilds[0];

        assert_eq!(a.created_at, snowflake_time(GUILD_A));
        assert_eq!(a.verification_level.as_deref(), Some("medium"));
        assert_eq!(a.mfa_level.as_deref(), Some("none"));
        assert_eq!(a.premium_tier.as_deref(), Some("tier_1"));
        assert_eq!(a.premium_subscribers, Some(3));
        assert_eq!(a.afk_timeout, Some(300));
        assert_eq!(a.emojis_total, Some(4));
        assert_eq!(a.stickers_total, Some(0));

        let member = a.bot_member.as_ref().unwrap();
        assert_eq!(member.id, BOT_ID);
        assert_eq!(member.display_name, "Triage Desk");
        assert!(member.joined_at.is_some());

        let general = a.channels.iter().flatten().find(|c| c.name == "general").unwrap();
        assert_eq!(general.slowmode_seconds, 30);

        // No nickname falls back to the account name
        let b = &snapshot.guilds[1];
        assert_eq!(b.bot_member.as_ref().map(|m| m.display_name.as_str()), Some("triage-bot"));
    }

    #[tokio::test]
    async fn member_failure_nulls_bot_membership() {
        let mut session = test_util::two_guild_session();
        session.members.insert(GUILD_B, Err("Missing Access".to_string()));

        let snapshot = SnapshotBuilder::new(&session).build(test_util::captured_at()).await.unwrap();
        let b = &snapshot.guilds[1];

        assert!(b.bot_member.is_none());
        assert_eq!(b.verification_level.as_deref(), Some("medium"));
    }
}
