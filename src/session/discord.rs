use crate::credential::Credential;
use crate::error::TriageError;
use crate::handler::Handler;
use crate::permissions::{Overwrite, OverwriteTarget, RoleGrant};
use crate::session::{
    ChannelInfo, ChannelKind, GuildProfile, InviteOptions, MemberRecord, MessageLine, ReadyInfo, Session,
};
use crate::settings::TriageConfig;
use crate::watch::{ChannelWatch, WatchedMessage, WATCH_BUFFER};
use crate::Error;
use serenity::all::{
    ChannelId, ChannelType, Client, CreateInvite, GatewayIntents, GetMessages, GuildChannel, GuildId, Http,
    PermissionOverwrite, PermissionOverwriteType, ShardManager, UserId,
};
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const INVITE_REASON: &str = "Created via token triage console";

const VERIFICATION_LEVELS: &[&str] = &["none", "low", "medium", "high", "very_high"];
const MFA_LEVELS: &[&str] = &["none", "elevated"];
const NSFW_LEVELS: &[&str] = &["default", "explicit", "safe", "age_restricted"];
const PREMIUM_TIERS: &[&str] = &["tier_0", "tier_1", "tier_2", "tier_3"];

#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct DiscordSession {
    #[derivative(Debug = "ignore")]
    http: Arc<Http>,
    ready: OnceLock<ReadyInfo>,
    #[derivative(Debug = "ignore")]
    messages: broadcast::Sender<WatchedMessage>,
    #[derivative(Debug = "ignore")]
    shard_manager: Arc<ShardManager>,
    #[derivative(Debug = "ignore")]
    /// Taken by the first shutdown
    gateway: Mutex<Option<JoinHandle<Result<(), serenity::Error>>>>,
}

impl DiscordSession {
    /// Authenticate, start the gateway and wait for READY.
    ///
    /// Any failure before READY is a [`TriageError::ConnectFailure`].
    pub async fn connect(credential: &Credential, config: &TriageConfig) -> Result<Self, TriageError> {
        // Plain REST call first so a rejected token surfaces as an HTTP error
        let rest = Http::new(credential.token());
        let me = rest
            .get_current_user()
            .await
            .map_err(TriageError::connect_failure)?;
        info!("Token authenticated as {} ({})", me.name, me.id);

        let mut intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES;
        if config.discord.privileged_intents {
            intents |= GatewayIntents::GUILD_MEMBERS | GatewayIntents::MESSAGE_CONTENT;
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (messages, _) = broadcast::channel(WATCH_BUFFER);

        let mut client = Client::builder(credential.token(), intents)
            .event_handler(Handler::new(ready_tx, messages.clone()))
            .await
            .map_err(TriageError::connect_failure)?;

        let http = client.http.clone();
        let shard_manager = client.shard_manager.clone();
        let mut gateway = tokio::spawn(async move { client.start().await });

        let ready = tokio::select! {
            ready = ready_rx => ready.map_err(|_| TriageError::connect_failure("gateway closed before READY"))?,
            outcome = &mut gateway => {
                let err: Error = match outcome {
                    Ok(Ok(())) => "gateway stopped before READY".into(),
                    Ok(Err(err)) => err.into(),
                    Err(join) => join.into(),
                };
                return Err(TriageError::ConnectFailure(err));
            }
        };

        let session = Self {
            http,
            ready: OnceLock::new(),
            messages,
            shard_manager,
            gateway: Mutex::new(Some(gateway)),
        };
        // Only this function sets it, so it cannot already be populated
        let _ = session.ready.set(ready);

        Ok(session)
    }
}

#[serenity::async_trait]
impl Session for DiscordSession {
    fn ready(&self) -> Result<&ReadyInfo, TriageError> {
        self.ready.get().ok_or(TriageError::SessionNotReady)
    }

    async fn guild_profile(&self, guild_id: u64) -> Result<GuildProfile, Error> {
        debug!("Fetching guild {}", guild_id);
        let guild = self.http.get_guild_with_counts(GuildId::new(guild_id)).await?;

        let mut roles: Vec<RoleGrant> = guild
            .roles
            .values()
            .map(|role| RoleGrant {
                id: role.id.get(),
                name: role.name.clone(),
                position: role.position,
                permissions: role.permissions,
            })
            .collect();
        roles.sort_by_key(|role| (role.position, role.id));

        let mut features = guild.features;
        features.sort();

        Ok(GuildProfile {
            name: guild.name,
            owner_id: guild.owner_id.get(),
            member_count: guild.approximate_member_count,
            description: guild.description,
            features,
            roles,
            verification_level: level_name(VERIFICATION_LEVELS, u8::from(guild.verification_level)),
            mfa_level: level_name(MFA_LEVELS, u8::from(guild.mfa_level)),
            nsfw_level: level_name(NSFW_LEVELS, u8::from(guild.nsfw_level)),
            premium_tier: level_name(PREMIUM_TIERS, u8::from(guild.premium_tier)),
            premium_subscribers: guild.premium_subscription_count,
            afk_timeout: guild.afk_metadata.map(|afk| u16::from(afk.afk_timeout)),
            system_channel_id: guild.system_channel_id.map(|id| id.get()),
            emojis_total: guild.emojis.len(),
            stickers_total: guild.stickers.len(),
        })
    }

    async fn channels(&self, guild_id: u64) -> Result<Vec<ChannelInfo>, Error> {
        debug!("Fetching channels for guild {}", guild_id);
        let channels = self.http.get_channels(GuildId::new(guild_id)).await?;

        Ok(channels.iter().map(channel_info).collect())
    }

    async fn member(&self, guild_id: u64, user_id: u64) -> Result<MemberRecord, Error> {
        debug!("Fetching member {} in guild {}", user_id, guild_id);
        let member = self
            .http
            .get_member(GuildId::new(guild_id), UserId::new(user_id))
            .await?;

        Ok(MemberRecord {
            roles: member.roles.iter().map(|role| role.get()).collect(),
            nick: member.nick,
            joined_at: member.joined_at.map(|at| at.to_utc()),
        })
    }

    async fn recent_messages(&self, channel_id: u64, limit: u8) -> Result<Vec<MessageLine>, Error> {
        let messages = ChannelId::new(channel_id)
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await?;

        Ok(messages
            .iter()
            .map(|message| MessageLine {
                id: message.id.get(),
                author_id: message.author.id.get(),
                author: message.author.tag(),
                content: message.content.clone(),
                timestamp: message.timestamp.to_utc(),
            })
            .collect())
    }

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<u64, Error> {
        let message = ChannelId::new(channel_id).say(&self.http, content).await?;

        Ok(message.id.get())
    }

    async fn create_invite(&self, channel_id: u64, options: InviteOptions) -> Result<String, Error> {
        let builder = CreateInvite::new()
            .max_age(u32::try_from(options.max_age.as_secs())?)
            .max_uses(options.max_uses)
            .temporary(false)
            .unique(true)
            .audit_log_reason(INVITE_REASON);
        let invite = ChannelId::new(channel_id).create_invite(&*self.http, builder).await?;

        Ok(invite.url())
    }

    fn watch(&self, channel_id: u64) -> Result<ChannelWatch, TriageError> {
        let ready = self.ready()?;

        Ok(ChannelWatch::new(channel_id, ready.identity.id, self.messages.subscribe()))
    }

    async fn shutdown(&self) {
        let Some(gateway) = self.gateway.lock().await.take() else {
            return;
        };

        info!("Shutting down gateway");
        self.shard_manager.shutdown_all().await;
        match gateway.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Gateway ended with error: {}", err),
            Err(err) => warn!("Gateway task failed: {}", err),
        }
    }
}

/// Lower-case name for a numeric guild level, or the raw value when Discord adds a new one
fn level_name(names: &[&str], value: u8) -> String {
    match names.get(usize::from(value)) {
        Some(name) => name.to_string(),
        None => format!("unknown({value})"),
    }
}

fn channel_info(channel: &GuildChannel) -> ChannelInfo {
    ChannelInfo {
        id: channel.id.get(),
        name: channel.name.clone(),
        kind: channel_kind(channel.kind),
        parent_id: channel.parent_id.map(|id| id.get()),
        position: channel.position,
        nsfw: channel.nsfw,
        topic: channel.topic.clone(),
        slowmode_seconds: channel.rate_limit_per_user.unwrap_or(0),
        overwrites: channel.permission_overwrites.iter().filter_map(overwrite).collect(),
    }
}

fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Text => ChannelKind::Text,
        ChannelType::Voice => ChannelKind::Voice,
        ChannelType::Category => ChannelKind::Category,
        ChannelType::News => ChannelKind::News,
        ChannelType::Stage => ChannelKind::Stage,
        ChannelType::Forum => ChannelKind::Forum,
        ChannelType::NewsThread | ChannelType::PublicThread | ChannelType::PrivateThread => ChannelKind::Thread,
        _ => ChannelKind::Other,
    }
}

fn overwrite(overwrite: &PermissionOverwrite) -> Option<Overwrite> {
    let target = match overwrite.kind {
        PermissionOverwriteType::Role(role_id) => OverwriteTarget::Role(role_id.get()),
        PermissionOverwriteType::Member(user_id) => OverwriteTarget::Member(user_id.get()),
        _ => return None,
    };

    Some(Overwrite {
        target,
        allow: overwrite.allow,
        deny: overwrite.deny,
    })
}
