use crate::error::TriageError;
use crate::permissions::RoleGrant;
use crate::session::{
    BotIdentity, ChannelInfo, ChannelKind, GuildProfile, InviteOptions, MemberRecord, MessageLine, ReadyInfo,
    Session,
};
use crate::console::Prompt;
use crate::watch::{ChannelWatch, WatchedMessage, WATCH_BUFFER};
use crate::Error;
use chrono::{DateTime, TimeZone, Utc};
use serenity::all::Permissions;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{mpsc, Arc, Mutex};
use tokio::sync::broadcast;

pub const BOT_ID: u64 = 900;
pub const BOT_ROLE: u64 = 50;
pub const GUILD_A: u64 = 1001;
pub const GUILD_B: u64 = 1002;
pub const GENERAL: u64 = 2001;

#[ctor::ctor]
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn captured_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
}

/// In-memory session. Missing map entries behave like failed requests.
pub struct FakeSession {
    pub ready: Option<ReadyInfo>,
    pub profiles: HashMap<u64, Result<GuildProfile, String>>,
    pub channels: HashMap<u64, Result<Vec<ChannelInfo>, String>>,
    pub members: HashMap<u64, Result<MemberRecord, String>>,
    pub messages: HashMap<u64, Vec<MessageLine>>,
    /// Every action call fails with this error when set
    pub reject_actions: Option<String>,
    /// Action calls are recorded and then never complete
    pub stall_actions: bool,
    /// Remote action calls in the order they were made
    pub calls: Arc<Mutex<Vec<String>>>,
    pub events: broadcast::Sender<WatchedMessage>,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self {
            ready: None,
            profiles: HashMap::new(),
            channels: HashMap::new(),
            members: HashMap::new(),
            messages: HashMap::new(),
            reject_actions: None,
            stall_actions: false,
            calls: Arc::new(Mutex::new(Vec::new())),
            events: broadcast::channel(WATCH_BUFFER).0,
        }
    }
}

impl FakeSession {
    pub fn ready_with_guilds(guild_ids: Vec<u64>) -> Self {
        Self {
            ready: Some(ReadyInfo {
                identity: BotIdentity {
                    id: BOT_ID,
                    name: "triage-bot".to_string(),
                    discriminator: Some(1234),
                    global_name: None,
                },
                guild_ids,
            }),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn call(&self, what: String) -> Result<(), Error> {
        self.calls.lock().unwrap().push(what);
        if self.stall_actions {
            std::future::pending::<()>().await;
        }
        match &self.reject_actions {
            Some(reason) => Err(reason.clone().into()),
            None => Ok(()),
        }
    }
}

fn lookup<T: Clone>(map: &HashMap<u64, Result<T, String>>, key: u64) -> Result<T, Error> {
    match map.get(&key) {
        Some(Ok(value)) => Ok(value.clone()),
        Some(Err(reason)) => Err(reason.clone().into()),
        None => Err(format!("Unknown resource {key}").into()),
    }
}

pub fn role(id: u64, name: &str, position: u16, permissions: Permissions) -> RoleGrant {
    RoleGrant {
        id,
        name: name.to_string(),
        position,
        permissions,
    }
}

pub fn channel(id: u64, name: &str, kind: ChannelKind, position: u16, parent_id: Option<u64>) -> ChannelInfo {
    ChannelInfo {
        id,
        name: name.to_string(),
        kind,
        parent_id,
        position,
        nsfw: false,
        topic: None,
        slowmode_seconds: 0,
        overwrites: Vec::new(),
    }
}

fn profile(name: &str, guild_id: u64, member_count: u64) -> GuildProfile {
    GuildProfile {
        name: name.to_string(),
        owner_id: 1,
        member_count: Some(member_count),
        description: None,
        features: vec!["COMMUNITY".to_string()],
        roles: vec![
            role(
                guild_id,
                "@everyone",
                0,
                Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY,
            ),
            role(
                BOT_ROLE,
                "Triage",
                1,
                Permissions::SEND_MESSAGES | Permissions::CREATE_INSTANT_INVITE,
            ),
        ],
        verification_level: "medium".to_string(),
        mfa_level: "none".to_string(),
        nsfw_level: "default".to_string(),
        premium_tier: "tier_1".to_string(),
        premium_subscribers: Some(3),
        afk_timeout: Some(300),
        system_channel_id: None,
        emojis_total: 4,
        stickers_total: 0,
    }
}

pub fn bot_membership(roles: Vec<u64>) -> MemberRecord {
    MemberRecord {
        roles,
        nick: None,
        joined_at: Some(captured_at() - chrono::Duration::days(30)),
    }
}

/// Reader that blocks until the returned sender is used or dropped
struct HeldKeyboard(mpsc::Receiver<()>);

impl Read for HeldKeyboard {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        let _ = self.0.recv();
        Ok(0)
    }
}

/// A prompt whose next answer never arrives while the sender is held
pub fn stalled_prompt() -> (mpsc::Sender<()>, Prompt) {
    let (keyboard, held) = mpsc::channel();
    let prompt = Prompt::new(std::io::BufReader::new(HeldKeyboard(held)));

    (keyboard, prompt)
}

/// Two guilds where everything can be fetched. Guild A has a category and two text channels.
pub fn two_guild_session() -> FakeSession {
    let mut session = FakeSession::ready_with_guilds(vec![GUILD_A, GUILD_B]);

    session.profiles.insert(GUILD_A, Ok(profile("Guild A", GUILD_A, 10)));
    session.profiles.insert(GUILD_B, Ok(profile("Guild B", GUILD_B, 250)));

    // Listed out of position order on purpose
    session.channels.insert(
        GUILD_A,
        Ok(vec![
            channel(GENERAL, "general", ChannelKind::Text, 1, Some(3000)),
            channel(3000, "Text", ChannelKind::Category, 0, None),
            channel(2002, "chat", ChannelKind::Text, 2, Some(3000)),
        ]),
    );
    session.channels.insert(
        GUILD_B,
        Ok(vec![
            channel(2101, "lobby", ChannelKind::Text, 0, None),
            channel(2102, "Voice", ChannelKind::Voice, 1, None),
        ]),
    );

    session.members.insert(GUILD_A, Ok(bot_membership(vec![BOT_ROLE])));
    session.members.insert(GUILD_B, Ok(bot_membership(vec![BOT_ROLE])));

    session
}

#[serenity::async_trait]
impl Session for FakeSession {
    fn ready(&self) -> Result<&ReadyInfo, TriageError> {
        self.ready.as_ref().ok_or(TriageError::SessionNotReady)
    }

    async fn guild_profile(&self, guild_id: u64) -> Result<GuildProfile, Error> {
        lookup(&self.profiles, guild_id)
    }

    async fn channels(&self, guild_id: u64) -> Result<Vec<ChannelInfo>, Error> {
        lookup(&self.channels, guild_id)
    }

    async fn member(&self, guild_id: u64, _user_id: u64) -> Result<MemberRecord, Error> {
        lookup(&self.members, guild_id)
    }

    async fn recent_messages(&self, channel_id: u64, limit: u8) -> Result<Vec<MessageLine>, Error> {
        self.call(format!("history {channel_id} {limit}")).await?;
        let messages = self.messages.get(&channel_id).cloned().unwrap_or_default();

        Ok(messages.into_iter().take(usize::from(limit)).collect())
    }

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<u64, Error> {
        self.call(format!("send {channel_id} {content}")).await?;

        Ok(42)
    }

    async fn create_invite(&self, channel_id: u64, options: InviteOptions) -> Result<String, Error> {
        self.call(format!(
            "invite {channel_id} {} {}",
            options.max_age.as_secs(),
            options.max_uses
        ))
        .await?;

        Ok("https://discord.gg/triage".to_string())
    }

    fn watch(&self, channel_id: u64) -> Result<ChannelWatch, TriageError> {
        let ready = self.ready()?;

        Ok(ChannelWatch::new(channel_id, ready.identity.id, self.events.subscribe()))
    }

    async fn shutdown(&self) {
        self.calls.lock().unwrap().push("shutdown".to_string());
    }
}
