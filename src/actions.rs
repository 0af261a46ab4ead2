//! One-shot actions against a single channel.
//!
//! Each action is checked against the snapshot's computed access first so a request Discord
//! would refuse is never sent. Access that was never determined is left for Discord to decide.

use crate::error::{Action, TriageError};
use crate::session::{InviteOptions, MessageLine, Session};
use crate::snapshot::ChannelSummary;
use std::time::Duration;
use tracing::{debug, info};

pub const MAX_INVITE_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const MAX_INVITE_USES: u8 = 100;

#[derive(Debug, Copy, Clone, Eq, PartialEq, derive_more::Display)]
pub enum HistoryDepth {
    #[display("25")]
    Recent,
    #[display("100")]
    Extended,
}

impl HistoryDepth {
    pub fn limit(self) -> u8 {
        match self {
            HistoryDepth::Recent => 25,
            HistoryDepth::Extended => 100,
        }
    }
}

/// Latest messages in the channel, oldest first
pub async fn read_history<S: Session + ?Sized>(
    session: &S,
    channel: &ChannelSummary,
    depth: HistoryDepth,
) -> Result<Vec<MessageLine>, TriageError> {
    if channel.can_read == Some(false) {
        let missing = if channel.can_view == Some(false) {
            "View Channel"
        } else {
            "Read Message History"
        };
        return Err(TriageError::permission_denied(Action::ReadHistory, &channel.name, missing));
    }

    debug!("Fetching last {} messages from #{}", depth, channel.name);
    let mut messages = session
        .recent_messages(channel.id, depth.limit())
        .await
        .map_err(TriageError::RemoteRejected)?;
    messages.reverse();

    Ok(messages)
}

/// Returns the id of the sent message
pub async fn send_message<S: Session + ?Sized>(
    session: &S,
    channel: &ChannelSummary,
    text: &str,
) -> Result<u64, TriageError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TriageError::invalid_input("Message is empty"));
    }

    if channel.can_send == Some(false) {
        let missing = if channel.can_view == Some(false) {
            "View Channel"
        } else {
            "Send Messages"
        };
        return Err(TriageError::permission_denied(Action::SendMessage, &channel.name, missing));
    }

    let id = session
        .send_message(channel.id, text)
        .await
        .map_err(TriageError::RemoteRejected)?;
    info!("Sent message {} to #{}", id, channel.name);

    Ok(id)
}

/// Returns the invite URL
pub async fn create_invite<S: Session + ?Sized>(
    session: &S,
    channel: &ChannelSummary,
    options: InviteOptions,
) -> Result<String, TriageError> {
    if options.max_age > MAX_INVITE_AGE {
        return Err(TriageError::invalid_input(format!(
            "Invite max age cannot exceed {}",
            humantime::format_duration(MAX_INVITE_AGE)
        )));
    }
    if options.max_uses > MAX_INVITE_USES {
        return Err(TriageError::invalid_input(format!(
            "Invite max uses cannot exceed {MAX_INVITE_USES}"
        )));
    }

    if channel.can_invite == Some(false) {
        return Err(TriageError::permission_denied(
            Action::CreateInvite,
            &channel.name,
            "Create Instant Invite",
        ));
    }

    let url = session
        .create_invite(channel.id, options)
        .await
        .map_err(TriageError::RemoteRejected)?;
    info!("Created invite {} for #{}", url, channel.name);

    Ok(url)
}

/// Accepts `0` for "never" as well as humantime durations such as `10m` or `1h 30m`
pub fn parse_max_age(raw: &str) -> Result<Duration, TriageError> {
    let raw = raw.trim();
    if raw == "0" {
        return Ok(Duration::ZERO);
    }

    humantime::parse_duration(raw)
        .or_else(|_| raw.parse::<u64>().map(Duration::from_secs))
        .map_err(|_| TriageError::invalid_input(format!("`{raw}` is not a duration")))
}

pub fn parse_max_uses(raw: &str) -> Result<u8, TriageError> {
    raw.trim()
        .parse::<u8>()
        .map_err(|_| TriageError::invalid_input(format!("`{}` is not a use count", raw.trim())))
}
