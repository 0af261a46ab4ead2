//! Plain-text rendering of snapshots, channels and messages for the console.

use crate::credential::TokenMeta;
use crate::session::MessageLine;
use crate::snapshot::{AccessSnapshot, ChannelSummary, Facet, GuildSummary};
use crate::util::{clip, fmt_dt, yes_no};
use crate::watch::WatchedMessage;
use itertools::Itertools;
use std::fmt::{self, Display, Write};

const MESSAGE_CLIP: usize = 180;
const LIVE_CLIP: usize = 260;
const NO_HISTORY_NAMES: usize = 10;

/// Left-aligned text table sized to its widest cell per column
struct Table {
    title: String,
    header: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(title: impl Into<String>, header: Vec<&'static str>) -> Self {
        Self {
            title: title.into(),
            header,
            rows: Vec::new(),
        }
    }

    fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn field(&mut self, name: &str, value: impl Display) {
        self.row(vec![name.to_string(), value.to_string()]);
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        writeln!(f, "== {} ==", self.title)?;
        writeln!(f, "{}", padded(self.header.iter().copied(), &widths))?;
        writeln!(f, "{}", widths.iter().map(|w| "-".repeat(*w)).join("  "))?;
        for row in &self.rows {
            writeln!(f, "{}", padded(row.iter().map(String::as_str), &widths))?;
        }
        Ok(())
    }
}

fn padded<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .join("  ")
        .trim_end()
        .to_string()
}

fn or_unknown<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

pub fn token_meta(meta: &TokenMeta) -> String {
    let mut table = Table::new("Token Triage", vec!["Field", "Value"]);
    table.field("Length", meta.raw_length);
    table.field("Sections", meta.sections);
    table.field("Looks Bot Token", meta.looks_like_bot_token);
    table.field("Decoded User ID", or_unknown(meta.user_id));
    table.field("Decoded Created", fmt_dt(meta.created_at));
    if let Some(note) = &meta.note {
        table.field("Decode Note", note);
    }
    table.to_string()
}

pub fn session_overview(snapshot: &AccessSnapshot) -> String {
    let degraded = snapshot.guilds.iter().filter(|g| g.is_degraded()).count();

    let mut out = String::from("== Discord Bot Console ==\n");
    let _ = writeln!(out, "User:     {} ({})", snapshot.bot, snapshot.bot.id);
    if let Some(global_name) = &snapshot.bot.global_name {
        let _ = writeln!(out, "Name:     {global_name}");
    }
    let _ = writeln!(out, "Guilds:   {} ({degraded} degraded)", snapshot.guilds.len());
    let _ = writeln!(out, "Members:  {}", snapshot.total_members());
    let _ = writeln!(out, "Captured: {}", fmt_dt(Some(snapshot.captured_at)));
    out
}

pub fn guild_list(snapshot: &AccessSnapshot) -> String {
    if snapshot.guilds.is_empty() {
        return "No guilds available for this bot.\n".to_string();
    }

    let mut table = Table::new("Guilds", vec!["#", "Guild", "ID", "Members", "Notes"]);
    for (i, guild) in snapshot.guilds.iter().enumerate() {
        let notes = guild.failures.iter().map(|f| format!("no {}", f.facet)).join(", ");
        table.row(vec![
            (i + 1).to_string(),
            guild.display_name(),
            guild.id.to_string(),
            or_unknown(guild.member_count),
            notes,
        ]);
    }
    table.to_string()
}

/// One-line access summary shown above the guild menu
pub fn guild_header(guild: &GuildSummary) -> String {
    let cap = guild.capability();
    format!(
        "== Guild: {} ==\nviewable={}/{}  history={}  send={}\n",
        guild.display_name(),
        cap.text_viewable,
        cap.text_total,
        cap.text_history,
        cap.text_send
    )
}

pub fn channel_list(guild: &GuildSummary, channels: &[&ChannelSummary]) -> String {
    if channels.is_empty() {
        return "No viewable text channels.\n".to_string();
    }

    let mut table = Table::new(
        format!("Text Channels: {}", guild.display_name()),
        vec!["#", "Channel", "View", "History", "Send", "Invite"],
    );
    for (i, channel) in channels.iter().enumerate() {
        table.row(vec![
            (i + 1).to_string(),
            format!("#{}", channel.name),
            yes_no(channel.can_view).to_string(),
            yes_no(channel.can_read).to_string(),
            yes_no(channel.can_send).to_string(),
            yes_no(channel.can_invite).to_string(),
        ]);
    }
    table.to_string()
}

fn failure_reason(guild: &GuildSummary, facet: Facet) -> String {
    guild
        .failures
        .iter()
        .find(|f| f.facet == facet)
        .map_or_else(|| "unavailable".to_string(), |f| format!("unavailable: {}", f.error))
}

pub fn guild_triage(guild: &GuildSummary, detail_rows: usize) -> String {
    let mut out = String::new();

    let mut identity = Table::new(format!("Guild Triage: {}", guild.display_name()), vec!["Field", "Value"]);
    identity.field("Guild", format!("{} ({})", guild.display_name(), guild.id));
    if guild.failed(Facet::Profile) {
        identity.field("Profile", failure_reason(guild, Facet::Profile));
    }
    identity.field(
        "Owner",
        guild.owner.map_or_else(
            || "?".to_string(),
            |o| format!("{}{}", o.id, if o.bot_is_owner { " (this bot)" } else { "" }),
        ),
    );
    identity.field("Created", fmt_dt(guild.created_at));
    identity.field("Members", or_unknown(guild.member_count));
    identity.field("Roles", or_unknown(guild.roles_total));
    identity.field("Top Role", guild.top_role.as_deref().unwrap_or("?"));
    identity.field("Verification", or_unknown(guild.verification_level.as_deref()));
    identity.field("MFA Level", or_unknown(guild.mfa_level.as_deref()));
    identity.field("NSFW Level", or_unknown(guild.nsfw_level.as_deref()));
    identity.field(
        "Boosts",
        format!("{} ({})", or_unknown(guild.premium_tier.as_deref()), or_unknown(guild.premium_subscribers)),
    );
    // Unset optional settings read as "-", unfetched ones as "?"
    let unset = if guild.failed(Facet::Profile) { "?" } else { "-" };
    identity.field(
        "AFK Timeout",
        guild
            .afk_timeout
            .map_or_else(|| unset.to_string(), |secs| format!("{secs}s")),
    );
    identity.field(
        "System Channel",
        guild.system_channel_id.map_or_else(|| unset.to_string(), |id| id.to_string()),
    );
    identity.field(
        "Emojis/Stickers",
        format!("{}/{}", or_unknown(guild.emojis_total), or_unknown(guild.stickers_total)),
    );
    identity.field(
        "Bot Member",
        guild.bot_member.as_ref().map_or_else(
            || "?".to_string(),
            |m| format!("{} (joined {})", m.display_name, fmt_dt(m.joined_at)),
        ),
    );
    if let Some(features) = &guild.features {
        identity.field("Features", if features.is_empty() { "-".to_string() } else { features.join(", ") });
    }
    if let Some(description) = guild.description.as_deref() {
        identity.field("Description", clip(Some(description), MESSAGE_CLIP));
    }
    out.push_str(&identity.to_string());

    out.push('\n');
    let mut capability = Table::new("Bot Capability Summary", vec!["Metric", "Value"]);
    match (&guild.channels, &guild.permissions) {
        (Some(_), Some(permissions)) => {
            let cap = guild.capability();
            capability.field("Text Channels", cap.text_total);
            capability.field("Viewable", cap.text_viewable);
            capability.field("Readable History", cap.text_history);
            capability.field("Send Allowed", cap.text_send);
            capability.field("Invite Allowed", cap.text_invite);
            capability.field("Voice Channels", cap.voice_total);
            capability.field("Guild Admin", yes_no(Some(permissions.administrator)));
            capability.field("Manage Guild", yes_no(Some(permissions.manage_guild)));
            capability.field("Manage Roles", yes_no(Some(permissions.manage_roles)));
        }
        (None, _) => capability.field("Channels", failure_reason(guild, Facet::Channels)),
        (_, None) => capability.field("Permissions", failure_reason(guild, Facet::Permissions)),
    }
    out.push_str(&capability.to_string());

    if let Some(types) = &guild.channel_types {
        out.push('\n');
        let mut table = Table::new("Channel Type Breakdown", vec!["Type", "Count"]);
        for (kind, count) in types.entries() {
            table.field(kind, count);
        }
        out.push_str(&table.to_string());
    }

    if let Some(flags) = &guild.risk_flags {
        out.push('\n');
        let mut table = Table::new("Permission Risk Flags", vec!["Flag", "Count"]);
        table.field("No View", flags.text_no_view_count);
        table.field("View But No History", flags.view_but_no_history_count);
        table.field("View But No Send", flags.view_but_no_send_count);
        table.field("View But No Invite", flags.view_but_no_invite_count);
        out.push_str(&table.to_string());
    }

    let text_channels: Vec<&ChannelSummary> = guild
        .channels
        .iter()
        .flatten()
        .filter(|c| c.kind.is_text_like())
        .collect();
    if !text_channels.is_empty() {
        out.push('\n');
        let mut detail = Table::new(
            format!("Text Channel Detail (first {detail_rows})"),
            vec!["Channel", "Category", "View", "Hist", "Send", "Invite", "NSFW", "Slow"],
        );
        for channel in text_channels.iter().take(detail_rows) {
            detail.row(vec![
                format!("#{}", channel.name),
                channel.category.clone().unwrap_or_else(|| "-".to_string()),
                yes_no(channel.can_view).to_string(),
                yes_no(channel.can_read).to_string(),
                yes_no(channel.can_send).to_string(),
                yes_no(channel.can_invite).to_string(),
                yes_no(Some(channel.nsfw)).to_string(),
                channel.slowmode_seconds.to_string(),
            ]);
        }
        out.push_str(&detail.to_string());

        if text_channels.len() > detail_rows {
            let _ = writeln!(
                out,
                "Showing {detail_rows}/{} text channels. Use export for full data.",
                text_channels.len()
            );
        }
    }

    if let Some(flags) = guild.risk_flags.as_ref().filter(|f| !f.view_but_no_history.is_empty()) {
        let mut names = flags.view_but_no_history.iter().take(NO_HISTORY_NAMES).join(", ");
        if flags.view_but_no_history.len() > NO_HISTORY_NAMES {
            let _ = write!(names, " (+{} more)", flags.view_but_no_history.len() - NO_HISTORY_NAMES);
        }
        let _ = write!(out, "\n== Viewable But No History ==\n{names}\n");
    }

    out
}

pub fn channel_permissions(channel: &ChannelSummary) -> String {
    let mut table = Table::new(format!("Permissions: #{}", channel.name), vec!["Permission", "State"]);
    match &channel.permissions {
        Some(permissions) => {
            for (name, allowed) in permissions.entries() {
                table.field(name, yes_no(Some(allowed)));
            }
            table.field("Bitfield", permissions.value);
        }
        None => table.field("Access", "? (bot permissions could not be resolved)"),
    }
    table.to_string()
}

pub fn message_list(channel: &ChannelSummary, messages: &[MessageLine]) -> String {
    if messages.is_empty() {
        return "No messages returned.\n".to_string();
    }

    let mut table = Table::new(
        format!("Last {} messages in #{}", messages.len(), channel.name),
        vec!["Time", "Author", "Content"],
    );
    for message in messages {
        table.row(vec![
            fmt_dt(Some(message.timestamp)),
            message.author.clone(),
            clip(Some(&message.content), MESSAGE_CLIP),
        ]);
    }
    table.to_string()
}

pub fn live_line(message: &WatchedMessage) -> String {
    format!(
        "[LIVE] {} {}: {}",
        fmt_dt(Some(message.timestamp)),
        message.author,
        clip(Some(&message.content), LIVE_CLIP)
    )
}
