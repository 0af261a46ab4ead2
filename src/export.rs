//! JSON export of a snapshot, whole or filtered to one guild.

use crate::error::TriageError;
use crate::session::BotIdentity;
use crate::snapshot::{AccessSnapshot, GuildSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Serialize)]
struct ExportDocument<'a> {
    bot: &'a BotIdentity,
    captured_at: DateTime<Utc>,
    guilds: Vec<&'a GuildSummary>,
}

/// Pretty JSON with a trailing newline. Unknown guild ids give an empty `guilds` array.
pub fn render_json(snapshot: &AccessSnapshot, guild_id: Option<u64>) -> Result<String, TriageError> {
    let document = ExportDocument {
        bot: &snapshot.bot,
        captured_at: snapshot.captured_at,
        guilds: snapshot
            .guilds
            .iter()
            .filter(|g| guild_id.map_or(true, |id| g.id == id))
            .collect(),
    };

    let mut json = serde_json::to_string_pretty(&document)?;
    json.push('\n');

    Ok(json)
}

pub fn file_name(guild_id: Option<u64>, captured_at: DateTime<Utc>) -> String {
    let scope = guild_id.map_or_else(|| "all".to_string(), |id| id.to_string());

    format!("triage_{scope}_{}.json", captured_at.format("%Y%m%d_%H%M%S"))
}

/// Writes the report into `dir`, creating the directory if needed
pub async fn write_report(
    snapshot: &AccessSnapshot,
    guild_id: Option<u64>,
    dir: &Path,
) -> Result<PathBuf, TriageError> {
    let json = render_json(snapshot, guild_id)?;
    let path = dir.join(file_name(guild_id, snapshot.captured_at));

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, json).await?;
    info!("Saved triage report to {}", path.display());

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotBuilder;
    use crate::test_util::{captured_at, two_guild_session, GUILD_A, GUILD_B};
    use serde_json::Value;

    async fn degraded_snapshot() -> AccessSnapshot {
        let mut session = two_guild_session();
        session.members.insert(GUILD_B, Err("Unknown Member".to_string()));
        SnapshotBuilder::new(&session).build(captured_at()).await.unwrap()
    }

    #[tokio::test]
    async fn same_snapshot_exports_identically() {
        let snapshot = degraded_snapshot().await;

        let first = render_json(&snapshot, None).unwrap();
        let second = render_json(&snapshot, None).unwrap();

        assert_eq!(first, second);
        assert!(first.ends_with("}\n"));
    }

    #[tokio::test]
    async fn degraded_fields_are_null_not_missing() {
        let snapshot = degraded_snapshot().await;
        let json: Value = serde_json::from_str(&render_json(&snapshot, Some(GUILD_B)).unwrap()).unwrap();

        assert_eq!(json["captured_at"], "2024-05-01T12:30:00Z");
        assert_eq!(json["bot"]["id"], 900);

        let guilds = json["guilds"].as_array().unwrap();
        assert_eq!(guilds.len(), 1);
        let guild = guilds[0].as_object().unwrap();
        assert_eq!(guild["id"], GUILD_B);
        assert_eq!(guild["name"], "Guild B");
        assert!(guild.contains_key("permissions"));
        assert!(guild["permissions"].is_null());
        assert!(guild["risk_flags"].is_null());
        assert!(guild.contains_key("bot_member"));
        assert!(guild["bot_member"].is_null());
        assert_eq!(guild["verification_level"], "medium");
        assert_eq!(guild["failures"][0]["facet"], "permissions");
        assert_eq!(guild["failures"][0]["error"], "Unknown Member");

        let channel = guild["channels"][0].as_object().unwrap();
        assert_eq!(channel["type"], "text");
        assert!(channel["can_read"].is_null());
        assert!(channel["can_send"].is_null());
    }

    #[tokio::test]
    async fn readable_guild_exports_flags() {
        let snapshot = degraded_snapshot().await;
        let json: Value = serde_json::from_str(&render_json(&snapshot, Some(GUILD_A)).unwrap()).unwrap();
        let guild = &json["guilds"][0];

        assert_eq!(guild["owner"]["bot_is_owner"], false);
        assert_eq!(guild["member_count"], 10);
        assert_eq!(guild["permissions"]["send_messages"], true);
        assert_eq!(guild["permissions"]["administrator"], false);
        assert_eq!(guild["channels"].as_array().unwrap().len(), 3);
        assert_eq!(guild["channels"][0]["slowmode_seconds"], 0);
        assert_eq!(guild["premium_tier"], "tier_1");
        assert_eq!(guild["afk_timeout"], 300);
        assert!(guild["system_channel_id"].is_null());
        assert_eq!(guild["bot_member"]["display_name"], "triage-bot");
        assert_eq!(guild["bot_member"]["joined_at"], "2024-04-01T12:30:00Z");
        assert!(guild["created_at"].is_string());
        assert_eq!(guild["failures"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn file_names_use_capture_time() {
        assert_eq!(file_name(Some(GUILD_A), captured_at()), "triage_1001_20240501_123000.json");
        assert_eq!(file_name(None, captured_at()), "triage_all_20240501_123000.json");
    }

    #[tokio::test]
    async fn report_is_written_to_export_dir() {
        let snapshot = degraded_snapshot().await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reports");

        let path = write_report(&snapshot, None, &target).await.unwrap();

        assert_eq!(path, target.join("triage_all_20240501_123000.json"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, render_json(&snapshot, None).unwrap());
    }
}
