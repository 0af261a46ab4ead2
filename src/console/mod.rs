//! Interactive menus: guild list, guild menu and channel menu.
//!
//! Prompts and remote calls are raced against Ctrl-C. Once the process has claimed the signal
//! the default handler no longer terminates it, so an interrupt unwinds the menus and the caller
//! shuts the session down. During a live watch it only ends the watch.

mod interrupt;
mod prompt;

pub use interrupt::Interrupt;
pub use prompt::{parse_selection, Prompt, Selection};

use crate::actions::{self, HistoryDepth};
use crate::error::TriageError;
use crate::export;
use crate::present;
use crate::session::{InviteOptions, Session};
use crate::settings::TriageConfig;
use crate::snapshot::{AccessSnapshot, ChannelSummary, SnapshotBuilder};
use chrono::Utc;
use tracing::{info, warn};

const GUILD_ACTIONS: &str = "1) Select channel  2) Guild triage  3) Export guild JSON  \
                             4) Export all guilds JSON  5) Refresh  6) Back";

const CHANNEL_ACTIONS: &str = "1) Show bot permissions\n\
                               2) Read last 25 messages\n\
                               3) Read last 100 messages\n\
                               4) LIVE watch (Ctrl-C to stop)\n\
                               5) Send message\n\
                               6) Create invite\n\
                               7) Back";

pub struct Console<'a, S: ?Sized> {
    session: &'a S,
    prompt: Prompt,
    interrupt: Interrupt,
    config: &'a TriageConfig,
    snapshot: AccessSnapshot,
}

impl<'a, S> Console<'a, S>
where
    S: Session + ?Sized,
{
    pub fn new(
        session: &'a S,
        prompt: Prompt,
        interrupt: Interrupt,
        config: &'a TriageConfig,
        snapshot: AccessSnapshot,
    ) -> Self {
        Self {
            session,
            prompt,
            interrupt,
            config,
            snapshot,
        }
    }

    pub fn snapshot(&self) -> &AccessSnapshot {
        &self.snapshot
    }

    /// Runs until the operator leaves the guild list, closes stdin or presses Ctrl-C
    pub async fn run(&mut self) -> Result<(), TriageError> {
        match self.guild_list().await {
            Err(TriageError::Interrupted) => {
                println!("\nInterrupted by user.");
                Ok(())
            }
            other => other,
        }
    }

    async fn ask(&mut self, question: &str) -> Result<String, TriageError> {
        let answer = self.interrupt.guard(self.prompt.ask(question)).await?;
        answer.ok_or(TriageError::Interrupted)
    }

    async fn ask_or(&mut self, question: &str, default: &str) -> Result<String, TriageError> {
        let answer = self.interrupt.guard(self.prompt.ask_or(question, default)).await?;
        answer.ok_or(TriageError::Interrupted)
    }

    async fn guild_list(&mut self) -> Result<(), TriageError> {
        loop {
            println!("{}", present::session_overview(&self.snapshot));
            print!("{}", present::guild_list(&self.snapshot));
            if self.snapshot.guilds.is_empty() {
                return Ok(());
            }

            let raw = self.ask("Pick guild number (blank to exit)").await?;
            match parse_selection(&raw, self.snapshot.guilds.len()) {
                Selection::Blank => return Ok(()),
                Selection::Index(i) => {
                    let guild_id = self.snapshot.guilds[i].id;
                    self.guild_menu(guild_id).await?;
                }
                Selection::Invalid => println!("Invalid selection."),
                Selection::OutOfRange => println!("Out of range."),
            }
        }
    }

    async fn guild_menu(&mut self, guild_id: u64) -> Result<(), TriageError> {
        loop {
            let Some(guild) = self.snapshot.guild(guild_id) else {
                println!("Guild {guild_id} is no longer visible to this bot.");
                return Ok(());
            };
            println!("\n{}{GUILD_ACTIONS}", present::guild_header(guild));

            let result = match self.ask("Action").await?.as_str() {
                "1" => self.choose_channel(guild_id).await,
                "2" => {
                    if let Some(guild) = self.snapshot.guild(guild_id) {
                        print!("{}", present::guild_triage(guild, self.config.console.channel_detail_rows));
                    }
                    Ok(())
                }
                "3" => self.export(Some(guild_id)).await,
                "4" => self.export(None).await,
                "5" => self.refresh().await,
                "6" | "" => return Ok(()),
                _ => {
                    println!("Invalid action.");
                    Ok(())
                }
            };
            report(result)?;
        }
    }

    async fn choose_channel(&mut self, guild_id: u64) -> Result<(), TriageError> {
        loop {
            let Some(guild) = self.snapshot.guild(guild_id) else {
                return Ok(());
            };
            let channels = guild.browsable_channels();
            print!("{}", present::channel_list(guild, &channels));
            if channels.is_empty() {
                return Ok(());
            }
            let channels: Vec<ChannelSummary> = channels.into_iter().cloned().collect();

            let raw = self.ask("Pick channel number (blank to cancel)").await?;
            match parse_selection(&raw, channels.len()) {
                Selection::Blank => return Ok(()),
                Selection::Index(i) => return self.channel_menu(&channels[i]).await,
                Selection::Invalid => println!("Invalid selection."),
                Selection::OutOfRange => println!("Out of range."),
            }
        }
    }

    async fn channel_menu(&mut self, channel: &ChannelSummary) -> Result<(), TriageError> {
        print!("{}", present::channel_permissions(channel));

        loop {
            println!("\n== Channel Menu: #{} ==\n{CHANNEL_ACTIONS}", channel.name);

            let result = match self.ask("Action").await?.as_str() {
                "1" => {
                    print!("{}", present::channel_permissions(channel));
                    Ok(())
                }
                "2" => self.history(channel, HistoryDepth::Recent).await,
                "3" => self.history(channel, HistoryDepth::Extended).await,
                "4" => self.live_watch(channel).await,
                "5" => self.send(channel).await,
                "6" => self.invite(channel).await,
                "7" | "" => return Ok(()),
                _ => {
                    println!("Invalid action.");
                    Ok(())
                }
            };
            report(result)?;
        }
    }

    async fn history(&mut self, channel: &ChannelSummary, depth: HistoryDepth) -> Result<(), TriageError> {
        let messages = self
            .interrupt
            .guard(actions::read_history(self.session, channel, depth))
            .await?;
        print!("{}", present::message_list(channel, &messages));
        Ok(())
    }

    async fn live_watch(&mut self, channel: &ChannelSummary) -> Result<(), TriageError> {
        let watch = self.session.watch(channel.id)?;
        println!("LIVE watch on #{}. Press Ctrl-C to stop.", channel.name);

        let delivered = watch
            .run_until(self.interrupt.pressed(), |message| {
                println!("{}", present::live_line(message))
            })
            .await;
        println!("LIVE watch stopped after {delivered} message(s).");
        Ok(())
    }

    async fn send(&mut self, channel: &ChannelSummary) -> Result<(), TriageError> {
        let text = self.ask("Message").await?;
        let id = self
            .interrupt
            .guard(actions::send_message(self.session, channel, &text))
            .await?;
        println!("Sent message id={id}");
        Ok(())
    }

    async fn invite(&mut self, channel: &ChannelSummary) -> Result<(), TriageError> {
        let defaults = InviteOptions::default();
        let max_age = self
            .ask_or(
                "Max age (0 = never, e.g. 10m, 1h, 7d)",
                &humantime::format_duration(defaults.max_age).to_string(),
            )
            .await?;
        let max_age = actions::parse_max_age(&max_age)?;
        let max_uses = self
            .ask_or("Max uses (0 = unlimited)", &defaults.max_uses.to_string())
            .await?;
        let max_uses = actions::parse_max_uses(&max_uses)?;

        let options = InviteOptions { max_age, max_uses };
        let url = self
            .interrupt
            .guard(actions::create_invite(self.session, channel, options))
            .await?;
        println!("Invite created: {url}");
        Ok(())
    }

    async fn export(&mut self, guild_id: Option<u64>) -> Result<(), TriageError> {
        let path = self
            .interrupt
            .guard(export::write_report(&self.snapshot, guild_id, &self.config.export.dir))
            .await?;
        println!("Saved triage report to {}", path.display());
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), TriageError> {
        let builder = SnapshotBuilder::new(self.session);
        let snapshot = self.interrupt.guard(builder.build(Utc::now())).await?;
        info!("Snapshot refreshed with {} guild(s)", snapshot.guilds.len());
        println!("Refreshed snapshot: {} guild(s).", snapshot.guilds.len());
        self.snapshot = snapshot;
        Ok(())
    }
}

/// Prints a failed action and keeps the menu going. Interrupts and fatal errors propagate.
fn report(result: Result<(), TriageError>) -> Result<(), TriageError> {
    match result {
        Err(err) if err.is_fatal() || matches!(err, TriageError::Interrupted) => Err(err),
        Err(err) => {
            warn!("Action failed: {:?}", err);
            println!("Action failed: {err}");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
