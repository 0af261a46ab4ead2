use crate::session::{BotIdentity, ReadyInfo};
use crate::watch::WatchedMessage;
use serenity::all::{Context, EventHandler, Message, Ready, ResumedEvent};
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info};

/// Gateway event handler feeding the session.
///
/// READY is forwarded once to whoever is waiting on the connection; every new message is
/// broadcast to active channel watches.
pub(crate) struct Handler {
    ready: Mutex<Option<oneshot::Sender<ReadyInfo>>>,
    messages: broadcast::Sender<WatchedMessage>,
}

impl Handler {
    pub fn new(ready: oneshot::Sender<ReadyInfo>, messages: broadcast::Sender<WatchedMessage>) -> Self {
        Self {
            ready: Mutex::new(Some(ready)),
            messages,
        }
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            "Connected to discord as {} with {} guild(s)",
            ready.user.name,
            ready.guilds.len()
        );

        let info = ReadyInfo {
            identity: BotIdentity {
                id: ready.user.id.get(),
                name: ready.user.name.clone(),
                discriminator: ready.user.discriminator.map(|d| d.get()),
                global_name: ready.user.global_name.clone(),
            },
            guild_ids: ready.guilds.iter().map(|g| g.id.get()).collect(),
        };

        match self.ready.lock().await.take() {
            Some(sender) => {
                if sender.send(info).is_err() {
                    debug!("Nobody waiting on READY anymore");
                }
            }
            None => debug!("Gateway re-identified"),
        }
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        info!("Connection resumed");
    }

    async fn message(&self, _ctx: Context, new_message: Message) {
        // Errors only mean no watch is currently subscribed
        let _ = self.messages.send(WatchedMessage::from(&new_message));
    }
}
