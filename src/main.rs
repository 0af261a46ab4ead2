mod actions;
mod console;
mod credential;
mod error;
mod export;
mod handler;
mod permissions;
mod present;
mod session;
mod settings;
mod snapshot;
mod util;
mod watch;

#[cfg(test)]
mod test_util;

use crate::console::{Console, Interrupt, Prompt};
use crate::credential::{Credential, TokenMeta};
use crate::error::TriageError;
use crate::session::{DiscordSession, Session};
use crate::settings::TriageConfig;
use crate::snapshot::SnapshotBuilder;
use chrono::Utc;
use dotenvy::dotenv;
use std::future::Future;
use std::process::ExitCode;
use tracing::{error, info};

type Error = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok(); // ignore errors

    let config = match settings::load(settings::config_path()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr so they never interleave with menu output
    tracing_subscriber::fmt()
        .with_ansi(config.ansi.colors)
        .with_max_level(config.log_level())
        .with_writer(std::io::stderr)
        .init();

    let config = &config;
    let outcome = run(config, Prompt::stdin(), Interrupt::ctrl_c(), |credential| async move {
        DiscordSession::connect(&credential, config).await
    })
    .await;

    ExitCode::from(exit_status(outcome))
}

/// Reports a failed run once, through the log on stderr
fn exit_status(outcome: Result<(), TriageError>) -> u8 {
    match outcome {
        Ok(()) => 0,
        Err(err) => {
            error!("{}", err);
            1
        }
    }
}

/// Credential, connect, snapshot, console, shutdown. Ctrl-C anywhere is a clean exit.
async fn run<S, F, Fut>(
    config: &TriageConfig,
    prompt: Prompt,
    interrupt: Interrupt,
    connect: F,
) -> Result<(), TriageError>
where
    S: Session,
    F: FnOnce(Credential) -> Fut,
    Fut: Future<Output = Result<S, TriageError>>,
{
    match triage(config, prompt, interrupt, connect).await {
        Err(TriageError::Interrupted) => {
            println!("\nInterrupted by user.");
            Ok(())
        }
        other => other,
    }
}

async fn triage<S, F, Fut>(
    config: &TriageConfig,
    mut prompt: Prompt,
    mut interrupt: Interrupt,
    connect: F,
) -> Result<(), TriageError>
where
    S: Session,
    F: FnOnce(Credential) -> Fut,
    Fut: Future<Output = Result<S, TriageError>>,
{
    let credential = interrupt
        .guard(credential::obtain(&config.discord.token_env, &mut prompt))
        .await?;
    print!("{}", present::token_meta(&TokenMeta::decode(credential.token())));
    if !interrupt.guard(prompt.confirm("Connect with this token?", true)).await? {
        println!("Not connecting.");
        return Ok(());
    }

    let session = interrupt.guard(connect(credential)).await?;
    let outcome = explore(&session, prompt, interrupt, config).await;
    session.shutdown().await;
    info!("Session closed");

    outcome
}

async fn explore<S: Session>(
    session: &S,
    prompt: Prompt,
    mut interrupt: Interrupt,
    config: &TriageConfig,
) -> Result<(), TriageError> {
    let builder = SnapshotBuilder::new(session);
    let snapshot = interrupt.guard(builder.build(Utc::now())).await?;

    Console::new(session, prompt, interrupt, config, snapshot).run().await
}
