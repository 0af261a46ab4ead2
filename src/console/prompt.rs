use crate::error::TriageError;
use std::io::{self, BufRead, Write};
use tokio::sync::mpsc;
use tracing::debug;

/// Outcome of reading a menu selection
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Selection {
    Blank,
    /// Zero-based index into the listed items
    Index(usize),
    Invalid,
    OutOfRange,
}

/// Interpret a 1-based menu choice against `count` listed items
pub fn parse_selection(raw: &str, count: usize) -> Selection {
    let raw = raw.trim();
    if raw.is_empty() {
        return Selection::Blank;
    }

    match raw.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Selection::Index(n - 1),
        Ok(_) => Selection::OutOfRange,
        Err(_) => Selection::Invalid,
    }
}

/// Answers buffered between the reader thread and the prompt
const LINE_BUFFER: usize = 16;

/// Line-oriented questions fed by a dedicated reader thread.
///
/// Blocking reads happen on a plain thread instead of tokio's blocking pool, so an
/// unanswered question never holds up runtime shutdown.
pub struct Prompt {
    lines: mpsc::Receiver<io::Result<String>>,
}

impl Prompt {
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()))
    }

    pub fn new<B>(reader: B) -> Self
    where
        B: BufRead + Send + 'static,
    {
        let (tx, lines) = mpsc::channel(LINE_BUFFER);
        std::thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
            debug!("Input reader finished");
        });

        Self { lines }
    }

    /// Trimmed answer, or `None` once input is exhausted. Cancel safe.
    pub async fn ask(&mut self, question: &str) -> Result<Option<String>, TriageError> {
        print!("{question}: ");
        io::stdout().flush()?;

        match self.lines.recv().await {
            Some(line) => Ok(Some(line?.trim().to_string())),
            None => Ok(None),
        }
    }

    pub async fn ask_or(&mut self, question: &str, default: &str) -> Result<Option<String>, TriageError> {
        let answer = self.ask(&format!("{question} [{default}]")).await?;

        Ok(answer.map(|a| if a.is_empty() { default.to_string() } else { a }))
    }

    /// Yes or no with `default` for a blank or unrecognised answer. Exhausted input declines.
    pub async fn confirm(&mut self, question: &str, default: bool) -> Result<bool, TriageError> {
        let hint = if default { "Y/n" } else { "y/N" };
        let Some(answer) = self.ask(&format!("{question} [{hint}]")).await? else {
            return Ok(false);
        };

        Ok(match answer.to_lowercase().as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default,
        })
    }
}
