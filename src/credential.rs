//! Bot token input and offline token inspection.

use crate::console::Prompt;
use crate::error::TriageError;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::info;

/// Milliseconds between the unix epoch and the first second of 2015
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

const TOKEN_SECTION: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Copy, Clone, Eq, PartialEq, derive_more::Display)]
pub enum CredentialSource {
    #[display("environment")]
    Environment,
    #[display("prompt")]
    Prompt,
}

/// Bot token held for the lifetime of the process. Never written anywhere.
#[derive(derivative::Derivative, Clone)]
#[derivative(Debug)]
pub struct Credential {
    #[derivative(Debug = "ignore")]
    token: String,
    pub source: CredentialSource,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Environment wins when it holds anything other than whitespace
    pub fn select(env: Option<String>, prompted: Option<String>) -> Result<Self, TriageError> {
        let from_env = non_blank(env).map(|token| Self {
            token,
            source: CredentialSource::Environment,
        });

        from_env
            .or_else(|| {
                non_blank(prompted).map(|token| Self {
                    token,
                    source: CredentialSource::Prompt,
                })
            })
            .ok_or(TriageError::MissingCredential)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read the token from `var`, prompting only when the variable is unset or blank
pub async fn obtain(var: &str, prompt: &mut Prompt) -> Result<Credential, TriageError> {
    let env = non_blank(std::env::var(var).ok());
    let prompted = if env.is_some() {
        None
    } else {
        println!("`{var}` is not set.");
        prompt.ask("Enter bot token").await?
    };

    let credential = Credential::select(env, prompted)?;
    info!("Using token from {}", credential.source);

    Ok(credential)
}

/// What can be learned from a token without contacting Discord
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TokenMeta {
    pub raw_length: usize,
    pub sections: usize,
    pub user_id: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub looks_like_bot_token: bool,
    pub note: Option<String>,
}

impl TokenMeta {
    pub fn decode(token: &str) -> Self {
        let parts: Vec<&str> = token.split('.').collect();
        let mut meta = Self {
            raw_length: token.len(),
            sections: parts.len(),
            user_id: None,
            created_at: None,
            looks_like_bot_token: false,
            note: None,
        };

        if parts.len() != 3 {
            meta.note = Some("Token does not have 3 dot-separated sections.".to_string());
            return meta;
        }

        match decode_user_id(parts[0]) {
            Ok(user_id) => {
                meta.user_id = Some(user_id);
                meta.created_at = snowflake_time(user_id);
                meta.looks_like_bot_token = true;
            }
            Err(reason) => meta.note = Some(format!("Unable to decode token metadata: {reason}")),
        }

        meta
    }
}

fn decode_user_id(section: &str) -> Result<u64, String> {
    let bytes = TOKEN_SECTION.decode(section).map_err(|e| e.to_string())?;
    let text = String::from_utf8_lossy(&bytes);

    text.trim().parse::<u64>().map_err(|e| format!("{e} in `{text}`"))
}

/// Creation time embedded in a snowflake id
pub fn snowflake_time(id: u64) -> Option<DateTime<Utc>> {
    let millis = (id >> 22) + DISCORD_EPOCH_MS;
    DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)
}
