use config::{Environment, File, Map, Source, Value};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Ansi {
    pub(crate) colors: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Log {
    pub(crate) level: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Discord {
    /// Environment variable the token is read from before prompting
    pub(crate) token_env: String,
    /// Request the GUILD_MEMBERS and MESSAGE_CONTENT gateway intents
    pub(crate) privileged_intents: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Export {
    pub(crate) dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Console {
    pub(crate) channel_detail_rows: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct TriageConfig {
    pub(crate) ansi: Ansi,
    pub(crate) log: Log,
    pub(crate) discord: Discord,
    pub(crate) export: Export,
    pub(crate) console: Console,
}

#[derive(Debug)]
struct DefaultSettings;

impl Source for DefaultSettings {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(Self)
    }

    fn collect(&self) -> Result<Map<String, Value>, ::config::ConfigError> {
        let mut defaults = HashMap::new();
        defaults.insert("ansi.colors".to_string(), true.into());
        defaults.insert("log.level".to_string(), "warn".into());
        defaults.insert("discord.token_env".to_string(), "DISCORD_BOT_TOKEN".into());
        defaults.insert("discord.privileged_intents".to_string(), true.into());
        defaults.insert("export.dir".to_string(), ".".into());
        defaults.insert("console.channel_detail_rows".to_string(), 25i64.into());

        Ok(defaults)
    }
}

pub fn build_config(
    config_file: Option<PathBuf>,
) -> Result<::config::Config, ::config::ConfigError> {
    ::config::Config::builder()
        .add_source(DefaultSettings)
        .add_source(
            config_file
                .map(File::from)
                .unwrap_or_else(|| File::with_name("config/tokentriage"))
                .required(false),
        )
        .add_source(Environment::with_prefix("TRIAGE").separator("__"))
        .build()
}

pub fn load(config_file: Option<PathBuf>) -> Result<TriageConfig, ::config::ConfigError> {
    build_config(config_file)?.try_deserialize()
}
