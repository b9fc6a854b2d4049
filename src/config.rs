use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Deserializer};

use crate::notify::directory::Preferences;

/// Accounts whose activity is treated as bot-originated.
pub const DEFAULT_BOT_NAMES: &[&str] = &["coderabbitai[bot]", "coderabbitai"];

/// Card built with the Lark card builder, see `lark::client`.
pub const DEFAULT_LARK_TEMPLATE_ID: &str = "ctp_AAHvgR0HTy2t";

/// Lark bots configured with a keyword filter only accept messages containing the keyword.
pub const DEFAULT_LARK_TITLE_PREFIX: &str = "GitHub: ";

/// Process-wide settings, loaded once at startup from an optional TOML file.
///
/// Every key is optional, a missing file section falls back to the defaults below.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NotifySettings {
    /// Logins that are never notified, and whose events are dropped when nobody opted in.
    pub bot_names: BotNames,
    /// Events correlated with an "opened" event inside this window are not notified twice.
    #[serde(deserialize_with = "deserialize_duration_from_secs")]
    pub correlation_window: Duration,
    /// Maximum number of characters of free text copied into a notification.
    pub message_body_limit: usize,
    /// Re-read the user directory at most this often. Never reloaded when unset.
    #[serde(deserialize_with = "deserialize_optional_duration_from_secs")]
    pub directory_reload_interval: Option<Duration>,
    /// How often the GitHub hook IP ranges are fetched again.
    #[serde(deserialize_with = "deserialize_duration_from_secs")]
    pub ip_refresh_interval: Duration,
    pub lark_template_id: String,
    pub lark_title_prefix: String,
    /// Preferences of users without a preference file, and the base for those with one.
    pub default_preferences: Preferences,
}

impl NotifySettings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read settings file {}", path.display()))?;
        let settings = toml::from_str(&content)
            .with_context(|| format!("Cannot parse settings file {}", path.display()))?;
        Ok(settings)
    }
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            bot_names: BotNames::default(),
            correlation_window: Duration::from_secs(2),
            message_body_limit: 1000,
            directory_reload_interval: None,
            ip_refresh_interval: Duration::from_secs(24 * 60 * 60),
            lark_template_id: DEFAULT_LARK_TEMPLATE_ID.to_string(),
            lark_title_prefix: DEFAULT_LARK_TITLE_PREFIX.to_string(),
            default_preferences: Preferences::default(),
        }
    }
}

/// Set of GitHub logins that belong to bots.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct BotNames(HashSet<String>);

impl BotNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, login: &str) -> bool {
        self.0.contains(login)
    }
}

impl Default for BotNames {
    fn default() -> Self {
        Self::new(DEFAULT_BOT_NAMES.iter().copied())
    }
}

fn deserialize_duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(seconds))
}

fn deserialize_optional_duration_from_secs<'de, D>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = Option::<u64>::deserialize(deserializer)?;
    Ok(seconds.map(Duration::from_secs))
}
