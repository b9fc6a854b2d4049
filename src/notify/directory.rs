use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Deserialize;

use crate::config::BotNames;
use crate::github::WebhookEvent;
use crate::notify::involvement::InvolvementReason;

/// Which kinds of involvement a user wants to hear about.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(from = "PreferenceOverrides")]
pub struct Preferences {
    pub creator: bool,
    pub mentioned_in_body: bool,
    pub mentioned_in_comment: bool,
    pub assignee: bool,
    pub reviewer: bool,
    pub sender: bool,
    pub workflow_complete: bool,
    /// Notify the pull request author about reviews submitted by bots.
    pub notify_on_bot_review: bool,
    /// Notify the pull request author about reviews submitted by humans.
    pub notify_on_human_review: bool,
}

impl Preferences {
    pub fn is_enabled(&self, reason: InvolvementReason) -> bool {
        match reason {
            InvolvementReason::Creator => self.creator,
            InvolvementReason::MentionedInBody => self.mentioned_in_body,
            InvolvementReason::MentionedInComment => self.mentioned_in_comment,
            InvolvementReason::Assignee => self.assignee,
            InvolvementReason::Reviewer => self.reviewer,
            InvolvementReason::Sender => self.sender,
            InvolvementReason::WorkflowComplete => self.workflow_complete,
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            creator: false,
            mentioned_in_body: true,
            mentioned_in_comment: true,
            assignee: true,
            reviewer: true,
            sender: false,
            workflow_complete: true,
            notify_on_bot_review: false,
            notify_on_human_review: true,
        }
    }
}

/// A partial set of preferences, as written in a preference file.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PreferenceOverrides {
    creator: Option<bool>,
    #[serde(alias = "@issue")]
    mentioned_in_body: Option<bool>,
    #[serde(alias = "@comment")]
    mentioned_in_comment: Option<bool>,
    assignee: Option<bool>,
    reviewer: Option<bool>,
    sender: Option<bool>,
    #[serde(alias = "workflow_run_complete")]
    workflow_complete: Option<bool>,
    #[serde(alias = "bot_pr_review")]
    notify_on_bot_review: Option<bool>,
    #[serde(alias = "pr_review")]
    notify_on_human_review: Option<bool>,
}

impl PreferenceOverrides {
    pub fn apply_to(&self, base: &Preferences) -> Preferences {
        Preferences {
            creator: self.creator.unwrap_or(base.creator),
            mentioned_in_body: self.mentioned_in_body.unwrap_or(base.mentioned_in_body),
            mentioned_in_comment: self
                .mentioned_in_comment
                .unwrap_or(base.mentioned_in_comment),
            assignee: self.assignee.unwrap_or(base.assignee),
            reviewer: self.reviewer.unwrap_or(base.reviewer),
            sender: self.sender.unwrap_or(base.sender),
            workflow_complete: self.workflow_complete.unwrap_or(base.workflow_complete),
            notify_on_bot_review: self
                .notify_on_bot_review
                .unwrap_or(base.notify_on_bot_review),
            notify_on_human_review: self
                .notify_on_human_review
                .unwrap_or(base.notify_on_human_review),
        }
    }
}

impl From<PreferenceOverrides> for Preferences {
    fn from(overrides: PreferenceOverrides) -> Self {
        overrides.apply_to(&Preferences::default())
    }
}

/// Identifier of a Lark user, used to `@`-mention them in a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LarkUserId(String);

impl LarkUserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LarkUserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub github_login: String,
    pub lark_id: LarkUserId,
    pub preferences: Preferences,
}

impl UserRecord {
    /// Does the user want to be notified about `event`, in which they are involved for `reasons`?
    pub fn should_notify(
        &self,
        reasons: &[InvolvementReason],
        event: &WebhookEvent,
        bot_names: &BotNames,
    ) -> bool {
        if reasons
            .iter()
            .any(|reason| self.preferences.is_enabled(*reason))
        {
            return true;
        }
        match event {
            WebhookEvent::PullRequestReview(_) if reasons.contains(&InvolvementReason::Creator) => {
                if bot_names.contains(event.sender()) {
                    self.preferences.notify_on_bot_review
                } else {
                    self.preferences.notify_on_human_review
                }
            }
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("GitHub user `{0}` is not in the user directory")]
    UnknownUser(String),
    #[error("Cannot read user directory {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid user directory line {line}: `{content}`")]
    InvalidLine { line: usize, content: String },
    #[error("User directory reload was interrupted")]
    ReloadTask(#[from] tokio::task::JoinError),
}

/// Maps GitHub logins to Lark users and their notification preferences.
///
/// The directory is loaded from a text file with one `<github-login> <lark-id> [<preference-file>]`
/// record per line.
#[derive(Debug)]
pub struct Directory {
    path: PathBuf,
    defaults: Preferences,
    users: HashMap<String, UserRecord>,
    loaded_at: Instant,
}

impl Directory {
    pub fn load(path: &Path, defaults: &Preferences) -> Result<Self, DirectoryError> {
        let users = read_directory(path, defaults)?;
        tracing::info!("Loaded {} user(s) from {}", users.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            defaults: *defaults,
            users,
            loaded_at: Instant::now(),
        })
    }

    /// Reads the directory file again. The current records are kept if the file cannot be loaded.
    pub async fn reload(&mut self) -> Result<(), DirectoryError> {
        // Rate limit failed reloads as well
        self.loaded_at = Instant::now();
        let path = self.path.clone();
        let defaults = self.defaults;
        let users =
            tokio::task::spawn_blocking(move || read_directory(&path, &defaults)).await??;
        tracing::info!(
            "Reloaded {} user(s) from {}",
            users.len(),
            self.path.display()
        );
        self.users = users;
        Ok(())
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    pub fn get(&self, login: &str) -> Option<&UserRecord> {
        self.users.get(login)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Finds the Lark user that should be notified about `event` on behalf of `login`.
    ///
    /// Returns `Ok(None)` for known users that do not want to be notified for any of `reasons`.
    pub fn resolve(
        &self,
        login: &str,
        reasons: &[InvolvementReason],
        event: &WebhookEvent,
        bot_names: &BotNames,
    ) -> Result<Option<&LarkUserId>, DirectoryError> {
        let user = self
            .get(login)
            .ok_or_else(|| DirectoryError::UnknownUser(login.to_string()))?;
        Ok(user
            .should_notify(reasons, event, bot_names)
            .then_some(&user.lark_id))
    }
}

fn read_directory(
    path: &Path,
    defaults: &Preferences,
) -> Result<HashMap<String, UserRecord>, DirectoryError> {
    let content = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

    let mut users = HashMap::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(login), Some(lark_id)) = (fields.next(), fields.next()) else {
            return Err(DirectoryError::InvalidLine {
                line: index + 1,
                content: line.to_string(),
            });
        };
        let preferences = match fields.next() {
            Some(file) => load_preferences(&base_dir.join(file), defaults),
            None => *defaults,
        };
        users.insert(
            login.to_string(),
            UserRecord {
                github_login: login.to_string(),
                lark_id: LarkUserId::new(lark_id),
                preferences,
            },
        );
    }
    Ok(users)
}

/// Loads a preference file, falling back to `defaults` when it cannot be used.
fn load_preferences(path: &Path, defaults: &Preferences) -> Preferences {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            tracing::warn!(
                "Cannot read preference file {}, using defaults: {error:?}",
                path.display()
            );
            return *defaults;
        }
    };
    match parse_preference_file(&content) {
        Ok(overrides) => overrides.apply_to(defaults),
        Err(error) => {
            tracing::warn!(
                "Cannot parse preference file {}, using defaults: {error:?}",
                path.display()
            );
            *defaults
        }
    }
}

/// Old preference keys, with the keys that replaced them.
const LEGACY_KEYS: [(&str, &str); 5] = [
    ("@issue", "mentioned_in_body"),
    ("@comment", "mentioned_in_comment"),
    ("workflow_run_complete", "workflow_complete"),
    ("bot_pr_review", "notify_on_bot_review"),
    ("pr_review", "notify_on_human_review"),
];

/// Parses a JSON preference file. When a file sets both a legacy key and its replacement, the
/// replacement wins.
fn parse_preference_file(content: &str) -> Result<PreferenceOverrides, serde_json::Error> {
    let mut keys: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
    for (legacy, key) in LEGACY_KEYS {
        if keys.contains_key(key) && keys.remove(legacy).is_some() {
            tracing::warn!("Preference `{legacy}` is overridden by `{key}`");
        }
    }
    serde_json::from_value(serde_json::Value::Object(keys))
}

#[cfg(test)]
mod tests {
    use crate::config::BotNames;
    use crate::notify::directory::{
        Directory, DirectoryError, LarkUserId, PreferenceOverrides, Preferences,
    };
    use crate::notify::involvement::InvolvementReason::*;
    use crate::tests::directory::DirectoryFixture;
    use crate::tests::payload::{issue_event, review_event};

    #[test]
    fn load_records() {
        let fixture = DirectoryFixture::new(
            r#"
# login lark-id [preferences]
alice ou_alice

bob   ou_bob  bob.json
"#,
        )
        .with_file("bob.json", r#"{"assignee": false}"#);
        let directory = fixture.load();
        assert_eq!(directory.len(), 2);

        let alice = directory.get("alice").unwrap();
        assert_eq!(alice.lark_id, LarkUserId::new("ou_alice"));
        assert_eq!(alice.preferences, Preferences::default());

        let bob = directory.get("bob").unwrap();
        assert!(!bob.preferences.assignee);
        assert!(bob.preferences.reviewer);
    }

    #[test]
    fn load_line_with_single_field() {
        let fixture = DirectoryFixture::new("alice ou_alice\nbob\n");
        let error = Directory::load(fixture.path(), &Preferences::default()).unwrap_err();
        assert!(matches!(error, DirectoryError::InvalidLine { line: 2, .. }));
    }

    #[test]
    fn load_missing_file() {
        let fixture = DirectoryFixture::new("");
        let error = Directory::load(&fixture.path().with_file_name("missing"), &Preferences::default())
            .unwrap_err();
        assert!(matches!(error, DirectoryError::Io { .. }));
    }

    #[test]
    fn missing_preference_file_uses_defaults() {
        let fixture = DirectoryFixture::new("alice ou_alice missing.json");
        let directory = fixture.load();
        assert_eq!(
            directory.get("alice").unwrap().preferences,
            Preferences::default()
        );
    }

    #[test]
    fn invalid_preference_file_uses_defaults() {
        let fixture =
            DirectoryFixture::new("alice ou_alice alice.json").with_file("alice.json", "{oops");
        let defaults = Preferences {
            sender: true,
            ..Preferences::default()
        };
        let directory = Directory::load(fixture.path(), &defaults).unwrap();
        assert_eq!(directory.get("alice").unwrap().preferences, defaults);
    }

    #[test]
    fn preference_file_overrides_process_defaults() {
        let fixture = DirectoryFixture::new("alice ou_alice alice.json")
            .with_file("alice.json", r#"{"creator": true}"#);
        let defaults = Preferences {
            reviewer: false,
            ..Preferences::default()
        };
        let directory = Directory::load(fixture.path(), &defaults).unwrap();
        let prefs = directory.get("alice").unwrap().preferences;
        assert!(prefs.creator);
        assert!(!prefs.reviewer);
    }

    #[test]
    fn legacy_preference_keys() {
        let overrides: PreferenceOverrides = serde_json::from_str(
            r#"{
                "@issue": false,
                "@comment": false,
                "workflow_run_complete": false,
                "bot_pr_review": true,
                "pr_review": false,
                "something_else": 1
            }"#,
        )
        .unwrap();
        let prefs = overrides.apply_to(&Preferences::default());
        insta::assert_debug_snapshot!(prefs, @r###"
        Preferences {
            creator: false,
            mentioned_in_body: false,
            mentioned_in_comment: false,
            assignee: true,
            reviewer: true,
            sender: false,
            workflow_complete: false,
            notify_on_bot_review: true,
            notify_on_human_review: false,
        }
        "###);
    }

    #[test]
    fn legacy_key_next_to_its_replacement() {
        let fixture = DirectoryFixture::new("alice ou_alice alice.json").with_file(
            "alice.json",
            r#"{"@issue": false, "mentioned_in_body": true, "pr_review": false, "creator": true}"#,
        );
        let preferences = fixture.load().get("alice").unwrap().preferences;
        assert!(preferences.mentioned_in_body);
        assert!(!preferences.notify_on_human_review);
        assert!(preferences.creator);
    }

    #[test]
    fn resolve_unknown_user() {
        let directory = DirectoryFixture::new("alice ou_alice").load();
        let event = issue_event("opened").create();
        let result = directory.resolve("mallory", &[Assignee], &event, &BotNames::default());
        assert!(matches!(result, Err(DirectoryError::UnknownUser(login)) if login == "mallory"));
    }

    #[test]
    fn resolve_enabled_reason() {
        let directory = DirectoryFixture::new("alice ou_alice").load();
        let event = issue_event("opened").create();
        let id = directory
            .resolve("alice", &[Creator, Assignee], &event, &BotNames::default())
            .unwrap();
        assert_eq!(id, Some(&LarkUserId::new("ou_alice")));
    }

    #[test]
    fn resolve_all_reasons_disabled() {
        let fixture = DirectoryFixture::new("alice ou_alice alice.json").with_file(
            "alice.json",
            r#"{"assignee": false, "mentioned_in_body": false}"#,
        );
        let directory = fixture.load();
        let event = issue_event("opened").create();
        let id = directory
            .resolve(
                "alice",
                &[Assignee, MentionedInBody],
                &event,
                &BotNames::default(),
            )
            .unwrap();
        assert_eq!(id, None);
    }

    #[test]
    fn resolve_human_review() {
        let directory = DirectoryFixture::new("erin ou_erin").load();
        let event = review_event("submitted").sender("frank").author("erin").create();
        let id = directory
            .resolve("erin", &[Creator], &event, &BotNames::default())
            .unwrap();
        assert_eq!(id, Some(&LarkUserId::new("ou_erin")));
    }

    #[test]
    fn resolve_bot_review() {
        let fixture = DirectoryFixture::new("erin ou_erin\ngrace ou_grace grace.json")
            .with_file("grace.json", r#"{"notify_on_bot_review": true}"#);
        let directory = fixture.load();
        let event = review_event("submitted")
            .sender("coderabbitai[bot]")
            .create();
        let bots = BotNames::default();
        assert_eq!(
            directory.resolve("erin", &[Creator], &event, &bots).unwrap(),
            None
        );
        assert_eq!(
            directory.resolve("grace", &[Creator], &event, &bots).unwrap(),
            Some(&LarkUserId::new("ou_grace"))
        );
    }

    #[test]
    fn review_flags_only_apply_to_reviews() {
        let directory = DirectoryFixture::new("erin ou_erin").load();
        let event = issue_event("opened").create();
        let id = directory
            .resolve("erin", &[Creator], &event, &BotNames::default())
            .unwrap();
        assert_eq!(id, None);
    }

    #[tokio::test]
    async fn reload_swaps_records() {
        let fixture = DirectoryFixture::new("alice ou_alice");
        let mut directory = fixture.load();
        let first_load = directory.loaded_at();

        fixture.write("alice ou_alice2\nbob ou_bob");
        directory.reload().await.unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(
            directory.get("alice").unwrap().lark_id,
            LarkUserId::new("ou_alice2")
        );
        assert!(directory.loaded_at() >= first_load);
    }

    #[tokio::test]
    async fn failed_reload_keeps_records() {
        let fixture = DirectoryFixture::new("alice ou_alice");
        let mut directory = fixture.load();

        fixture.write("alice");
        assert!(matches!(
            directory.reload().await,
            Err(DirectoryError::InvalidLine { line: 1, .. })
        ));
        assert_eq!(directory.len(), 1);
        assert!(directory.get("alice").is_some());
    }
}
