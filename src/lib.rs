//! This is the library of the GitHub to Lark notification bot.
pub mod config;
pub mod event_log;
pub mod github;
pub mod lark;
pub mod notify;
pub mod utils;

pub use config::NotifySettings;
pub use event_log::EventLog;
pub use github::meta::{HookIpAllowList, IpCheck};
pub use github::server::{create_app, ServerState};
pub use lark::{ChatNotifier, LarkBotClient};
pub use notify::directory::Directory;
pub use notify::dispatch::{DispatchOutcome, Dispatcher};
pub use notify::process::create_notify_process;

#[cfg(test)]
mod tests;
