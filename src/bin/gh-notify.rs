use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use url::Url;

use gh_notify::github::meta::meta_client;
use gh_notify::github::ReceivedWebhook;
use gh_notify::notify::process::handle_webhook;
use gh_notify::{
    create_app, create_notify_process, Directory, Dispatcher, EventLog, HookIpAllowList, IpCheck,
    LarkBotClient, NotifySettings, ServerState,
};

#[derive(clap::Parser)]
#[command(about = "Forwards GitHub webhook events to a Lark group chat")]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for GitHub webhooks and post notifications to Lark.
    Serve(ServeOpts),
    /// Dispatch a single webhook payload stored in a file, e.g. from the event log.
    Replay(ReplayOpts),
}

#[derive(Args)]
struct CommonOpts {
    /// Webhook URL of the Lark bot.
    #[arg(env = "LARK_BOT_URL")]
    lark_bot_url: Url,

    /// File mapping GitHub logins to Lark user IDs.
    #[arg(long, env = "USER_CONFIG_FILE", default_value = "user_list")]
    user_config_file: PathBuf,

    /// Optional TOML file with bot settings.
    #[arg(long, env = "NOTIFY_SETTINGS")]
    settings: Option<PathBuf>,
}

#[derive(Args)]
struct ServeOpts {
    #[command(flatten)]
    common: CommonOpts,

    /// Port on which the webhook server listens.
    #[arg(long, env = "PORT", default_value_t = 9002)]
    port: u16,

    /// Save every received webhook, not just those that failed.
    #[arg(long)]
    log_event: bool,

    /// Directory where webhooks are saved.
    #[arg(long, env = "EVENT_LOG_DIR", default_value = "event_log")]
    event_log_dir: PathBuf,

    /// Accept webhooks from any IP address.
    #[arg(long)]
    no_ip_check: bool,

    /// Base URL of the GitHub API, used to fetch the webhook IP ranges.
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    github_api_url: String,
}

#[derive(Args)]
struct ReplayOpts {
    #[command(flatten)]
    common: CommonOpts,

    /// Kind of the event, as sent in the `X-GitHub-Event` header.
    event_kind: String,

    /// JSON file with the webhook payload.
    event_json_file: PathBuf,
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Arc<NotifySettings>> {
    let settings = match path {
        Some(path) => NotifySettings::load(path)?,
        None => NotifySettings::default(),
    };
    Ok(Arc::new(settings))
}

fn create_dispatcher(
    opts: &CommonOpts,
    settings: Arc<NotifySettings>,
) -> anyhow::Result<Dispatcher<LarkBotClient>> {
    let directory = Directory::load(&opts.user_config_file, &settings.default_preferences)
        .context("Cannot load user directory")?;
    let client = LarkBotClient::new(opts.lark_bot_url.clone(), &settings)
        .context("Cannot create Lark client")?;
    Ok(Dispatcher::new(settings, directory, client))
}

async fn serve(opts: ServeOpts) -> anyhow::Result<()> {
    let settings = load_settings(opts.common.settings.as_deref())?;
    let dispatcher = create_dispatcher(&opts.common, settings.clone())?;
    let event_log = EventLog::new(opts.event_log_dir, opts.log_event);

    let ip_check = if opts.no_ip_check {
        tracing::warn!("Webhook IP check is disabled");
        IpCheck::Disabled
    } else {
        let client =
            meta_client(&opts.github_api_url).context("Cannot create GitHub client")?;
        IpCheck::github_hooks(HookIpAllowList::new(client, settings.ip_refresh_interval))
    };

    let process = create_notify_process(dispatcher, Some(event_log));
    let state = ServerState::new(process.webhook_tx, ip_check);
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], opts.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind to {addr}"))?;
    tracing::info!("Listening on {addr}");
    let server_process =
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).into_future();

    tokio::select! {
        () = process.notify_process => {
            tracing::warn!("Notification process has ended");
            Ok(())
        },
        res = server_process => {
            tracing::warn!("Server has ended: {res:?}");
            res.context("Server failed")
        }
    }
}

async fn replay(opts: ReplayOpts) -> anyhow::Result<()> {
    let settings = load_settings(opts.common.settings.as_deref())?;
    let mut dispatcher = create_dispatcher(&opts.common, settings)?;
    let content = tokio::fs::read_to_string(&opts.event_json_file)
        .await
        .with_context(|| format!("Cannot read {}", opts.event_json_file.display()))?;
    let payload = serde_json::from_str(&content)
        .with_context(|| format!("Cannot parse {}", opts.event_json_file.display()))?;

    let webhook = ReceivedWebhook::new(opts.event_kind, payload);
    let outcome = handle_webhook(&mut dispatcher, None, &webhook).await?;
    tracing::info!("Replay finished: {outcome:?}");
    Ok(())
}

fn try_main(opts: Opts) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Cannot build tokio runtime")?;

    runtime.block_on(async move {
        match opts.command {
            Command::Serve(opts) => serve(opts).await,
            Command::Replay(opts) => replay(opts).await,
        }
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opts = Opts::parse();
    if let Err(error) = try_main(opts) {
        tracing::error!("Error: {error:?}");
        std::process::exit(1);
    }
}
