//! Restricts webhook requests to the IP ranges from which GitHub delivers hooks.
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("GitHub API request failed: {0}")]
    Api(#[from] octocrab::Error),
    #[error("GitHub API request timed out after {}s", FETCH_TIMEOUT.as_secs())]
    Timeout,
    #[error("Invalid IP range `{0}`")]
    InvalidRange(String),
}

/// A CIDR block, such as `192.30.252.0/22` or `2a0a:a440::/29`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    network: IpAddr,
    prefix_len: u8,
}

impl IpRange {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip.to_canonical()) {
            (IpAddr::V4(network), IpAddr::V4(ip)) => {
                let mask = u32::MAX
                    .checked_shl(32 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                u32::from(network) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(network), IpAddr::V6(ip)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                u128::from(network) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for IpRange {
    type Err = MetaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || MetaError::InvalidRange(value.to_string());
        let (network, prefix_len) = match value.split_once('/') {
            Some((network, prefix_len)) => (network, Some(prefix_len)),
            None => (value, None),
        };
        let network = IpAddr::from_str(network).map_err(|_| invalid())?;
        let max_len = if network.is_ipv4() { 32 } else { 128 };
        let prefix_len = match prefix_len {
            Some(prefix_len) => prefix_len.parse::<u8>().map_err(|_| invalid())?,
            None => max_len,
        };
        if prefix_len > max_len {
            return Err(invalid());
        }
        Ok(Self {
            network,
            prefix_len,
        })
    }
}

impl Display for IpRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// https://docs.github.com/en/rest/meta/meta#get-github-meta-information
#[derive(serde::Deserialize, Debug)]
struct GithubMeta {
    #[serde(default)]
    hooks: Vec<String>,
}

/// Creates a client for the GitHub meta API. Failed requests are not retried.
pub fn meta_client(base_uri: &str) -> octocrab::Result<Octocrab> {
    let mut builder = Octocrab::builder();
    builder.add_retry_config(RetryConfig::None);
    builder.base_uri(base_uri)?.build()
}

/// Hook IP ranges published by the GitHub meta API, fetched lazily.
pub struct HookIpAllowList {
    client: Octocrab,
    ranges: Vec<IpRange>,
    refresh_interval: Duration,
    /// Start of the last fetch, successful or not.
    attempted_at: Option<Instant>,
}

impl HookIpAllowList {
    pub fn new(client: Octocrab, refresh_interval: Duration) -> Self {
        Self {
            client,
            ranges: vec![],
            refresh_interval,
            attempted_at: None,
        }
    }

    pub fn ranges(&self) -> &[IpRange] {
        &self.ranges
    }

    /// Is `ip` inside one of the hook ranges?
    ///
    /// The ranges are fetched at most once per refresh interval. If a fetch fails, the previous
    /// ranges are used until the next interval, and no range matches before the first success.
    pub async fn contains(&mut self, ip: IpAddr) -> bool {
        if self.needs_refresh() {
            if let Err(error) = self.refresh().await {
                tracing::warn!("Cannot refresh GitHub hook IP ranges: {error:?}");
            }
        }
        self.ranges.iter().any(|range| range.contains(ip))
    }

    fn needs_refresh(&self) -> bool {
        self.attempted_at
            .map_or(true, |attempted_at| attempted_at.elapsed() >= self.refresh_interval)
    }

    pub async fn refresh(&mut self) -> Result<(), MetaError> {
        self.attempted_at = Some(Instant::now());
        let meta: GithubMeta = tokio::time::timeout(
            FETCH_TIMEOUT,
            self.client.get::<GithubMeta, _, _>("/meta", None::<&()>),
        )
        .await
        .map_err(|_| MetaError::Timeout)??;
        let ranges = meta
            .hooks
            .iter()
            .map(|range| range.parse())
            .collect::<Result<Vec<IpRange>, _>>()?;

        tracing::info!("Loaded {} GitHub hook IP range(s)", ranges.len());
        self.ranges = ranges;
        Ok(())
    }
}

/// Decides which peers may deliver webhooks.
pub enum IpCheck {
    Disabled,
    GitHubHooks(tokio::sync::Mutex<HookIpAllowList>),
}

impl IpCheck {
    pub fn github_hooks(allow_list: HookIpAllowList) -> Self {
        Self::GitHubHooks(tokio::sync::Mutex::new(allow_list))
    }

    pub async fn is_allowed(&self, ip: IpAddr) -> bool {
        match self {
            Self::Disabled => true,
            Self::GitHubHooks(allow_list) => allow_list.lock().await.contains(ip).await,
        }
    }
}
