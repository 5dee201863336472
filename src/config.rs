use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Interchangeable hosts serving the same catalog API.
pub const MIRROR_HOSTS: [&str; 7] = [
    "h5.aoneroom.com",
    "movieboxapp.in",
    "moviebox.pk",
    "moviebox.ph",
    "moviebox.id",
    "v.moviebox.ph",
    "netnaija.video",
];

const DEFAULT_MIRROR_INDEX: usize = 2;
const API_PREFIX: &str = "/wefeed-h5-bff";
const DEFAULT_APP_NAME: &str = "moviebox";
const DEFAULT_TRENDING_UID: &str = "5591179548772780352";
const DEFAULT_TIMEZONE: &str = "Africa/Nairobi";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:137.0) Gecko/20100101 Firefox/137.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub log_format: LogFormat,
    pub upstream: UpstreamConfig,
}

/// Connection settings for the active mirror, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Value sent in the `Host` header.
    pub host: String,
    /// Scheme and authority, e.g. `https://moviebox.pk`. Also the default referer.
    pub host_url: String,
    pub timeout: Duration,
    pub app_name: String,
    pub trending_uid: String,
    pub timezone: String,
    pub user_agent: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("invalid PORT")?;

        let bind: IpAddr = env::var("MOVIEBOX_BIND")
            .unwrap_or_else(|_| "0.0.0.0".to_string())
            .parse()
            .context("invalid MOVIEBOX_BIND")?;

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => bail!("LOG_FORMAT must be `text` or `json`, got `{other}`"),
        };

        let host = env::var("MOVIEBOX_API_HOST")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| MIRROR_HOSTS[DEFAULT_MIRROR_INDEX].to_string());
        let scheme = env::var("MOVIEBOX_API_SCHEME").unwrap_or_else(|_| "https".to_string());
        if scheme != "https" && scheme != "http" {
            bail!("MOVIEBOX_API_SCHEME must be `http` or `https`, got `{scheme}`");
        }

        let mut upstream = UpstreamConfig::new(format!("{scheme}://{host}"));
        upstream.host = host;
        upstream.timeout = parse_duration("MOVIEBOX_TIMEOUT_SECONDS", 30)?;

        Ok(Self {
            listen_addr: SocketAddr::new(bind, port),
            log_format,
            upstream,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }
}

impl UpstreamConfig {
    /// Settings for the given base URL with every other field at its default.
    /// The `Host` header is derived from the URL authority.
    pub fn new(host_url: impl Into<String>) -> Self {
        let host_url = host_url.into().trim_end_matches('/').to_string();
        let host = host_url
            .split_once("://")
            .map_or(host_url.as_str(), |(_, authority)| authority)
            .to_string();

        Self {
            host,
            host_url,
            timeout: Duration::from_secs(30),
            app_name: DEFAULT_APP_NAME.to_string(),
            trending_uid: DEFAULT_TRENDING_UID.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Absolute URL for an API path such as `/web/home`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.host_url)
    }

    /// Referer the download endpoint expects for a subject page.
    pub fn movie_page_url(&self, detail_path: &str) -> String {
        format!("{}/movies/{detail_path}", self.host_url)
    }
}

fn parse_duration(env_key: &str, default_secs: u64) -> Result<Duration> {
    let raw = env::var(env_key).unwrap_or_else(|_| default_secs.to_string());
    let secs: u64 = raw
        .parse()
        .with_context(|| format!("{env_key} must be an integer number of seconds"))?;

    Ok(Duration::from_secs(secs))
}
