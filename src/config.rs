use chrono::{FixedOffset, Offset, Utc};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::feed::SeenPolicy;

#[derive(Parser, Debug)]
#[command(name = "once", about = "Share one truth a day")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub feed: FeedConfig,
    pub posts: PostsConfig,
    pub profile: ProfileConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API. Empty means same-origin only.
    pub cors_origins: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub min_password_len: usize,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub daily_view_limit: u32,
    pub candidate_pool: u32,
    pub seen_policy: SeenPolicy,
    /// Offset from UTC that defines "today" for quotas, streaks and the daily post.
    pub utc_offset_minutes: i32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PostsConfig {
    pub caption_max_chars: usize,
    pub image_max_bytes: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ProfileConfig {
    pub username_cooldown_days: i64,
    pub avatar_max_bytes: usize,
    pub bio_max_chars: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "once_session".to_string(),
            session_hours: 720,
            min_password_len: 6,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            daily_view_limit: crate::feed::DAILY_VIEW_LIMIT,
            candidate_pool: 50,
            seen_policy: SeenPolicy::Permanent,
            utc_offset_minutes: 0,
        }
    }
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            caption_max_chars: 240,
            image_max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            username_cooldown_days: 30,
            avatar_max_bytes: 5 * 1024 * 1024,
            bio_max_chars: 160,
        }
    }
}

impl FeedConfig {
    /// Fixed offset for local-day arithmetic. Out-of-range values fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("once.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("media"));
        }

        if config.feed.daily_view_limit == 0 {
            anyhow::bail!("feed.daily_view_limit must be at least 1");
        }
        if config.feed.utc_offset_minutes.abs() >= 24 * 60 {
            anyhow::bail!("feed.utc_offset_minutes must be within a day of UTC");
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".once")
        })
    }

    /// Resolved by `load`; a default config points at the working directory.
    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("once.db"))
    }

    pub fn media_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("media"))
    }
}
