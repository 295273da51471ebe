// Configuration resolved once at startup and handed to the session
// initiator as a plain value.

use anyhow::Result;
use clap::{Args, ValueEnum};

use crate::error::DecisionError;

pub const COMMUNITY_URL: &str = "https://api.rainbird.ai";
pub const ENTERPRISE_URL: &str = "https://enterprise-api.rainbird.ai";

/// Knowledge map the client reasons over unless told otherwise.
pub const DEFAULT_KM_ID: &str = "bfaab567-6494-4dd3-bbdb-0915a32da0f7";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Hosted Rainbird environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    #[default]
    Community,
    Enterprise,
}

impl Environment {
    pub fn url(self) -> &'static str {
        match self {
            Environment::Community => COMMUNITY_URL,
            Environment::Enterprise => ENTERPRISE_URL,
        }
    }
}

/// Optional settings, each bound to a flag and an `RB_*` variable.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Knowledge map to reason over
    #[arg(long, env = "RB_KM_ID", default_value = DEFAULT_KM_ID)]
    pub km_id: String,

    /// Hosted environment
    #[arg(long, value_enum, default_value_t = Environment::Community)]
    pub environment: Environment,

    /// Explicit API endpoint; wins over --environment
    #[arg(long, env = "RB_ENVIRONMENT_URL")]
    pub environment_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "RB_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            km_id: DEFAULT_KM_ID.to_string(),
            environment: Environment::default(),
            environment_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: String,
    pub environment: Environment,
    /// Explicit endpoint; wins over `environment` when set.
    pub environment_url: Option<String>,
    pub km_id: String,
    pub timeout_secs: u64,
}

impl Config {
    /// Combine `settings` with `RB_API_KEY` from the process environment.
    pub fn from_env(settings: &Settings) -> Result<Self> {
        Self::from_lookup(settings, |key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads the API key through `lookup`.
    pub fn from_lookup<F>(settings: &Settings, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("RB_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(DecisionError::MissingApiKey)?;

        Ok(Config {
            api_key,
            environment: settings.environment,
            environment_url: settings
                .environment_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
            km_id: settings.km_id.clone(),
            timeout_secs: settings.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        self.environment_url
            .as_deref()
            .unwrap_or_else(|| self.environment.url())
    }
}
