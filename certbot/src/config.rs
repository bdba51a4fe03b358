//! Hook settings and the certbot invocation environment.
//!
//! Settings are layered: built-in defaults, then the TOML file at
//! [`DEFAULT_CONFIG_FILE`] (or the path in `R01_HOOK_CONFIG`), then `R01_*`
//! environment variables. The access token usually arrives as `R01_ACCESS_TOKEN`.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    dns01_client::R01_API_URL,
    hook::{HookConfig, DEFAULT_POLL_INTERVAL, DEFAULT_RECORD_NOTE, DEFAULT_RECORD_TTL},
    state::DEFAULT_STATE_FILE,
    Error, Result,
};

pub const DEFAULT_CONFIG_FILE: &str = "/etc/certbot-r01/hook.toml";
pub const CONFIG_FILE_ENV: &str = "R01_HOOK_CONFIG";
pub const DOMAIN_ENV: &str = "CERTBOT_DOMAIN";
pub const VALIDATION_ENV: &str = "CERTBOT_VALIDATION";
pub const ENV_PREFIX: &str = "R01_";

/// String settings taken from the environment verbatim. figment parses env
/// values as data, so `R01_ACCESS_TOKEN=1234` would otherwise arrive as a number.
const VERBATIM_ENV_KEYS: [&str; 4] = ["access_token", "api_url", "state_file", "record_note"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Base URL of the registrar API
    pub api_url: String,
    /// Registrar API access token
    pub access_token: String,
    /// Scratch file holding the record id between auth and cleanup
    pub state_file: PathBuf,
    /// Seconds between DNS propagation checks
    pub poll_interval: u64,
    /// Give up waiting for propagation after this many lookups
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// TTL of the challenge record in seconds
    pub record_ttl: u32,
    /// Note attached to the challenge record
    pub record_note: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: R01_API_URL.into(),
            access_token: "".into(),
            state_file: DEFAULT_STATE_FILE.into(),
            poll_interval: DEFAULT_POLL_INTERVAL.as_secs(),
            max_attempts: None,
            record_ttl: DEFAULT_RECORD_TTL,
            record_note: DEFAULT_RECORD_NOTE.into(),
        }
    }
}

impl Settings {
    /// Load settings from the default sources.
    pub fn load() -> Result<Self> {
        let config_file = std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from);
        Self::from_figment(Self::figment(config_file.as_deref()))
    }

    pub fn figment(config_file: Option<&Path>) -> Figment {
        let config_file = config_file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        if config_file.exists() {
            info!("loading config file: {}", config_file.display());
        }
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&VERBATIM_ENV_KEYS));
        for key in VERBATIM_ENV_KEYS {
            let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
            if let Ok(value) = std::env::var(var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }
        figment
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|err| Error::Config(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(Error::Config("R01_ACCESS_TOKEN is not set".into()));
        }
        if self.api_url.trim().is_empty() {
            return Err(Error::Config("api_url is empty".into()));
        }
        if self.poll_interval == 0 {
            return Err(Error::Config("poll_interval must be positive".into()));
        }
        if self.max_attempts == Some(0) {
            return Err(Error::Config("max_attempts must be positive".into()));
        }
        Ok(())
    }

    pub fn hook_config(&self) -> HookConfig {
        HookConfig::builder()
            .api_url(self.api_url.clone())
            .api_token(self.access_token.clone())
            .state_file(self.state_file.clone())
            .poll_interval(Duration::from_secs(self.poll_interval))
            .maybe_max_attempts(self.max_attempts)
            .record_ttl(self.record_ttl)
            .record_note(self.record_note.clone())
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Auth,
    Cleanup,
}

impl Mode {
    /// Exactly one of the two flags must be set.
    pub fn from_flags(auth: bool, cleanup: bool) -> Result<Self> {
        match (auth, cleanup) {
            (true, false) => Ok(Mode::Auth),
            (false, true) => Ok(Mode::Cleanup),
            (false, false) => Err(Error::Config("pass --auth or --cleanup".into())),
            (true, true) => Err(Error::Config(
                "--auth and --cleanup are mutually exclusive".into(),
            )),
        }
    }
}

/// What certbot asked the hook to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Auth { domain: String, validation: String },
    Cleanup { domain: String },
}

impl Invocation {
    pub fn from_env(mode: Mode) -> Result<Self> {
        Self::from_lookup(mode, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(mode: Mode, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is not set")))
        };
        let domain = required(DOMAIN_ENV)?;
        Ok(match mode {
            Mode::Auth => Invocation::Auth {
                domain,
                validation: required(VALIDATION_ENV)?,
            },
            Mode::Cleanup => Invocation::Cleanup { domain },
        })
    }

    pub fn domain(&self) -> &str {
        match self {
            Invocation::Auth { domain, .. } | Invocation::Cleanup { domain } => domain,
        }
    }
}
