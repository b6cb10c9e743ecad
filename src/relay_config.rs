use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const PROXY_URL_ENV: &str = "RELAY_PROXY_URL";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);
pub const DEFAULT_BODY_LIMIT: u64 = 10 << 20;
pub const DEFAULT_REDIRECT_LIMIT: usize = 10;

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct RelayConfigFile {
  #[serde(default)]
  pub proxy_url: String,
}

/// Process-wide relay settings, fixed for the lifetime of the server.
#[derive(Debug, Clone)]
pub struct RelayConfig {
  pub proxy_url: Url,
  pub timeout: Duration,
  pub body_limit: u64,
  pub redirect_limit: usize,
}

#[derive(Debug)]
pub enum ConfigError {
  Io(std::io::Error),
  Parse(serde_yaml::Error),
  MissingProxyUrl,
  InvalidProxyUrl(url::ParseError),
}

impl RelayConfigFile {
  pub fn load_from_file(file: &File) -> Result<RelayConfigFile, ConfigError> {
    serde_yaml::from_reader(file).map_err(ConfigError::Parse)
  }

  /// Replaces the file value with `value` when it is set and non-empty.
  pub fn with_override(mut self, value: Option<String>) -> Self {
    if let Some(proxy_url) = value.filter(|v| !v.trim().is_empty()) {
      self.proxy_url = proxy_url;
    }
    self
  }
}

impl FromStr for RelayConfigFile {
  type Err = ConfigError;

  fn from_str(content: &str) -> Result<Self, Self::Err> {
    serde_yaml::from_str(content).map_err(ConfigError::Parse)
  }
}

impl RelayConfig {
  pub fn from_file(config: RelayConfigFile) -> Result<RelayConfig, ConfigError> {
    let raw = config.proxy_url.trim();
    if raw.is_empty() {
      return Err(ConfigError::MissingProxyUrl);
    }

    let proxy_url = Url::parse(raw).map_err(ConfigError::InvalidProxyUrl)?;

    Ok(RelayConfig {
      proxy_url,
      timeout: DEFAULT_TIMEOUT,
      body_limit: DEFAULT_BODY_LIMIT,
      redirect_limit: DEFAULT_REDIRECT_LIMIT,
    })
  }
}

impl Display for ConfigError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ConfigError::Io(err) => write!(f, "open config: {}", err),
      ConfigError::Parse(err) => write!(f, "decode config: {}", err),
      ConfigError::MissingProxyUrl => f.write_str("proxy_url is required in config"),
      ConfigError::InvalidProxyUrl(err) => write!(f, "invalid proxy url: {}", err),
    }
  }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
  fn from(err: std::io::Error) -> Self {
    ConfigError::Io(err)
  }
}
