use crate::relay_config::RelayConfig;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Settings for the single outbound client every relayed request goes through.
pub struct ProxiedClientConfig {
  pub proxy_url: Url,
  pub timeout: Duration,
  pub redirect_limit: usize,
}

impl ProxiedClientConfig {
  pub fn to_client(self) -> Result<Client, reqwest::Error> {
    let ProxiedClientConfig {
      proxy_url,
      timeout,
      redirect_limit,
    } = self;

    // Credentials embedded in the proxy url are sent as Proxy-Authorization.
    let proxy = reqwest::Proxy::all(proxy_url)?;

    reqwest::ClientBuilder::new()
      .proxy(proxy)
      .timeout(timeout)
      .redirect(Policy::limited(redirect_limit))
      .build()
  }
}

impl From<&RelayConfig> for ProxiedClientConfig {
  fn from(config: &RelayConfig) -> Self {
    ProxiedClientConfig {
      proxy_url: config.proxy_url.clone(),
      timeout: config.timeout,
      redirect_limit: config.redirect_limit,
    }
  }
}
