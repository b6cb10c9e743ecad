mod http_client;
mod relay_config;
mod relay_service;
mod std_logger;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use http_client::ProxiedClientConfig;
use log::{error, info, LevelFilter};
use relay_config::{ConfigError, RelayConfig, RelayConfigFile, PROXY_URL_ENV};
use relay_service::RelayContext;
use std::fs::File;
use std::io::{Error, ErrorKind, Result};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(version, about = "Relays GET /fetch?route=<url> through a fixed upstream proxy")]
struct Config {
  /// Relay config file (JSON or YAML) holding `proxy_url`.
  #[arg(long = "config", env = "CONFIG_PATH", default_value = "config.json")]
  config_file: String,

  #[arg(long, env = "HTTP_BIND", default_value = "0.0.0.0")]
  bind: String,

  #[arg(long, env = "PORT", default_value_t = 8080)]
  port: u16,

  #[arg(long = "workers", env = "HTTP_WORKER_COUNT", default_value_t = 4)]
  worker_count: usize,

  #[arg(long, env = "LOG_LEVEL", default_value_t = LevelFilter::Info)]
  log_level: LevelFilter,
}

fn main() -> ExitCode {
  let config = Config::parse();

  if let Err(err) = std_logger::init(config.log_level) {
    eprintln!("Unable to install logger: {}", err);
    return ExitCode::FAILURE;
  }

  let relay_config = match load_relay_config(&config.config_file) {
    Ok(relay_config) => relay_config,
    Err(err) => {
      error!("Failed to load {}: {}", config.config_file, err);
      return ExitCode::FAILURE;
    }
  };

  match actix_web::rt::System::new().block_on(serve(config, relay_config)) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("Server exited: {}", err);
      ExitCode::FAILURE
    }
  }
}

fn load_relay_config(path: &str) -> std::result::Result<RelayConfig, ConfigError> {
  let env_proxy_url = std::env::var(PROXY_URL_ENV).ok().filter(|v| !v.trim().is_empty());

  let file = match File::open(path) {
    Ok(config_fd) => RelayConfigFile::load_from_file(&config_fd)?,
    // the environment alone is enough
    Err(err) if err.kind() == ErrorKind::NotFound && env_proxy_url.is_some() => RelayConfigFile::default(),
    Err(err) => return Err(err.into()),
  };

  RelayConfig::from_file(file.with_override(env_proxy_url))
}

async fn serve(config: Config, relay_config: RelayConfig) -> Result<()> {
  let client = ProxiedClientConfig::from(&relay_config)
    .to_client()
    .map_err(|err| Error::new(ErrorKind::Other, err))?;

  let context = web::Data::new(RelayContext::new(client, &relay_config));

  let proxy = &relay_config.proxy_url;
  info!(
    "Relaying through {} proxy at {}:{}",
    proxy.scheme(),
    proxy.host_str().unwrap_or_default(),
    proxy.port_or_known_default().unwrap_or_default()
  );
  info!("fetch relay listening on {}:{}", config.bind, config.port);

  HttpServer::new(move || App::new().app_data(context.clone()).configure(relay_service::configure))
    .on_connect(relay_service::liveness::watch_connection)
    .workers(config.worker_count)
    .bind((config.bind, config.port))?
    .run()
    .await
}
