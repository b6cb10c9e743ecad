use crate::relay_config::RelayConfig;
use actix_web::web;
use reqwest::Client;

pub mod bounded_body;
pub mod liveness;
pub mod relay_error;
pub mod relay_handler;
pub mod target;

pub const FETCH_PATH: &str = "/fetch";

/// Shared, read-only state handed to every fetch.
#[derive(Clone)]
pub struct RelayContext {
  pub client: Client,
  pub body_limit: u64,
}

impl RelayContext {
  pub fn new(client: Client, config: &RelayConfig) -> Self {
    RelayContext {
      client,
      body_limit: config.body_limit,
    }
  }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
  cfg.route(FETCH_PATH, web::get().to(relay_handler::fetch));
}
