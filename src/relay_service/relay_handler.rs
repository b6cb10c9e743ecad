use crate::relay_service::bounded_body::BoundedBody;
use crate::relay_service::liveness::CallerLiveness;
use crate::relay_service::relay_error::RelayError;
use crate::relay_service::target::TargetDescriptor;
use crate::relay_service::RelayContext;
use actix_web::http::header::{self, HeaderValue};
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, error, info};
use reqwest::Response;

/// Relays a single `GET /fetch?route=<url>` through the upstream proxy.
///
/// While the upstream has not answered, a caller closing its connection
/// cancels the outbound request.
pub async fn fetch(req: HttpRequest, ctx: web::Data<RelayContext>) -> Result<HttpResponse, RelayError> {
  match relay(&req, &ctx).await {
    Ok(response) => Ok(response),
    Err(err) => {
      if err.is_client_error() {
        debug!("Rejected fetch: {}", err);
      } else {
        error!("Fetch failed: {}", err);
      }
      Err(err)
    }
  }
}

async fn relay(req: &HttpRequest, ctx: &RelayContext) -> Result<HttpResponse, RelayError> {
  let TargetDescriptor { url, credentials } = TargetDescriptor::from_query(req.query_string())?;

  let mut builder = ctx.client.get(url.clone());
  if let Some(credentials) = credentials {
    builder = builder.basic_auth(credentials.username, Some(credentials.password));
  }

  let outbound = builder.build().map_err(|err| {
    error!("Unable to build request for {}: {}", url, err);
    RelayError::RequestBuildFailure
  })?;

  let dispatch = ctx.client.execute(outbound);
  let upstream = match req.conn_data::<CallerLiveness>() {
    Some(liveness) => tokio::select! {
      result = dispatch => result,
      _ = liveness.closed() => {
        debug!("Caller left, cancelling fetch of {}", url);
        return Err(RelayError::Cancelled);
      }
    },
    None => dispatch.await,
  }
  .map_err(|err| RelayError::upstream(&err))?;

  info!("Relaying {} from {}", upstream.status(), url);

  Ok(relay_response(upstream, ctx.body_limit))
}

fn relay_response(upstream: Response, body_limit: u64) -> HttpResponse {
  let mut builder = HttpResponse::build(upstream.status());

  for (name, value) in upstream.headers() {
    // framing of the relayed body belongs to this server's connection
    if *name == header::TRANSFER_ENCODING || *name == header::CONNECTION {
      continue;
    }

    if *name == header::CONTENT_LENGTH {
      builder.append_header((name.clone(), clamp_content_length(value, body_limit)));
    } else {
      builder.append_header((name.clone(), value.clone()));
    }
  }

  let body = BoundedBody::new(Box::pin(upstream.bytes_stream()), body_limit);
  let mut response = builder.streaming(body);
  response.head_mut().set_camel_case_headers(true);
  response
}

#[inline]
fn clamp_content_length(value: &HeaderValue, body_limit: u64) -> HeaderValue {
  match value.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) {
    Some(length) if length > body_limit => HeaderValue::from(body_limit),
    _ => value.clone(),
  }
}
