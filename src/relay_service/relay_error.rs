use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Every way a fetch can fail before the upstream status line is relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
  MissingParameter,
  InvalidEncoding,
  InvalidTarget,
  UnsupportedScheme,
  RequestBuildFailure,
  UpstreamUnreachable(String),
  /// The caller left before the upstream answered.
  Cancelled,
}

impl RelayError {
  pub fn upstream(err: &reqwest::Error) -> Self {
    RelayError::UpstreamUnreachable(error_chain(err))
  }

  /// Caller mistakes, as opposed to gateway or upstream faults.
  pub fn is_client_error(&self) -> bool {
    self.status_code().is_client_error()
  }
}

fn error_chain(err: &dyn Error) -> String {
  let mut text = err.to_string();
  let mut source = err.source();

  while let Some(cause) = source {
    let cause_text = cause.to_string();
    // reqwest sometimes repeats its source in its own message
    if !text.ends_with(&cause_text) {
      text.push_str(": ");
      text.push_str(&cause_text);
    }
    source = cause.source();
  }

  text
}

impl Display for RelayError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      RelayError::MissingParameter => f.write_str("missing route query parameter"),
      RelayError::InvalidEncoding => f.write_str("invalid url encoding for route"),
      RelayError::InvalidTarget => f.write_str("route must be a valid absolute URL"),
      RelayError::UnsupportedScheme => f.write_str("unsupported scheme (only http/https allowed)"),
      RelayError::RequestBuildFailure => f.write_str("failed to build request"),
      RelayError::UpstreamUnreachable(detail) => write!(f, "upstream request failed: {}", detail),
      RelayError::Cancelled => f.write_str("client closed request"),
    }
  }
}

impl Error for RelayError {}

impl ResponseError for RelayError {
  fn status_code(&self) -> StatusCode {
    match self {
      RelayError::MissingParameter
      | RelayError::InvalidEncoding
      | RelayError::InvalidTarget
      | RelayError::UnsupportedScheme => StatusCode::BAD_REQUEST,
      RelayError::RequestBuildFailure => StatusCode::INTERNAL_SERVER_ERROR,
      RelayError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
      // nginx's "client closed request"
      RelayError::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
    }
  }

  fn error_response(&self) -> HttpResponse {
    HttpResponse::build(self.status_code())
      .insert_header((header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")))
      .insert_header((header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")))
      .body(format!("{}\n", self))
  }
}
