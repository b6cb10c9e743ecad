use crate::relay_service::relay_error::RelayError;
use percent_encoding::{percent_decode_str, percent_encode_byte};
use std::borrow::Cow;
use url::{form_urlencoded, Url};

pub const ROUTE_PARAM: &str = "route";

/// Basic credentials carried in a route's user-info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

/// A validated fetch target. `url` never carries user-info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
  pub url: Url,
  pub credentials: Option<Credentials>,
}

impl TargetDescriptor {
  /// Runs the whole validation pipeline over a raw inbound query string.
  pub fn from_query(query_string: &str) -> Result<TargetDescriptor, RelayError> {
    let route = route_param(query_string)?;
    let decoded = unescape_route(&route)?;
    TargetDescriptor::parse(&decoded)
  }

  pub fn parse(target: &str) -> Result<TargetDescriptor, RelayError> {
    if !has_authority(target) {
      return Err(RelayError::InvalidTarget);
    }

    let mut url = Url::parse(target).map_err(|_| RelayError::InvalidTarget)?;

    if url.host_str().map_or(true, str::is_empty) {
      return Err(RelayError::InvalidTarget);
    }

    if url.scheme() != "http" && url.scheme() != "https" {
      return Err(RelayError::UnsupportedScheme);
    }

    let username = decode_user_info(url.username())?.into_owned();
    let password = decode_user_info(url.password().unwrap_or_default())?.into_owned();

    url.set_username("").map_err(|_| RelayError::RequestBuildFailure)?;
    url.set_password(None).map_err(|_| RelayError::RequestBuildFailure)?;

    // An empty username means no credentials, whatever the password segment holds.
    let credentials = (!username.is_empty()).then(|| Credentials { username, password });

    Ok(TargetDescriptor { url, credentials })
  }
}

/// First `route` value of the query string. An empty value counts as missing.
pub fn route_param(query_string: &str) -> Result<Cow<'_, str>, RelayError> {
  form_urlencoded::parse(query_string.as_bytes())
    .find(|(key, _)| key == ROUTE_PARAM)
    .map(|(_, value)| value)
    .filter(|value| !value.is_empty())
    .ok_or(RelayError::MissingParameter)
}

/// Strict query-component decoding: `+` is a space and every `%` must
/// introduce two hex digits.
///
/// Decoded bytes that are not UTF-8 are escaped again, so a target such as
/// `?q=caf%E9` still reaches the upstream as sent.
pub fn unescape_route(value: &str) -> Result<String, RelayError> {
  if !has_valid_escapes(value) {
    return Err(RelayError::InvalidEncoding);
  }

  let spaced = value.replace('+', " ");
  let decoded: Cow<'_, [u8]> = percent_decode_str(&spaced).into();
  Ok(escape_invalid_utf8(&decoded))
}

fn has_valid_escapes(value: &str) -> bool {
  let bytes = value.as_bytes();
  bytes
    .iter()
    .enumerate()
    .filter(|(_, byte)| **byte == b'%')
    .all(|(i, _)| {
      matches!(bytes.get(i + 1..i + 3), Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit())
    })
}

fn escape_invalid_utf8(mut bytes: &[u8]) -> String {
  let mut text = String::with_capacity(bytes.len());

  loop {
    match std::str::from_utf8(bytes) {
      Ok(valid) => {
        text.push_str(valid);
        return text;
      }
      Err(err) => {
        let (valid, rest) = bytes.split_at(err.valid_up_to());
        text.push_str(std::str::from_utf8(valid).unwrap_or_default());

        let invalid = err.error_len().unwrap_or(rest.len());
        for byte in &rest[..invalid] {
          text.push_str(percent_encode_byte(*byte));
        }
        bytes = &rest[invalid..];
      }
    }
  }
}

/// `scheme://` with a well-formed scheme. The WHATWG parser would otherwise
/// invent a host for inputs like `http:example.com`.
fn has_authority(target: &str) -> bool {
  match target.split_once(':') {
    Some((scheme, rest)) => {
      scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && rest.starts_with("//")
    }
    None => false,
  }
}

#[inline]
fn decode_user_info(value: &str) -> Result<Cow<'_, str>, RelayError> {
  percent_decode_str(value)
    .decode_utf8()
    .map_err(|_| RelayError::InvalidTarget)
}
