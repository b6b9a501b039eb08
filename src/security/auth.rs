//! Access guard: optional HTTP Basic authentication.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::config::AuthConfig;
use crate::relay::RelayError;

/// Checks inbound requests against the configured credentials.
///
/// With no credentials configured every request passes.
#[derive(Debug, Clone, Default)]
pub struct AccessGuard {
    credentials: Option<(String, String)>,
}

impl AccessGuard {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            credentials: config
                .credentials()
                .map(|(login, password)| (login.to_string(), password.to_string())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<(), RelayError> {
        let Some((login, password)) = &self.credentials else {
            return Ok(());
        };

        match parse_basic(headers) {
            Some((name, pass)) if name == *login && pass == *password => Ok(()),
            _ => Err(RelayError::AuthRejected),
        }
    }
}

/// Decode `Authorization: Basic <base64(name:pass)>`.
fn parse_basic(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (name, pass) = decoded.split_once(':')?;
    Some((name.to_string(), pass.to_string()))
}
