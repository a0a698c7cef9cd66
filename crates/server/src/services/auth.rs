use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::BasicCredentials;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No credentials provided")]
    Missing,
    #[error("Malformed Authorization header")]
    MalformedHeader,
    #[error("Invalid API key")]
    InvalidToken,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Basic authentication is not enabled")]
    BasicDisabled,
}

/// Credentials presented by a client.
///
/// Never log the contents, only [`Credentials::kind`].
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
}

impl Credentials {
    /// Extract credentials from request headers and the raw query string.
    ///
    /// Precedence: bearer header, `apikey` query parameter, basic header,
    /// then `username`/`password` query parameters. The first one present
    /// is the only one checked.
    pub fn from_parts(headers: &HeaderMap, query: Option<&str>) -> Result<Option<Self>, AuthError> {
        let authorization = match headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| AuthError::MalformedHeader)?),
            None => None,
        };
        let (scheme, payload) = authorization
            .and_then(|value| value.trim().split_once(' '))
            .map(|(scheme, payload)| (scheme.to_ascii_lowercase(), payload.trim()))
            .unzip();

        if scheme.as_deref() == Some("bearer") {
            return Ok(payload.map(|token| Self::Token(token.to_string())));
        }

        let params = QueryParams::parse(query);
        if let Some(token) = params.apikey {
            return Ok(Some(Self::Token(token)));
        }

        if scheme.as_deref() == Some("basic") {
            return decode_basic(payload.unwrap_or_default()).map(Some);
        }

        match (params.username, params.password) {
            (Some(username), Some(password)) => Ok(Some(Self::Basic { username, password })),
            _ => Ok(None),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::Basic { .. } => "basic",
        }
    }
}

#[derive(Default)]
struct QueryParams {
    apikey: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl QueryParams {
    fn parse(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "apikey" => &mut params.apikey,
                "username" => &mut params.username,
                "password" => &mut params.password,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

fn decode_basic(payload: &str) -> Result<Credentials, AuthError> {
    let decoded = STANDARD
        .decode(payload)
        .map_err(|_| AuthError::MalformedHeader)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedHeader)?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::MalformedHeader)?;

    Ok(Credentials::Basic {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Compare a presented secret against the configured one.
///
/// Lengths are compared first and a mismatch returns early, so the length
/// of the configured secret is observable through timing. Equal-length
/// inputs are compared in constant time.
pub fn secure_compare(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented.ct_eq(expected).into()
}

/// Decides whether a request may use the proxy
pub struct AccessGate {
    api_key: String,
    basic: Option<BasicCredentials>,
}

impl AccessGate {
    pub fn new(api_key: impl Into<String>, basic: Option<BasicCredentials>) -> Self {
        Self {
            api_key: api_key.into(),
            basic,
        }
    }

    /// Token embedded in rewritten links
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn verify(&self, credentials: &Credentials) -> Result<(), AuthError> {
        match credentials {
            Credentials::Token(token) => {
                if secure_compare(token.as_bytes(), self.api_key.as_bytes()) {
                    Ok(())
                } else {
                    Err(AuthError::InvalidToken)
                }
            }
            Credentials::Basic { username, password } => {
                let expected = self.basic.as_ref().ok_or(AuthError::BasicDisabled)?;
                // Both halves are always compared
                let user_ok = secure_compare(username.as_bytes(), expected.username.as_bytes());
                let pass_ok = secure_compare(password.as_bytes(), expected.password.as_bytes());
                if user_ok & pass_ok {
                    Ok(())
                } else {
                    Err(AuthError::InvalidCredentials)
                }
            }
        }
    }
}
