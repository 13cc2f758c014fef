//! Status endpoint addressing.
//!
//! An [`Endpoint`] is a fully built URL plus the basic-auth credentials used
//! against it. Both status services are addressed as
//! `{proto}://{host}:{port}/{path}` with the mitm receiver additionally
//! expecting a trailing slash.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Errors raised while building an endpoint
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Invalid endpoint URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Basic-auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self { user: user.into(), pass: pass.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("user", &self.user).field("pass", &"***").finish()
    }
}

/// A status page URL together with its credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    credentials: Credentials,
}

impl Endpoint {
    /// Build an endpoint from its parts.
    ///
    /// Leading and trailing slashes on `path` are ignored; `trailing_slash`
    /// decides whether the final URL ends in `/`.
    pub fn from_parts(
        proto: &str,
        host: &str,
        port: u16,
        path: &str,
        trailing_slash: bool,
        credentials: Credentials,
    ) -> Result<Self, EndpointError> {
        let path = path.trim_matches('/');
        let mut raw = format!("{proto}://{host}:{port}/{path}");
        if trailing_slash && !path.is_empty() {
            raw.push('/');
        }

        Self::parse(&raw, credentials)
    }

    /// Parse a complete URL
    pub fn parse(raw: &str, credentials: Credentials) -> Result<Self, EndpointError> {
        let url = Url::parse(raw)
            .map_err(|source| EndpointError::InvalidUrl { url: raw.to_string(), source })?;

        match url.scheme() {
            "http" | "https" => Ok(Self { url, credentials }),
            other => Err(EndpointError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
