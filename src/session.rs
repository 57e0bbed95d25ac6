// Copyright 2026 rancher-gitlab-deploy contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Session structure definition.
//!
//! The Session object serves as a wrapper around an HTTP(s) client, handling
//! authentication and building URLs for both API versions Rancher exposes.

use std::env;
use std::fmt;

use log::{debug, trace};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use crate::{Error, ErrorKind, Result};

/// Maximum number of items requested from list endpoints.
pub const LIST_LIMIT: &str = "1000";

/// Version of the Rancher API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    /// `/v1`, used for most of the calls.
    V1,
    /// `/v2-beta`, used for secrets and service creation.
    V2Beta,
}

impl ApiVersion {
    fn prefix(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2Beta => "v2-beta",
        }
    }
}

/// Connection details of a Rancher server.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Rancher URL, e.g. `http://rancher:8080`.
    pub url: String,
    /// Environment or account API access key.
    pub access_key: String,
    /// Secret for the access key.
    pub secret_key: String,
    /// Whether to verify TLS certificates.
    pub ssl_verify: bool,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("ssl_verify", &self.ssl_verify)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a configuration with certificate verification enabled.
    pub fn new<U, K, S>(url: U, access_key: K, secret_key: S) -> ConnectionConfig
    where
        U: Into<String>,
        K: Into<String>,
        S: Into<String>,
    {
        ConnectionConfig {
            url: url.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            ssl_verify: true,
        }
    }

    /// Create a configuration from `RANCHER_URL`, `RANCHER_ACCESS_KEY` and
    /// `RANCHER_SECRET_KEY`.
    pub fn from_env() -> Result<ConnectionConfig> {
        Ok(ConnectionConfig::new(
            require_env("RANCHER_URL")?,
            require_env("RANCHER_ACCESS_KEY")?,
            require_env("RANCHER_SECRET_KEY")?,
        ))
    }

    /// Disable or enable certificate verification.
    #[inline]
    pub fn with_ssl_verify(mut self, ssl_verify: bool) -> ConnectionConfig {
        self.ssl_verify = ssl_verify;
        self
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("Environment variable {} is not set", name),
        )
    })
}

/// An authenticated Rancher API session.
#[derive(Clone)]
pub struct Session {
    client: Client,
    root: Url,
    access_key: String,
    secret_key: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Session")
            .field("root", &self.root.as_str())
            .field("access_key", &self.access_key)
            .finish()
    }
}

impl Session {
    /// Create a new session.
    pub fn new(config: &ConnectionConfig) -> Result<Session> {
        if !config.url.contains("://") {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "The Rancher URL doesn't look right",
            ));
        }

        let mut root = Url::parse(&config.url).map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("The Rancher URL doesn't look right: {}", e),
            )
        })?;
        if root.cannot_be_a_base() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "The Rancher URL doesn't look right",
            ));
        }
        // Normalize to exactly one trailing slash so that joins append.
        let path = format!("{}/", root.path().trim_end_matches('/'));
        root.set_path(&path);

        let client = Client::builder()
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()
            .map_err(|e| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("Cannot build an HTTP client: {}", e),
                )
            })?;

        debug!("Created a session for Rancher at {}", root);
        Ok(Session {
            client,
            root,
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    /// Host (and port) of the Rancher server, for messages.
    pub fn host(&self) -> String {
        match (self.root.host_str(), self.root.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => self.root.to_string(),
        }
    }

    /// Build a URL for the given API version and path segments.
    pub fn url<I>(&self, version: ApiVersion, path: I) -> Result<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.root.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                Error::new(ErrorKind::InvalidInput, "The Rancher URL cannot be a base")
            })?;
            segments.pop_if_empty().push(version.prefix());
            for item in path {
                segments.push(item.as_ref());
            }
        }
        Ok(url)
    }

    /// Start an authenticated request.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        trace!("{} {}", method, url);
        self.client
            .request(method, url)
            .basic_auth(&self.access_key, Some(&self.secret_key))
    }

    /// Issue a GET request and parse the JSON response.
    pub async fn fetch<T: DeserializeOwned>(&self, url: Url, query: &[(&str, &str)]) -> Result<T> {
        let resp = self.request(Method::GET, url).query(query).send().await?;
        let resp = check(resp).await?;
        Ok(resp.json().await?)
    }
}

/// Check the response and convert errors into our Error.
pub async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let url = resp.url().clone();
    let body = resp.text().await.unwrap_or_default();
    debug!("Request to {} failed with {}: {}", url, status, body);
    let message = if body.is_empty() {
        format!("HTTP {} from {}", status, url)
    } else {
        format!("HTTP {} from {}: {}", status, url, body)
    };
    Err(Error::from_status(status, message))
}
