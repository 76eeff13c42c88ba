use anyhow::{Context, Result};
use reqwest::blocking::Client;

use super::{RemoteApi, RemoteLookup};

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "git-revision";

/// Verification API reached over HTTP(S).
///
/// Any 2xx answer means the resource exists. 5xx answers and transport
/// errors mean the API is unavailable; every other status is a definitive
/// "does not exist".
pub struct HttpRemoteApi {
    client: Client,
    api_base: String,
}

impl HttpRemoteApi {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }

    /// Client that ignores proxy environment variables, for loopback tests.
    #[cfg(test)]
    fn direct(api_base: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .no_proxy()
            .build()
            .unwrap();
        Self {
            client,
            api_base: api_base.into(),
        }
    }

    fn url(&self, endpoint: &str, key: &str) -> String {
        format!(
            "{}/api/{}/{}/",
            self.api_base.trim_end_matches('/'),
            endpoint,
            key
        )
    }

    fn get(&self, url: &str) -> RemoteLookup<String> {
        tracing::debug!("GET {}", url);
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Request to {} failed: {}", url, e);
                return RemoteLookup::Unavailable;
            }
        };

        let status = response.status();
        if status.is_success() {
            match response.text() {
                Ok(body) => RemoteLookup::Exists(body),
                Err(e) => {
                    tracing::warn!("Failed to read response from {}: {}", url, e);
                    RemoteLookup::Unavailable
                }
            }
        } else if status.is_server_error() {
            tracing::warn!("{} answered {}", url, status);
            RemoteLookup::Unavailable
        } else {
            tracing::debug!("{} answered {}", url, status);
            RemoteLookup::Missing
        }
    }
}

impl RemoteApi for HttpRemoteApi {
    fn fetch_commit(&self, hash: &str) -> RemoteLookup<String> {
        self.get(&self.url("commit", hash))
    }

    fn branch_exists(&self, branch: &str) -> RemoteLookup<()> {
        match self.get(&self.url("tree", branch)) {
            RemoteLookup::Exists(_) => RemoteLookup::Exists(()),
            RemoteLookup::Missing => RemoteLookup::Missing,
            RemoteLookup::Unavailable => RemoteLookup::Unavailable,
        }
    }
}
