//! HTTP implementations of the backend user fetch and the transaction oracle.

use crate::auth::ExternalIdentity;
use crate::config::{BackendConfig, OracleConfig};
use crate::error::{Error, Result};
use crate::session::{BackendUserFetch, ProfileRecord};
use crate::verification::{TransactionOracle, TransactionStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Envelope the backend wraps profile responses in.
#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ProfileRecord>,
    #[serde(default)]
    error: Option<String>,
}

impl ProfileEnvelope {
    fn into_profile(self) -> Result<ProfileRecord> {
        match (self.success, self.data) {
            (true, Some(profile)) => Ok(profile),
            (true, None) => Err(Error::Backend("response carried no user".to_string())),
            (false, _) => Err(Error::Backend(
                self.error
                    .unwrap_or_else(|| "unsuccessful user data response".to_string()),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest<'a> {
    tx_hash: &'a str,
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Fetches the signed-in user's profile from the backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUserFetch {
    client: reqwest::Client,
    url: String,
    access_token: Option<String>,
}

impl HttpUserFetch {
    /// Create a fetcher for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: join_url(&config.base_url, &config.profile_path),
            access_token: config.access_token.clone(),
        })
    }

    /// Endpoint queried for profiles.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BackendUserFetch for HttpUserFetch {
    async fn fetch_profile(&self, identity: &ExternalIdentity) -> Result<ProfileRecord> {
        debug!("GET {} for {}", self.url, identity.id);

        let mut request = self
            .client
            .get(&self.url)
            .query(&[("userId", identity.id.as_str())]);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("profile request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(format!("profile request returned {status}")));
        }

        let envelope: ProfileEnvelope = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("malformed profile response: {e}")))?;
        envelope.into_profile()
    }
}

/// Asks the backend oracle whether a transaction finalized.
#[derive(Debug, Clone)]
pub struct HttpTransactionOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpTransactionOracle {
    /// Create an oracle client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &OracleConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: join_url(&config.base_url, &config.check_path),
        })
    }

    /// Endpoint queried for transaction status.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TransactionOracle for HttpTransactionOracle {
    async fn check(&self, tx_hash: &str) -> Result<TransactionStatus> {
        debug!("POST {} for {tx_hash}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&CheckRequest { tx_hash })
            .send()
            .await
            .map_err(|e| Error::Network(format!("oracle request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Oracle(format!("oracle returned {status}")));
        }

        response
            .json::<TransactionStatus>()
            .await
            .map_err(|e| Error::Oracle(format!("malformed oracle response: {e}")))
    }
}
