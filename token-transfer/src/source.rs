//! Where signed attestations come from.

use std::{fmt, time::Duration};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use log::{debug, warn};
use portal_supported_chains::Chain;
use portal_vaas::Address;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Identifies the message a transfer emitted: guardians sign one VAA per emitter and sequence.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttestationHandle {
    pub chain: Chain,
    pub emitter: Address,
    pub sequence: u64,
}

impl fmt::Display for AttestationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            u16::from(self.chain),
            self.emitter,
            self.sequence
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatus {
    /// Not signed yet, or not visible to this source yet.
    Pending,
    /// The serialized VAA.
    Signed(Vec<u8>),
    /// The source will never produce this attestation.
    Rejected(String),
}

#[async_trait]
pub trait AttestationSource: Send + Sync {
    /// A single lookup. Errors are transport failures and may be retried.
    async fn fetch(&self, handle: &AttestationHandle) -> anyhow::Result<AttestationStatus>;
}

#[derive(Deserialize)]
struct SignedVaaResponse {
    #[serde(rename = "vaaBytes")]
    vaa_bytes: String,
}

/// Guardian public RPC endpoints, asked in order.
pub struct GuardianRpcSource {
    client: reqwest::Client,
    hosts: Vec<String>,
}

impl GuardianRpcSource {
    pub fn new(hosts: Vec<String>) -> anyhow::Result<Self> {
        if hosts.is_empty() {
            return Err(anyhow!("at least one guardian RPC host is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(GuardianRpcSource { client, hosts })
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    fn url(host: &str, handle: &AttestationHandle) -> String {
        format!(
            "{}/v1/signed_vaa/{}/{}/{}",
            host.trim_end_matches('/'),
            u16::from(handle.chain),
            handle.emitter,
            handle.sequence
        )
    }

    async fn fetch_from(
        &self,
        host: &str,
        handle: &AttestationHandle,
    ) -> anyhow::Result<AttestationStatus> {
        let url = Self::url(host, handle);
        debug!("fetching {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(AttestationStatus::Pending),
            StatusCode::BAD_REQUEST => {
                let reason = response.text().await.unwrap_or_default();
                Ok(AttestationStatus::Rejected(reason))
            }
            s if s.is_success() => {
                let body: SignedVaaResponse = response
                    .json()
                    .await
                    .with_context(|| format!("invalid response from {url}"))?;
                let vaa = base64::decode(body.vaa_bytes)
                    .with_context(|| format!("invalid vaaBytes from {url}"))?;
                Ok(AttestationStatus::Signed(vaa))
            }
            s => Err(anyhow!("{url} answered {s}")),
        }
    }
}

#[async_trait]
impl AttestationSource for GuardianRpcSource {
    async fn fetch(&self, handle: &AttestationHandle) -> anyhow::Result<AttestationStatus> {
        let mut pending = false;
        let mut last_err = None;

        for host in &self.hosts {
            match self.fetch_from(host, handle).await {
                Ok(AttestationStatus::Pending) => pending = true,
                Ok(status) => return Ok(status),
                Err(e) => {
                    warn!("guardian RPC {host}: {e:#}");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if !pending => Err(e),
            _ => Ok(AttestationStatus::Pending),
        }
    }
}
