// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use privpass_common::api::{IssueBatchReq, IssueBatchResp};
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::debug;

/// Opaque request/response channel to the issuer.
#[async_trait]
pub trait IssuerTransport: Send + Sync {
    async fn issue(&self, req: &IssueBatchReq) -> Result<IssueBatchResp>;
}

/// JSON over HTTP(S).
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: HttpClient,
    issuer_url: String,
}

impl HttpTransport {
    pub fn new(issuer_url: &str, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            issuer_url: issuer_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    /// SEC1 public key advertised at `/.well-known/issuer`.
    pub async fn fetch_issuer_key(&self) -> Result<Vec<u8>> {
        let url = format!("{}/.well-known/issuer", self.issuer_url);
        let wk: serde_json::Value = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()?
            .json()
            .await
            .context("decode issuer metadata")?;

        let pubkey_b64 = wk["voprf"]["pubkey"]
            .as_str()
            .ok_or_else(|| anyhow!("missing pubkey"))?;
        Base64UrlUnpadded::decode_vec(pubkey_b64).map_err(|e| anyhow!("issuer pubkey: {}", e))
    }
}

#[async_trait]
impl IssuerTransport for HttpTransport {
    async fn issue(&self, req: &IssueBatchReq) -> Result<IssueBatchResp> {
        let url = format!("{}/v1/tokens/issue", self.issuer_url);
        debug!(url = %url, elements = req.blinded_elements.len(), "sending issuance request");
        let resp: IssueBatchResp = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?
            .error_for_status()?
            .json()
            .await
            .context("decode issuance response")?;
        Ok(resp)
    }
}
