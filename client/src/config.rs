// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

use anyhow::{anyhow, Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::exchange::{BatchPolicy, BlindSignatureExchange, ExchangePolicy};
use crate::token::ConfigId;

pub const DEFAULT_ISSUER_URL: &str = "http://127.0.0.1:8081";
pub const DEFAULT_STORAGE_PATH: &str = "privpass-tokens.json";
pub const DEFAULT_TOKENS_PER_REQUEST: usize = 30;
pub const MAX_TOKENS_PER_REQUEST: usize = 100;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub issuer_url: String,
    pub config_id: ConfigId,
    /// SEC1 issuer public key, if one is published for this configuration.
    pub issuer_pubkey: Option<Vec<u8>>,
    pub storage_path: PathBuf,
    pub tokens_per_request: usize,
    pub policy: ExchangePolicy,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            issuer_url: DEFAULT_ISSUER_URL.to_string(),
            config_id: ConfigId(1),
            issuer_pubkey: None,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            tokens_per_request: DEFAULT_TOKENS_PER_REQUEST,
            policy: ExchangePolicy::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let issuer_url = env::var("PRIVPASS_ISSUER_URL").unwrap_or(defaults.issuer_url);
        let config_id = ConfigId(env_u32("PRIVPASS_CONFIG_ID", defaults.config_id.0));

        let issuer_pubkey = match env::var("PRIVPASS_ISSUER_PUBKEY") {
            Ok(b64) if !b64.trim().is_empty() => Some(
                Base64UrlUnpadded::decode_vec(b64.trim())
                    .map_err(|e| anyhow!("{}", e))
                    .context("PRIVPASS_ISSUER_PUBKEY must be base64url SEC1")?,
            ),
            _ => None,
        };

        let storage_path = env::var("PRIVPASS_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_path);

        let tokens_per_request = clamp_batch(
            env_u32("PRIVPASS_TOKENS_PER_REQUEST", DEFAULT_TOKENS_PER_REQUEST as u32) as usize,
        );

        let batch = match env::var("PRIVPASS_BATCH_POLICY") {
            Ok(s) => s
                .parse::<BatchPolicy>()
                .map_err(|e| anyhow!(e))
                .context("PRIVPASS_BATCH_POLICY")?,
            Err(_) => BatchPolicy::default(),
        };
        let policy = ExchangePolicy {
            require_proof: env_bool("PRIVPASS_REQUIRE_PROOF"),
            batch,
        };

        let request_timeout =
            Duration::from_secs(env_u32("PRIVPASS_REQUEST_TIMEOUT_SECS", 10) as u64);

        Ok(Self {
            issuer_url,
            config_id,
            issuer_pubkey,
            storage_path,
            tokens_per_request,
            policy,
            request_timeout,
        })
    }

    /// Exchange for this configuration, keyed when a public key is set.
    pub fn exchange(&self) -> crate::Result<BlindSignatureExchange> {
        let exchange = BlindSignatureExchange::new(self.policy);
        match &self.issuer_pubkey {
            Some(sec1) => exchange.with_issuer_key_sec1(sec1),
            None => Ok(exchange),
        }
    }
}

/// Batch sizes are kept within what an issuer will sign in one request.
pub fn clamp_batch(n: usize) -> usize {
    n.clamp(1, MAX_TOKENS_PER_REQUEST)
}

fn env_bool(key: &str) -> bool {
    env::var(key).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}
