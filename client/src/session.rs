// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! Owns everything an embedding application needs for one client session.

use anyhow::Context;
use privpass_crypto::{HashToCurve, Sswu};
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::exchange::BlindSignatureExchange;
use crate::factory::TokenFactory;
use crate::redeem::{BindingContext, Redemption, RedemptionBuilder};
use crate::storage::{FileStorage, KeyValueStorage};
use crate::store::TokenStore;
use crate::token::ConfigId;
use crate::transport::IssuerTransport;

pub struct Session<H = Sswu> {
    store: TokenStore,
    factory: TokenFactory<H>,
    default_exchange: BlindSignatureExchange,
    exchanges: HashMap<ConfigId, BlindSignatureExchange>,
    builder: RedemptionBuilder,
}

impl Session<Sswu> {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_factory(storage, TokenFactory::default())
    }

    /// File-backed session for the configuration in `cfg`.
    pub fn from_config(cfg: &ClientConfig) -> anyhow::Result<Self> {
        let storage = FileStorage::open(&cfg.storage_path).context("open token storage")?;
        let exchange = cfg.exchange().context("issuer public key")?;
        Ok(Self::new(Arc::new(storage)).with_exchange(cfg.config_id, exchange))
    }
}

impl<H: HashToCurve> Session<H> {
    pub fn with_factory(storage: Arc<dyn KeyValueStorage>, factory: TokenFactory<H>) -> Self {
        Self {
            store: TokenStore::new(storage),
            factory,
            default_exchange: BlindSignatureExchange::default(),
            exchanges: HashMap::new(),
            builder: RedemptionBuilder::new(),
        }
    }

    /// Exchange used for `config`, replacing any earlier one.
    pub fn with_exchange(mut self, config: ConfigId, exchange: BlindSignatureExchange) -> Self {
        self.exchanges.insert(config, exchange);
        self
    }

    /// Exchange used for configurations without their own.
    pub fn with_default_exchange(mut self, exchange: BlindSignatureExchange) -> Self {
        self.default_exchange = exchange;
        self
    }

    pub fn exchange(&self, config: ConfigId) -> &BlindSignatureExchange {
        self.exchanges.get(&config).unwrap_or(&self.default_exchange)
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn count(&self, config: ConfigId) -> Result<usize> {
        self.store.count(config)
    }

    /// Requests up to `n` tokens and stores whatever the issuer response
    /// yields. Returns how many were stored.
    pub async fn issue<T>(&self, config: ConfigId, n: usize, transport: &T) -> Result<usize>
    where
        T: IssuerTransport + ?Sized,
    {
        let tokens = self.factory.generate(n, &mut OsRng);
        if tokens.is_empty() {
            warn!(config = %config, requested = n, "no blind tokens generated, skipping issuance");
            return Ok(0);
        }

        let exchange = self.exchange(config);
        let req = exchange.build_issuance_request(config, &tokens);
        debug!(config = %config, batch = tokens.len(), "requesting tokens");

        let resp = transport.issue(&req).await.map_err(Error::Transport)?;

        let finished = exchange.finalize(config, tokens, &resp)?;
        if finished.is_empty() {
            return Ok(0);
        }
        self.store.save(config, &finished)?;
        Ok(finished.len())
    }

    /// As [`Session::issue`], abandoned when `cancel` completes first. An
    /// abandoned request stores nothing.
    pub async fn issue_until<T, C>(
        &self,
        config: ConfigId,
        n: usize,
        transport: &T,
        cancel: C,
    ) -> Result<usize>
    where
        T: IssuerTransport + ?Sized,
        C: Future<Output = ()>,
    {
        tokio::select! {
            res = self.issue(config, n, transport) => res,
            _ = cancel => {
                info!(config = %config, "issuance cancelled");
                Err(Error::Cancelled)
            }
        }
    }

    /// Spends the next stored token for `config`.
    pub fn redeem(&self, config: ConfigId, binding: &BindingContext) -> Result<Redemption> {
        self.store.redeem_next(config, &self.builder, binding)
    }
}
