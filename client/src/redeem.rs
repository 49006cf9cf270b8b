// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! Spending a token: the request binding MAC and its verifier-side check.

use base64ct::{Base64UrlUnpadded, Encoding};
use p256::NonZeroScalar;
use privpass_common::api::RedemptionMsg;
use privpass_crypto::voprf::core::decode_nonzero_scalar;
use privpass_crypto::{
    compute_binding_mac, derive_redemption_key, verify_binding_mac, HashToCurve, Sswu,
    BINDING_MAC_LEN,
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::token::{Token, TokenSeed};

/// Bytes a redemption is bound to. Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingContext(Vec<u8>);

impl BindingContext {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        BindingContext(bytes.into())
    }

    /// `len(host) ‖ host ‖ len(path) ‖ path` with u32 big-endian lengths, so
    /// that no two (host, path) pairs share an encoding.
    pub fn from_request(host: &str, path: &str) -> Self {
        let mut out = Vec::with_capacity(8 + host.len() + path.len());
        for field in [host, path] {
            out.extend_from_slice(&(field.len() as u32).to_be_bytes());
            out.extend_from_slice(field.as_bytes());
        }
        BindingContext(out)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// What the verifier receives: the seed in the clear and the binding MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub seed: TokenSeed,
    pub mac: [u8; BINDING_MAC_LEN],
}

impl Redemption {
    pub fn to_message(&self) -> RedemptionMsg {
        RedemptionMsg {
            data: Base64UrlUnpadded::encode_string(self.seed.as_bytes()),
            mac: Base64UrlUnpadded::encode_string(&self.mac),
        }
    }

    pub fn from_message(msg: &RedemptionMsg) -> Result<Self> {
        let seed = Base64UrlUnpadded::decode_vec(&msg.data)?;
        if seed.is_empty() {
            return Err(Error::Decode("empty token seed".into()));
        }
        let mac: [u8; BINDING_MAC_LEN] = Base64UrlUnpadded::decode_vec(&msg.mac)?
            .try_into()
            .map_err(|_| Error::Decode("binding MAC must be 32 bytes".into()))?;
        Ok(Redemption {
            seed: TokenSeed::new(seed),
            mac,
        })
    }
}

/// Builds redemptions. Holds no state; the store decides which token is
/// spent and removes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedemptionBuilder;

impl RedemptionBuilder {
    pub fn new() -> Self {
        RedemptionBuilder
    }

    /// The blind never leaves this function.
    pub fn redeem(&self, token: &Token, binding: &BindingContext) -> Redemption {
        let key = derive_redemption_key(token.seed.as_bytes(), &token.point);
        let mac = compute_binding_mac(&key, binding.as_bytes());
        Redemption {
            seed: token.seed.clone(),
            mac,
        }
    }
}

/// Verifier holding the issuer secret. Double-spend tracking is the
/// caller's job.
pub struct RedemptionVerifier<H = Sswu> {
    k: NonZeroScalar,
    h2c: H,
}

impl RedemptionVerifier<Sswu> {
    pub fn from_secret_key(sk_bytes: &[u8], ctx: &[u8]) -> Result<Self> {
        Self::with_mapper(sk_bytes, Sswu::new(ctx))
    }
}

impl<H: HashToCurve> RedemptionVerifier<H> {
    pub fn with_mapper(sk_bytes: &[u8], h2c: H) -> Result<Self> {
        let k = decode_nonzero_scalar(sk_bytes)?;
        Ok(Self { k, h2c })
    }

    pub fn verify(&self, redemption: &Redemption, binding: &BindingContext) -> Result<()> {
        let p = self
            .h2c
            .hash_to_curve(redemption.seed.as_bytes())
            .ok_or(Error::PointGeneration)?;
        let n = p * *self.k;
        let key = derive_redemption_key(redemption.seed.as_bytes(), &n);
        if !verify_binding_mac(&key, binding.as_bytes(), &redemption.mac) {
            debug!("redemption MAC mismatch");
            return Err(Error::InvalidRedemption);
        }
        Ok(())
    }
}
