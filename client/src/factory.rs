// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

use p256::NonZeroScalar;
use privpass_crypto::{HashToCurve, Sswu, SEED_LEN};
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::token::{BlindToken, TokenSeed};

/// Produces fresh blind tokens.
#[derive(Clone, Debug)]
pub struct TokenFactory<H = Sswu> {
    h2c: H,
}

impl TokenFactory<Sswu> {
    /// SSWU hash-to-curve under the given context string.
    pub fn new(ctx: &[u8]) -> Self {
        Self { h2c: Sswu::new(ctx) }
    }
}

impl Default for TokenFactory<Sswu> {
    fn default() -> Self {
        Self {
            h2c: Sswu::default(),
        }
    }
}

impl<H: HashToCurve> TokenFactory<H> {
    pub fn with_mapper(h2c: H) -> Self {
        Self { h2c }
    }

    pub fn mapper(&self) -> &H {
        &self.h2c
    }

    /// One seed, mapped and blinded.
    pub fn generate_one<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<BlindToken> {
        let mut bytes = vec![0u8; SEED_LEN];
        rng.fill_bytes(&mut bytes);
        let seed = TokenSeed::new(bytes);

        let p = self
            .h2c
            .hash_to_curve(seed.as_bytes())
            .ok_or(Error::PointGeneration)?;
        let blind = NonZeroScalar::random(rng);
        Ok(BlindToken {
            blinded: p * *blind,
            seed,
            blind,
        })
    }

    /// Up to `n` blind tokens. Seeds whose mapping misses are dropped, so the
    /// result may be shorter than `n`.
    pub fn generate<R: RngCore + CryptoRng>(&self, n: usize, rng: &mut R) -> Vec<BlindToken> {
        let mut tokens = Vec::with_capacity(n);
        for i in 0..n {
            match self.generate_one(rng) {
                Ok(t) => tokens.push(t),
                Err(e) => warn!(index = i, error = %e, "dropping token seed"),
            }
        }
        debug!(requested = n, generated = tokens.len(), "generated blind tokens");
        tokens
    }
}
