// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! Cryptographic primitives for privpass
//!
//! This crate holds the client-side half of a VOPRF(P-256, SHA-256) token
//! scheme: the curve adapter in [`voprf::core`], single and batched DLEQ
//! proofs in [`voprf::dleq`], and the redemption key / request binding MAC
//! defined below.
//!
//! # Memory Zeroization Security
//!
//! - **Scalar values (blinding factors)**: `Scalar` and `NonZeroScalar` from
//!   RustCrypto's `elliptic-curve` crate implement `DefaultIsZeroes`, so
//!   blinds are wiped when the token holding them is dropped. This applies to
//!   in-flight blinds of an issuance request that was cancelled.
//! - **Redemption keys**: derived keys are returned as `Zeroizing<[u8; 32]>`
//!   and erased as soon as the MAC has been computed.
//!
//! ## Non-Secret Values (No Zeroization)
//!
//! - **Elliptic curve points** and issuer public keys.
//! - **Binding MACs**: they are sent to the verifier in the clear.

use hmac::{Hmac, Mac};
use p256::ProjectivePoint;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

pub mod voprf;

#[cfg(any(test, feature = "test-issuer"))]
pub mod testing;

pub use voprf::core::{
    decode_point, encode_point_compressed, encode_point_uncompressed, scalar_from_decimal,
    scalar_to_decimal, HashToCurve, Sswu,
};
pub use voprf::dleq::DleqProof;

/// Hash-to-curve context used when a deployment does not set its own.
pub const DEFAULT_CONTEXT: &[u8] = b"privpass-v1";

/// Length of a token seed in bytes.
pub const SEED_LEN: usize = 32;

/// HMAC-SHA256 output size
pub const BINDING_MAC_LEN: usize = 32;

/// Key used to derive the per-token shared key.
pub const DERIVE_KEY_TAG: &[u8] = b"hash_derive_key";

/// Prefix of every request binding MAC input.
pub const REQUEST_BINDING_TAG: &[u8] = b"hash_request_binding";

#[derive(Debug)]
pub enum Error {
    InvalidSecretKey,
    Internal,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidSecretKey => write!(f, "secret key is not a non-zero scalar"),
            Error::Internal => write!(f, "internal cryptographic error"),
        }
    }
}

impl std::error::Error for Error {}

/// Derive the shared redemption key for one token.
///
/// key = HMAC-SHA256("hash_derive_key", seed || SEC1_uncompressed(N))
///
/// where `N = k·H(seed)` is the unblinded signed point. Anyone holding the
/// issuer secret `k` can recompute `N` from the seed alone.
pub fn derive_redemption_key(seed: &[u8], unblinded: &ProjectivePoint) -> Zeroizing<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(DERIVE_KEY_TAG)
        .expect("HMAC can take key of any size");
    mac.update(seed);
    mac.update(&encode_point_uncompressed(unblinded));
    Zeroizing::new(mac.finalize().into_bytes().into())
}

/// Compute the request binding MAC.
///
/// MAC = HMAC-SHA256(key, "hash_request_binding" || binding)
pub fn compute_binding_mac(key: &[u8; 32], binding: &[u8]) -> [u8; BINDING_MAC_LEN] {
    let mut mac = HmacSha256::new_from_slice(key)
        .expect("HMAC can take key of any size");
    mac.update(REQUEST_BINDING_TAG);
    mac.update(binding);
    mac.finalize().into_bytes().into()
}

/// Verify a request binding MAC (constant-time).
pub fn verify_binding_mac(key: &[u8; 32], binding: &[u8], received: &[u8]) -> bool {
    if received.len() != BINDING_MAC_LEN {
        return false;
    }
    let computed = compute_binding_mac(key, binding);
    bool::from(computed[..].ct_eq(received))
}
