// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! Issuer stand-in for tests and benches.
//!
//! Real issuance happens on a remote server; this evaluator only exists so the
//! client can be exercised end to end without one.

use p256::{NonZeroScalar, ProjectivePoint};
use rand_core::{CryptoRng, RngCore};

use crate::voprf::core::{decode_nonzero_scalar, encode_point_compressed, generator, HashToCurve};
use crate::voprf::dleq::{prove_batch, DleqProof};
use crate::Error;

pub struct TestIssuer {
    k: NonZeroScalar,
    y: ProjectivePoint,
    ctx: Option<Vec<u8>>,
}

impl TestIssuer {
    pub fn from_secret_key(sk_bytes: [u8; 32]) -> Result<Self, Error> {
        let k = decode_nonzero_scalar(&sk_bytes).map_err(|_| Error::InvalidSecretKey)?;
        Ok(Self::from_scalar(k))
    }

    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_scalar(NonZeroScalar::random(rng))
    }

    fn from_scalar(k: NonZeroScalar) -> Self {
        Self {
            k,
            y: generator() * *k,
            ctx: None,
        }
    }

    /// Extra domain separation appended to the proof DST.
    pub fn with_proof_context(mut self, ctx: &[u8]) -> Self {
        self.ctx = Some(ctx.to_vec());
        self
    }

    pub fn secret_key(&self) -> [u8; 32] {
        self.k.to_bytes().into()
    }

    pub fn public_key(&self) -> ProjectivePoint {
        self.y
    }

    pub fn public_key_sec1_compressed(&self) -> Vec<u8> {
        encode_point_compressed(&self.y)
    }

    pub fn sign(&self, blinded: &[ProjectivePoint]) -> Vec<ProjectivePoint> {
        blinded.iter().map(|a| *a * *self.k).collect()
    }

    pub fn sign_with_proof<R: RngCore + CryptoRng>(
        &self,
        blinded: &[ProjectivePoint],
        rng: &mut R,
    ) -> Result<(Vec<ProjectivePoint>, DleqProof), Error> {
        let evaluated = self.sign(blinded);
        let proof = prove_batch(
            &self.k,
            &self.y.to_affine(),
            blinded,
            &evaluated,
            rng,
            self.ctx.as_deref(),
        )
        .map_err(|_| Error::Internal)?;
        Ok((evaluated, proof))
    }

    /// What a verifier holding the secret expects for `seed`.
    pub fn evaluate_seed<H: HashToCurve>(&self, h2c: &H, seed: &[u8]) -> Option<ProjectivePoint> {
        h2c.hash_to_curve(seed).map(|p| p * *self.k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voprf::dleq::verify_batch;
    use rand_core::OsRng;

    #[test]
    fn test_issuer_proofs_verify() {
        let issuer = TestIssuer::random(&mut OsRng).with_proof_context(b"cfg-1");
        let blinded: Vec<_> = (1u64..=3)
            .map(|i| generator() * p256::Scalar::from(i))
            .collect();
        let (signed, proof) = issuer.sign_with_proof(&blinded, &mut OsRng).unwrap();
        assert!(verify_batch(
            &issuer.public_key().to_affine(),
            &blinded,
            &signed,
            &proof,
            Some(b"cfg-1"),
        ));
    }

    #[test]
    fn test_secret_key_roundtrip() {
        let issuer = TestIssuer::random(&mut OsRng);
        let again = TestIssuer::from_secret_key(issuer.secret_key()).unwrap();
        assert_eq!(issuer.public_key(), again.public_key());
        assert!(matches!(
            TestIssuer::from_secret_key([0u8; 32]),
            Err(Error::InvalidSecretKey)
        ));
    }
}
