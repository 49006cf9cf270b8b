// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

/// Discrete Log Equality (DLEQ) proofs for P-256
///
/// Prove that the same secret 'k' links two point pairs:
///   Y = k·G  and  B = k·A
/// without revealing 'k'. The batched form folds many (A_i, B_i) pairs
/// into one composite pair with hash-derived weights, so a single proof
/// covers every evaluation in an issuance response.
use core::fmt;
use p256::{
    elliptic_curve::{ops::Reduce, sec1::ToEncodedPoint, Field},
    AffinePoint, ProjectivePoint, Scalar,
};
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::core::{decode_scalar, SCALAR_LEN};

/// A DLEQ proof (challenge `c` and response `s`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DleqProof {
    /// Fiat-Shamir challenge scalar ("commitment" on the wire).
    pub c: Scalar,
    /// Schnorr response scalar.
    pub s: Scalar,
}

impl fmt::Debug for DleqProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DleqProof {{ c: 0x{}, s: 0x{} }}",
            hex32(&self.c),
            hex32(&self.s)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchError {
    /// Blinded and evaluated lists differ in length or are empty.
    Length,
}

/// Domain separation tag for the transcript.
const DLEQ_DST: &[u8] = b"DLEQ-P256-v1";

/// Domain separation tag for batch composite weights.
const COMPOSITE_DST: &[u8] = b"DLEQ-P256-v1-Composite";

fn full_dst(extra: Option<&[u8]>) -> Vec<u8> {
    let mut dst = Vec::with_capacity(DLEQ_DST.len() + extra.map_or(0, |d| d.len()));
    dst.extend_from_slice(DLEQ_DST);
    if let Some(extra) = extra {
        dst.extend_from_slice(extra);
    }
    dst
}

fn update_dst(hasher: &mut Sha256, dst: &[u8]) {
    hasher.update(u32::try_from(dst.len()).unwrap_or(0).to_be_bytes());
    hasher.update(dst);
}

/// Compute Fiat-Shamir challenge as a scalar: c = H(bytes) mod n.
fn challenge_scalar(
    g: &AffinePoint,
    y: &AffinePoint,
    a: &AffinePoint,
    b: &AffinePoint,
    t1: &AffinePoint,
    t2: &AffinePoint,
    dst: &[u8],
) -> Scalar {
    let mut hasher = Sha256::new();
    update_dst(&mut hasher, dst);

    for p in [g, y, a, b, t1, t2] {
        let enc = p.to_encoded_point(true);
        hasher.update(enc.as_bytes());
    }

    Scalar::reduce_bytes(&hasher.finalize())
}

/// Create a DLEQ proof that 'y = k·G' and 'b = k·a' for the same 'k'.
///
/// The ephemeral scalar `r` is zeroized on drop (`Scalar: DefaultIsZeroes`).
pub fn prove<R: RngCore + CryptoRng>(
    k: &Scalar,
    g: &AffinePoint,
    y: &AffinePoint,
    a: &AffinePoint,
    b: &AffinePoint,
    rng: &mut R,
    dst: Option<&[u8]>,
) -> DleqProof {
    let r = Scalar::random(rng);
    let t1 = (ProjectivePoint::from(*g) * r).to_affine();
    let t2 = (ProjectivePoint::from(*a) * r).to_affine();

    let c = challenge_scalar(g, y, a, b, &t1, &t2, &full_dst(dst));
    let s = r + c * *k;

    DleqProof { c, s }
}

/// Verify a DLEQ proof.
pub fn verify(
    g: &AffinePoint,
    y: &AffinePoint,
    a: &AffinePoint,
    b: &AffinePoint,
    proof: &DleqProof,
    dst: Option<&[u8]>,
) -> bool {
    let s_g = ProjectivePoint::from(*g) * proof.s;
    let c_y = ProjectivePoint::from(*y) * proof.c;
    let t1_prime = (s_g - c_y).to_affine();

    let s_a = ProjectivePoint::from(*a) * proof.s;
    let c_b = ProjectivePoint::from(*b) * proof.c;
    let t2_prime = (s_a - c_b).to_affine();

    let c_check = challenge_scalar(g, y, a, b, &t1_prime, &t2_prime, &full_dst(dst));

    bool::from(c_check.to_bytes().ct_eq(&proof.c.to_bytes()))
}

/// Fold `(blinded[i], evaluated[i])` into `(M, Z) = (Σ c_i·A_i, Σ c_i·B_i)`.
///
/// The weights `c_i` are derived from the issuer key and the whole batch, so
/// changing any single element changes every weight.
pub fn batch_composites(
    y: &AffinePoint,
    blinded: &[ProjectivePoint],
    evaluated: &[ProjectivePoint],
    dst: Option<&[u8]>,
) -> Result<(ProjectivePoint, ProjectivePoint), BatchError> {
    if blinded.is_empty() || blinded.len() != evaluated.len() {
        return Err(BatchError::Length);
    }

    let mut hasher = Sha256::new();
    update_dst(&mut hasher, COMPOSITE_DST);
    update_dst(&mut hasher, &full_dst(dst));
    hasher.update(y.to_encoded_point(true).as_bytes());
    hasher.update((blinded.len() as u64).to_be_bytes());
    for (a, b) in blinded.iter().zip(evaluated) {
        hasher.update(a.to_affine().to_encoded_point(true).as_bytes());
        hasher.update(b.to_affine().to_encoded_point(true).as_bytes());
    }
    let seed = hasher.finalize();

    let mut m = ProjectivePoint::IDENTITY;
    let mut z = ProjectivePoint::IDENTITY;
    for (i, (a, b)) in blinded.iter().zip(evaluated).enumerate() {
        let mut h = Sha256::new();
        h.update(seed);
        h.update((i as u64).to_be_bytes());
        let c_i = Scalar::reduce_bytes(&h.finalize());
        m += *a * c_i;
        z += *b * c_i;
    }
    Ok((m, z))
}

/// Prove that every `evaluated[i] = k·blinded[i]` with `y = k·G`.
pub fn prove_batch<R: RngCore + CryptoRng>(
    k: &Scalar,
    y: &AffinePoint,
    blinded: &[ProjectivePoint],
    evaluated: &[ProjectivePoint],
    rng: &mut R,
    dst: Option<&[u8]>,
) -> Result<DleqProof, BatchError> {
    let (m, z) = batch_composites(y, blinded, evaluated, dst)?;
    Ok(prove(
        k,
        &AffinePoint::GENERATOR,
        y,
        &m.to_affine(),
        &z.to_affine(),
        rng,
        dst,
    ))
}

/// Verify a batch proof. Length mismatches and empty batches never verify.
pub fn verify_batch(
    y: &AffinePoint,
    blinded: &[ProjectivePoint],
    evaluated: &[ProjectivePoint],
    proof: &DleqProof,
    dst: Option<&[u8]>,
) -> bool {
    match batch_composites(y, blinded, evaluated, dst) {
        Ok((m, z)) => verify(
            &AffinePoint::GENERATOR,
            y,
            &m.to_affine(),
            &z.to_affine(),
            proof,
            dst,
        ),
        Err(_) => false,
    }
}

/// Serialize proof to 64 bytes.
pub fn encode_proof(proof: &DleqProof) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&proof.c.to_bytes());
    out[32..].copy_from_slice(&proof.s.to_bytes());
    out
}

/// Strict decoding of the two wire scalars: each must be exactly 32
/// canonical big-endian bytes.
pub fn decode_proof_parts(commitment: &[u8], response: &[u8]) -> Option<DleqProof> {
    if commitment.len() != SCALAR_LEN || response.len() != SCALAR_LEN {
        return None;
    }
    let c = decode_scalar(commitment).ok()?;
    let s = decode_scalar(response).ok()?;
    Some(DleqProof { c, s })
}

fn hex32(x: &Scalar) -> String {
    let b = x.to_bytes();
    b.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::{ProjectivePoint, Scalar};
    use rand_core::OsRng;

    fn batch(k: &Scalar, n: usize) -> (AffinePoint, Vec<ProjectivePoint>, Vec<ProjectivePoint>) {
        let y = (ProjectivePoint::GENERATOR * *k).to_affine();
        let blinded: Vec<_> = (0..n)
            .map(|_| ProjectivePoint::GENERATOR * Scalar::random(&mut OsRng))
            .collect();
        let evaluated = blinded.iter().map(|a| *a * *k).collect();
        (y, blinded, evaluated)
    }

    #[test]
    fn round_trip_proof() {
        let mut rng = OsRng;
        let k = Scalar::random(&mut rng);
        let g = AffinePoint::GENERATOR;
        let a = (ProjectivePoint::GENERATOR * Scalar::random(&mut rng)).to_affine();
        let y = (ProjectivePoint::from(g) * k).to_affine();
        let b = (ProjectivePoint::from(a) * k).to_affine();

        let proof = prove(&k, &g, &y, &a, &b, &mut rng, Some(b"test-dst"));
        assert!(verify(&g, &y, &a, &b, &proof, Some(b"test-dst")));

        let enc = encode_proof(&proof);
        assert_eq!(Some(proof), decode_proof_parts(&enc[..32], &enc[32..]));
    }

    #[test]
    fn detect_bad_proof() {
        let mut rng = OsRng;
        let k = Scalar::random(&mut rng);
        let g = AffinePoint::GENERATOR;
        let a = (ProjectivePoint::GENERATOR * Scalar::random(&mut rng)).to_affine();
        let y = (ProjectivePoint::from(g) * k).to_affine();
        let b = (ProjectivePoint::from(a) * k).to_affine();

        let mut proof = prove(&k, &g, &y, &a, &b, &mut rng, None);
        proof.s += Scalar::ONE;
        assert!(!verify(&g, &y, &a, &b, &proof, None));
    }

    #[test]
    fn test_proof_rejection_patterns() {
        let mut rng = OsRng;
        let k = Scalar::random(&mut rng);
        let g = AffinePoint::GENERATOR;
        let a = (ProjectivePoint::GENERATOR * Scalar::random(&mut rng)).to_affine();
        let y = (ProjectivePoint::from(g) * k).to_affine();
        let b = (ProjectivePoint::from(a) * k).to_affine();

        let proof = prove(&k, &g, &y, &a, &b, &mut rng, Some(b"test"));
        assert!(verify(&g, &y, &a, &b, &proof, Some(b"test")));

        let bumped_c = DleqProof { c: proof.c + Scalar::ONE, s: proof.s };
        assert!(!verify(&g, &y, &a, &b, &bumped_c, Some(b"test")));

        assert!(!verify(&g, &y, &a, &b, &proof, Some(b"wrong-dst")));

        let swapped = DleqProof { c: proof.s, s: proof.c };
        assert!(!verify(&g, &y, &a, &b, &swapped, Some(b"test")));

        let zero_c = DleqProof { c: Scalar::ZERO, s: proof.s };
        assert!(!verify(&g, &y, &a, &b, &zero_c, Some(b"test")));
    }

    #[test]
    fn batch_proof_verifies() {
        let mut rng = OsRng;
        let k = Scalar::random(&mut rng);
        for n in [1usize, 2, 7] {
            let (y, blinded, evaluated) = batch(&k, n);
            let proof = prove_batch(&k, &y, &blinded, &evaluated, &mut rng, Some(b"ctx")).unwrap();
            assert!(verify_batch(&y, &blinded, &evaluated, &proof, Some(b"ctx")));
        }
    }

    #[test]
    fn batch_proof_rejects_single_tampered_element() {
        let mut rng = OsRng;
        let k = Scalar::random(&mut rng);
        let (y, blinded, mut evaluated) = batch(&k, 5);
        let proof = prove_batch(&k, &y, &blinded, &evaluated, &mut rng, None).unwrap();

        evaluated[3] += ProjectivePoint::GENERATOR;
        assert!(!verify_batch(&y, &blinded, &evaluated, &proof, None));
    }

    #[test]
    fn batch_proof_rejects_reordering_and_truncation() {
        let mut rng = OsRng;
        let k = Scalar::random(&mut rng);
        let (y, blinded, evaluated) = batch(&k, 4);
        let proof = prove_batch(&k, &y, &blinded, &evaluated, &mut rng, None).unwrap();

        let mut swapped = evaluated.clone();
        swapped.swap(0, 1);
        assert!(!verify_batch(&y, &blinded, &swapped, &proof, None));

        assert!(!verify_batch(&y, &blinded[..3], &evaluated[..3], &proof, None));
        assert!(!verify_batch(&y, &blinded, &evaluated[..3], &proof, None));
        assert!(!verify_batch(&y, &[], &[], &proof, None));
    }

    #[test]
    fn batch_proof_rejects_other_key() {
        let mut rng = OsRng;
        let k = Scalar::random(&mut rng);
        let other = Scalar::random(&mut rng);
        let (_, blinded, evaluated) = batch(&k, 3);
        let y_other = (ProjectivePoint::GENERATOR * other).to_affine();

        // honest evaluations, proof made with a different key
        let proof = prove_batch(&other, &y_other, &blinded, &evaluated, &mut rng, None).unwrap();
        assert!(!verify_batch(&y_other, &blinded, &evaluated, &proof, None));
    }

    #[test]
    fn strict_part_decoding_rejects_bad_lengths() {
        assert!(decode_proof_parts(&[0u8; 31], &[0u8; 32]).is_none());
        assert!(decode_proof_parts(&[0u8; 32], &[0u8; 33]).is_none());
        assert!(decode_proof_parts(&[0xFFu8; 32], &[0u8; 32]).is_none());
    }
}
