// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! P-256 curve adapter: hash-to-curve, SEC1 point codecs and the scalar
//! encodings used on the wire and at rest.

use elliptic_curve::hash2curve::{ExpandMsgXmd, GroupDigest};
use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use elliptic_curve::PrimeField;
use num_bigint::BigUint;
use p256::{AffinePoint, EncodedPoint, FieldBytes, NistP256, NonZeroScalar, ProjectivePoint, Scalar};
use sha2::Sha256;

pub const COMPRESSED_POINT_LEN: usize = 33;
pub const UNCOMPRESSED_POINT_LEN: usize = 65;
pub const SCALAR_LEN: usize = 32;

/// Number of decimal digits in the P-256 group order.
const MAX_DECIMAL_DIGITS: usize = 78;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidPoint,
    IdentityPoint,
    InvalidScalar,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidPoint => write!(f, "invalid SEC1 point encoding"),
            Error::IdentityPoint => write!(f, "point at infinity is not a valid element"),
            Error::InvalidScalar => write!(f, "scalar is zero or out of range"),
        }
    }
}

impl std::error::Error for Error {}

/// Maps arbitrary bytes to a curve point.
///
/// `None` means the mapping found no point for this input. Callers treat that
/// as a per-input miss, not as a fatal error.
pub trait HashToCurve {
    fn hash_to_curve(&self, input: &[u8]) -> Option<ProjectivePoint>;
}

/// RFC 9380 `P256_XMD:SHA-256_SSWU_RO_` with a caller-chosen context suffix.
#[derive(Clone, Debug)]
pub struct Sswu {
    dst: Vec<u8>,
}

impl Sswu {
    pub const BASE_DST: &'static [u8] = b"P256_XMD:SHA-256_SSWU_RO_";

    pub fn new(ctx: &[u8]) -> Self {
        let mut dst = Vec::with_capacity(Self::BASE_DST.len() + ctx.len());
        dst.extend_from_slice(Self::BASE_DST);
        dst.extend_from_slice(ctx);
        Self { dst }
    }

    pub fn dst(&self) -> &[u8] {
        &self.dst
    }
}

impl Default for Sswu {
    fn default() -> Self {
        Self::new(crate::DEFAULT_CONTEXT)
    }
}

impl HashToCurve for Sswu {
    fn hash_to_curve(&self, input: &[u8]) -> Option<ProjectivePoint> {
        // Errors only on an empty DST, which `new` rules out.
        let point =
            NistP256::hash_from_bytes::<ExpandMsgXmd<Sha256>>(&[input], &[self.dst.as_slice()])
                .ok()?;
        if bool::from(point.to_affine().is_identity()) {
            return None;
        }
        Some(point)
    }
}

pub fn generator() -> ProjectivePoint {
    ProjectivePoint::GENERATOR
}

pub fn encode_point_compressed(p: &ProjectivePoint) -> Vec<u8> {
    p.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

/// Uncompressed SEC1 form, used by the at-rest token format.
pub fn encode_point_uncompressed(p: &ProjectivePoint) -> Vec<u8> {
    p.to_affine().to_encoded_point(false).as_bytes().to_vec()
}

/// Decodes a compressed or uncompressed SEC1 point, rejecting the identity.
pub fn decode_point(bytes: &[u8]) -> Result<ProjectivePoint, Error> {
    if bytes.len() != COMPRESSED_POINT_LEN && bytes.len() != UNCOMPRESSED_POINT_LEN {
        return Err(Error::InvalidPoint);
    }
    let ep = EncodedPoint::from_bytes(bytes).map_err(|_| Error::InvalidPoint)?;
    let ap: Option<AffinePoint> = AffinePoint::from_encoded_point(&ep).into();
    let ap = ap.ok_or(Error::InvalidPoint)?;
    if bool::from(ap.is_identity()) {
        return Err(Error::IdentityPoint);
    }
    Ok(ProjectivePoint::from(ap))
}

/// Canonical big-endian scalar in `[1, n-1]`.
pub fn decode_nonzero_scalar(bytes: &[u8]) -> Result<NonZeroScalar, Error> {
    let arr: [u8; SCALAR_LEN] = bytes.try_into().map_err(|_| Error::InvalidScalar)?;
    Option::<NonZeroScalar>::from(NonZeroScalar::from_repr(FieldBytes::from(arr)))
        .ok_or(Error::InvalidScalar)
}

/// Canonical big-endian scalar in `[0, n-1]`.
pub fn decode_scalar(bytes: &[u8]) -> Result<Scalar, Error> {
    let arr: [u8; SCALAR_LEN] = bytes.try_into().map_err(|_| Error::InvalidScalar)?;
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(arr))).ok_or(Error::InvalidScalar)
}

pub fn scalar_to_decimal(s: &Scalar) -> String {
    BigUint::from_bytes_be(&s.to_bytes()).to_str_radix(10)
}

/// Parses the decimal form written by [`scalar_to_decimal`]. Only plain ASCII
/// digits are accepted; zero and values `>= n` are rejected.
pub fn scalar_from_decimal(s: &str) -> Result<NonZeroScalar, Error> {
    if s.is_empty() || s.len() > MAX_DECIMAL_DIGITS || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidScalar);
    }
    let n = BigUint::parse_bytes(s.as_bytes(), 10).ok_or(Error::InvalidScalar)?;
    let be = n.to_bytes_be();
    if be.len() > SCALAR_LEN {
        return Err(Error::InvalidScalar);
    }
    let mut arr = [0u8; SCALAR_LEN];
    arr[SCALAR_LEN - be.len()..].copy_from_slice(&be);
    decode_nonzero_scalar(&arr)
}
