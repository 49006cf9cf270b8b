// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! Token value types and their at-rest encoding.

use base64ct::{Base64, Encoding};
use p256::{NonZeroScalar, ProjectivePoint};
use privpass_common::api::StoredToken;
use privpass_crypto::{
    decode_point, encode_point_uncompressed, scalar_from_decimal, scalar_to_decimal,
};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Identifies an issuer key / configuration. Tokens from different
/// configurations never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigId(pub u32);

impl std::fmt::Display for ConfigId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ConfigId {
    fn from(id: u32) -> Self {
        ConfigId(id)
    }
}

/// Random token identifier. Secret until the token is redeemed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TokenSeed(Vec<u8>);

impl TokenSeed {
    pub fn new(bytes: Vec<u8>) -> Self {
        TokenSeed(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = Base64::decode_vec(s)?;
        if bytes.is_empty() {
            return Err(Error::Decode("empty token seed".into()));
        }
        Ok(TokenSeed(bytes))
    }

    /// Constant-time equality.
    pub fn ct_matches(&self, other: &TokenSeed) -> bool {
        self.0.len() == other.0.len() && bool::from(self.0.ct_eq(&other.0))
    }
}

impl PartialEq for TokenSeed {
    fn eq(&self, other: &Self) -> bool {
        self.ct_matches(other)
    }
}

impl Eq for TokenSeed {}

impl std::fmt::Debug for TokenSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenSeed({} bytes)", self.0.len())
    }
}

/// Output of the factory: a seed, its blinded curve point and the blind.
///
/// Lives only for the duration of one issuance request. The blind scalar
/// zeroizes on drop, so an abandoned request leaves nothing behind.
pub struct BlindToken {
    pub seed: TokenSeed,
    pub blinded: ProjectivePoint,
    pub blind: NonZeroScalar,
}

impl std::fmt::Debug for BlindToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlindToken")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

/// A finished token: the seed and the unblinded signed point `N = k·H(seed)`.
///
/// The blind is kept only because the at-rest format carries it.
#[derive(Clone)]
pub struct Token {
    pub seed: TokenSeed,
    pub point: ProjectivePoint,
    pub blind: NonZeroScalar,
}

impl Token {
    pub fn to_stored(&self) -> StoredToken {
        StoredToken {
            data: self.seed.to_base64(),
            point: Base64::encode_string(&encode_point_uncompressed(&self.point)),
            blind: scalar_to_decimal(&self.blind),
        }
    }

    pub fn from_stored(entry: &StoredToken) -> Result<Self> {
        let seed = TokenSeed::from_base64(&entry.data)?;
        let point = decode_point(&Base64::decode_vec(&entry.point)?)?;
        let blind = scalar_from_decimal(&entry.blind)?;
        Ok(Token { seed, point, blind })
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn sample() -> Token {
        Token {
            seed: TokenSeed::new(vec![7u8; 32]),
            point: ProjectivePoint::GENERATOR * *NonZeroScalar::random(&mut OsRng),
            blind: NonZeroScalar::random(&mut OsRng),
        }
    }

    #[test]
    fn test_stored_form_layout() {
        let t = sample();
        let s = t.to_stored();
        assert_eq!(s.data, "BwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwc=");
        let point = Base64::decode_vec(&s.point).unwrap();
        assert_eq!(point.len(), 65);
        assert_eq!(point[0], 0x04);
        assert!(s.blind.bytes().all(|b| b.is_ascii_digit()));

        let back = Token::from_stored(&s).unwrap();
        assert_eq!(back.seed, t.seed);
        assert_eq!(back.point, t.point);
        assert_eq!(back.blind.to_bytes(), t.blind.to_bytes());
    }

    #[test]
    fn test_from_stored_rejects_bad_fields() {
        let good = sample().to_stored();

        let mut bad = good.clone();
        bad.data = "!!!".into();
        assert!(matches!(Token::from_stored(&bad), Err(Error::Decode(_))));

        let mut bad = good.clone();
        bad.data = String::new();
        assert!(Token::from_stored(&bad).is_err());

        let mut bad = good.clone();
        bad.point = Base64::encode_string(&[0x04u8; 65]);
        assert!(Token::from_stored(&bad).is_err());

        let mut bad = good;
        bad.blind = "0".into();
        assert!(Token::from_stored(&bad).is_err());
    }

    #[test]
    fn test_seed_equality() {
        let a = TokenSeed::new(vec![1, 2, 3]);
        assert_eq!(a, TokenSeed::new(vec![1, 2, 3]));
        assert_ne!(a, TokenSeed::new(vec![1, 2, 4]));
        assert_ne!(a, TokenSeed::new(vec![1, 2]));
        assert_eq!(format!("{:?}", a), "TokenSeed(3 bytes)");
    }
}
