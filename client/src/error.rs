// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

use std::fmt;

/// Errors surfaced by the token engine.
#[derive(Debug)]
pub enum Error {
    /// A seed could not be mapped to a curve point.
    PointGeneration,
    /// The issuer answered with a different number of elements than requested.
    ProtocolMismatch { expected: usize, received: usize },
    /// The batch proof was missing, malformed or did not verify.
    ProofVerification(&'static str),
    /// An element or stored entry could not be decoded.
    Decode(String),
    /// No stored token matched.
    TokenNotFound,
    /// The stored count disagrees with the stored token array.
    StorageInconsistency { count: usize, stored: usize },
    /// A redemption MAC did not verify.
    InvalidRedemption,
    Storage(anyhow::Error),
    Transport(anyhow::Error),
    /// Issuance was abandoned before the issuer answered.
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PointGeneration => write!(f, "seed did not map to a curve point"),
            Error::ProtocolMismatch { expected, received } => write!(
                f,
                "issuer returned {} elements, expected {}",
                received, expected
            ),
            Error::ProofVerification(why) => write!(f, "batch proof verification failed: {}", why),
            Error::Decode(what) => write!(f, "decode error: {}", what),
            Error::TokenNotFound => write!(f, "no matching token in store"),
            Error::StorageInconsistency { count, stored } => write!(
                f,
                "stored count {} does not match {} stored tokens",
                count, stored
            ),
            Error::InvalidRedemption => write!(f, "redemption MAC did not verify"),
            Error::Storage(e) => write!(f, "storage error: {:#}", e),
            Error::Transport(e) => write!(f, "transport error: {:#}", e),
            Error::Cancelled => write!(f, "issuance cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Storage(e) | Error::Transport(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<privpass_crypto::voprf::core::Error> for Error {
    fn from(e: privpass_crypto::voprf::core::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<base64ct::Error> for Error {
    fn from(e: base64ct::Error) -> Self {
        Error::Decode(format!("base64: {}", e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(format!("json: {}", e))
    }
}
