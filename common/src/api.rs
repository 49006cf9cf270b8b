// common/src/api.rs
use serde::{Deserialize, Serialize};

// ============================================================================
// Batch Issuance Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueBatchReq {
    /// Issuer configuration the tokens are requested under
    pub config_id: u32,

    /// Blinded elements, SEC1 compressed, base64url encoded, in request order
    #[serde(alias = "blinded")]
    pub blinded_elements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueBatchResp {
    /// Evaluated elements, base64url encoded, index-aligned with the request
    #[serde(alias = "signed")]
    pub signed_elements: Vec<String>,

    /// Optional batch DLEQ proof over every (blinded, signed) pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<BatchProof>,
}

/// Batch DLEQ proof as sent by the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProof {
    /// Challenge scalar, 32 bytes big-endian, base64url
    pub commitment: String,

    /// Response scalar, 32 bytes big-endian, base64url
    pub response: String,
}

// ============================================================================
// Redemption Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionMsg {
    /// Token seed (base64url)
    pub data: String,

    /// HMAC-SHA256 binding over the request context (base64url)
    pub mac: String,
}

// ============================================================================
// Storage Types
// ============================================================================

/// At-rest token entry. Field names and encodings are shared with stores
/// written by earlier clients, so they must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    /// Token seed (standard base64)
    pub data: String,

    /// Unblinded signed point, SEC1 uncompressed (standard base64)
    pub point: String,

    /// Blinding scalar as a decimal string
    pub blind: String,
}
