// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! Issuance request building and response finalization.

use std::str::FromStr;

use base64ct::{Base64UrlUnpadded, Encoding};
use p256::elliptic_curve::ops::Invert;
use p256::ProjectivePoint;
use privpass_common::api::{BatchProof, IssueBatchReq, IssueBatchResp};
use privpass_crypto::voprf::dleq::{decode_proof_parts, verify_batch, DleqProof};
use privpass_crypto::{decode_point, encode_point_compressed};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::token::{BlindToken, ConfigId, Token};

/// What to do with individual signed elements that fail to decode when the
/// response carries no proof. With a proof present every element must decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Keep the tokens whose elements decode, drop the rest.
    #[default]
    DropMalformed,
    /// Reject the whole batch on any bad element.
    AllOrNothing,
}

impl FromStr for BatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop_malformed" | "drop-malformed" => Ok(BatchPolicy::DropMalformed),
            "all_or_nothing" | "all-or-nothing" => Ok(BatchPolicy::AllOrNothing),
            other => Err(format!("unknown batch policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExchangePolicy {
    /// Refuse responses that carry no batch proof.
    pub require_proof: bool,
    pub batch: BatchPolicy,
}

/// Client side of one blind signature round with an issuer configuration.
#[derive(Debug, Clone, Default)]
pub struct BlindSignatureExchange {
    policy: ExchangePolicy,
    issuer_key: Option<ProjectivePoint>,
    proof_context: Option<Vec<u8>>,
}

impl BlindSignatureExchange {
    pub fn new(policy: ExchangePolicy) -> Self {
        Self {
            policy,
            issuer_key: None,
            proof_context: None,
        }
    }

    /// Issuer public key used to check batch proofs.
    pub fn with_issuer_key(mut self, y: ProjectivePoint) -> Self {
        self.issuer_key = Some(y);
        self
    }

    /// Parses a SEC1 issuer key (compressed or uncompressed).
    pub fn with_issuer_key_sec1(self, sec1: &[u8]) -> Result<Self> {
        let y = decode_point(sec1)?;
        Ok(self.with_issuer_key(y))
    }

    /// Extra domain separation the issuer mixes into its proofs.
    pub fn with_proof_context(mut self, ctx: &[u8]) -> Self {
        self.proof_context = Some(ctx.to_vec());
        self
    }

    pub fn policy(&self) -> ExchangePolicy {
        self.policy
    }

    pub fn issuer_key(&self) -> Option<&ProjectivePoint> {
        self.issuer_key.as_ref()
    }

    /// Issuer request for `tokens`, elements in the same order.
    pub fn build_issuance_request(&self, config: ConfigId, tokens: &[BlindToken]) -> IssueBatchReq {
        IssueBatchReq {
            config_id: config.0,
            blinded_elements: tokens
                .iter()
                .map(|t| Base64UrlUnpadded::encode_string(&encode_point_compressed(&t.blinded)))
                .collect(),
        }
    }

    /// Checks the issuer response against the pending tokens and unblinds.
    ///
    /// `tokens` must be the exact slice the request was built from. Element
    /// `i` of the response is matched to token `i`.
    pub fn finalize(
        &self,
        config: ConfigId,
        tokens: Vec<BlindToken>,
        resp: &IssueBatchResp,
    ) -> Result<Vec<Token>> {
        if resp.signed_elements.len() != tokens.len() {
            return Err(Error::ProtocolMismatch {
                expected: tokens.len(),
                received: resp.signed_elements.len(),
            });
        }
        if resp.proof.is_none() && self.policy.require_proof {
            return Err(Error::ProofVerification("response carries no proof"));
        }
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let decoded: Vec<Result<ProjectivePoint>> = resp
            .signed_elements
            .iter()
            .map(|s| decode_element(s))
            .collect();

        let signed: Vec<Option<ProjectivePoint>> = match &resp.proof {
            Some(proof) => {
                let signed = decoded.into_iter().collect::<Result<Vec<_>>>()?;
                self.verify_proof(&tokens, &signed, proof)?;
                debug!(config = %config, batch = tokens.len(), "batch proof verified");
                signed.into_iter().map(Some).collect()
            }
            None => match self.policy.batch {
                BatchPolicy::AllOrNothing => decoded
                    .into_iter()
                    .map(|r| r.map(Some))
                    .collect::<Result<Vec<_>>>()?,
                BatchPolicy::DropMalformed => decoded
                    .into_iter()
                    .enumerate()
                    .map(|(i, r)| match r {
                        Ok(p) => Some(p),
                        Err(e) => {
                            warn!(
                                config = %config,
                                index = i,
                                error = %e,
                                "dropping malformed signed element"
                            );
                            None
                        }
                    })
                    .collect(),
            },
        };

        let finished: Vec<Token> = tokens
            .into_iter()
            .zip(signed)
            .filter_map(|(t, s)| s.map(|s| unblind(t, &s)))
            .collect();

        info!(config = %config, tokens = finished.len(), "issuance finalized");
        Ok(finished)
    }

    fn verify_proof(
        &self,
        tokens: &[BlindToken],
        signed: &[ProjectivePoint],
        proof: &BatchProof,
    ) -> Result<()> {
        let y = self
            .issuer_key
            .ok_or(Error::ProofVerification("no issuer key configured"))?;
        let proof = decode_batch_proof(proof)?;
        let blinded: Vec<ProjectivePoint> = tokens.iter().map(|t| t.blinded).collect();
        if !verify_batch(
            &y.to_affine(),
            &blinded,
            signed,
            &proof,
            self.proof_context.as_deref(),
        ) {
            return Err(Error::ProofVerification("batch proof rejected"));
        }
        Ok(())
    }
}

fn decode_element(s: &str) -> Result<ProjectivePoint> {
    let bytes = Base64UrlUnpadded::decode_vec(s)?;
    Ok(decode_point(&bytes)?)
}

fn decode_batch_proof(proof: &BatchProof) -> Result<DleqProof> {
    let c = Base64UrlUnpadded::decode_vec(&proof.commitment).ok();
    let s = Base64UrlUnpadded::decode_vec(&proof.response).ok();
    c.zip(s)
        .and_then(|(c, s)| decode_proof_parts(&c, &s))
        .ok_or(Error::ProofVerification("malformed proof"))
}

/// N = r⁻¹·Z
fn unblind(t: BlindToken, signed: &ProjectivePoint) -> Token {
    let r_inv = t.blind.invert();
    Token {
        point: *signed * *r_inv,
        seed: t.seed,
        blind: t.blind,
    }
}
