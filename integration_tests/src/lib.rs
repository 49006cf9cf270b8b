// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! In-process issuer used by the integration tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use p256::ProjectivePoint;
use privpass_client::IssuerTransport;
use privpass_common::api::{BatchProof, IssueBatchReq, IssueBatchResp};
use privpass_crypto::testing::TestIssuer;
use privpass_crypto::voprf::dleq::encode_proof;
use privpass_crypto::{decode_point, encode_point_compressed};
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How the mock answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Honest,
    /// Signs honestly, then shifts element `i` after proving.
    TamperAfterProof(usize),
    /// No proof attached.
    WithoutProof,
    /// No proof, element `i` replaced by bytes that are not a point.
    GarbleWithoutProof(usize),
    /// One element fewer than requested.
    DropLast,
}

pub struct MockIssuer {
    issuer: TestIssuer,
    behavior: Behavior,
    delay: Option<Duration>,
    requests: AtomicUsize,
}

impl MockIssuer {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            issuer: TestIssuer::random(&mut OsRng),
            behavior,
            delay: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Wait before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn issuer(&self) -> &TestIssuer {
        &self.issuer
    }

    pub fn public_key(&self) -> ProjectivePoint {
        self.issuer.public_key()
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IssuerTransport for MockIssuer {
    async fn issue(&self, req: &IssueBatchReq) -> Result<IssueBatchResp> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }

        let blinded = req
            .blinded_elements
            .iter()
            .map(|e| -> Result<ProjectivePoint> {
                Ok(decode_point(&Base64UrlUnpadded::decode_vec(e)?)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let (mut signed, proof) = self
            .issuer
            .sign_with_proof(&blinded, &mut OsRng)
            .map_err(|e| anyhow!("sign: {}", e))?;
        let proof_bytes = encode_proof(&proof);
        let wire_proof = BatchProof {
            commitment: Base64UrlUnpadded::encode_string(&proof_bytes[..32]),
            response: Base64UrlUnpadded::encode_string(&proof_bytes[32..]),
        };

        if let Behavior::TamperAfterProof(i) = self.behavior {
            signed[i] += ProjectivePoint::GENERATOR;
        }
        if self.behavior == Behavior::DropLast {
            signed.pop();
        }

        let mut signed_elements: Vec<String> = signed
            .iter()
            .map(|p| Base64UrlUnpadded::encode_string(&encode_point_compressed(p)))
            .collect();
        if let Behavior::GarbleWithoutProof(i) = self.behavior {
            signed_elements[i] = Base64UrlUnpadded::encode_string(&[0xFFu8; 33]);
        }

        let proof = match self.behavior {
            Behavior::WithoutProof | Behavior::GarbleWithoutProof(_) => None,
            _ => Some(wire_proof),
        };
        Ok(IssueBatchResp {
            signed_elements,
            proof,
        })
    }
}
