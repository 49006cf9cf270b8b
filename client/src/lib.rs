// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! Client engine for anonymous VOPRF tokens.
//!
//! The flow is split the same way the data moves:
//!
//! 1. [`TokenFactory`] draws random seeds, maps them to curve points and
//!    blinds them.
//! 2. [`BlindSignatureExchange`] turns a batch of blind tokens into an issuer
//!    request, then checks and unblinds the issuer's answer.
//! 3. [`TokenStore`] persists finished tokens per issuer configuration.
//! 4. [`RedemptionBuilder`] spends a token by binding it to a request context.
//!
//! [`Session`] ties these together behind an [`IssuerTransport`].

pub mod config;
pub mod error;
pub mod exchange;
pub mod factory;
pub mod redeem;
pub mod session;
pub mod storage;
pub mod store;
pub mod token;
pub mod transport;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use exchange::{BatchPolicy, BlindSignatureExchange, ExchangePolicy};
pub use factory::TokenFactory;
pub use redeem::{BindingContext, Redemption, RedemptionBuilder, RedemptionVerifier};
pub use session::Session;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{CountListener, TokenStore};
pub use token::{BlindToken, ConfigId, Token, TokenSeed};
pub use transport::{HttpTransport, IssuerTransport};
