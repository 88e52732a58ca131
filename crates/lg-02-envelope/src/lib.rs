//! # lg-02-envelope
//!
//! Authenticated envelope protocol for ledger requests and responses.
//!
//! ## Components
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `domain::canonical` | Fixed-order canonical bytes per operation |
//! | `domain::policy` | Which checks are enabled (signature, MAC, nonce) |
//! | `domain::replay` | Nonce replay guard with atomic check-and-insert |
//! | `wire` | JSON request/response bodies (base64 fields) |
//! | `verifier` | MAC → signature → nonce, fail-fast |
//! | `signer` | Service-side response sealing |
//! | `client` | Owner-side request building and response checks |
//!
//! ## Security
//!
//! - Nothing is recorded before the MAC and signature both pass
//! - A nonce is admitted at most once (per retention policy)
//! - Malformed keys fail verification; they are never "valid"

pub mod client;
pub mod domain;
pub mod signer;
pub mod verifier;
pub mod wire;

pub use client::LedgerClient;
pub use domain::*;
pub use signer::ResponseSigner;
pub use verifier::{EnvelopeParts, EnvelopeVerifier};
pub use wire::*;
