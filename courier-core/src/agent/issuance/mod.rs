//! # Issuance Module
//!
//! The `issuance` module drives one credential issuance flow from the
//! issuer's side:
//!
//! ```text
//! OfferPrepared -> OfferSent -> RequestReceived -> CredentialSent -> Accepted
//! ```
//!
//! with the alternate terminal `Undefined` when the counterparty declines the
//! offer or rejects the issued credential. The ledger-write preconditions
//! (transaction author agreement acceptance, schema and credential-definition
//! registration) live here as well.

pub mod types;

mod exchange;
pub use exchange::CredentialExchange;

mod usecase;
pub use usecase::Usecase;
