//! `agent` is the domain holding the three protocol state machines an agent
//! runs against its store-and-forward relay:
//!
//! - `connection`
//! - `issuance`
//! - `presentation`
//!
//! ---
//!
//! The `connection` sub-domain drives the pairwise handshake. One side
//! publishes an invitation and then folds the counterparty's connection
//! request and acknowledgement into local state until the connection is
//! `Accepted`. Every later exchange is scoped to one of these connections
//! and reuses its pairwise channel.
//!
//! ---
//!
//! The `issuance` sub-domain drives one credential issuance flow: offer,
//! counterparty request, issue, acceptance. Ledger-mutating preconditions
//! (schema and credential-definition registration, transaction author
//! agreement acceptance) live here too because the offer cannot be published
//! before they hold.
//!
//! ---
//!
//! The `presentation` sub-domain drives one proof exchange: request,
//! presentation, local cryptographic verification. The protocol outcome
//! (the exchange finished) and the truth value of the proof are recorded
//! separately; callers must inspect both.
//!
//! ---
//!
//! All three machines share the same shape: a pure, synchronous `advance`
//! fold on the entity that only consumes relay messages, and an async
//! usecase layer that polls the relay, applies the fold, performs the
//! outbound publishes a transition requires, and persists the entity. The
//! folds are idempotent and replay-safe: the relay delivers at-least-once
//! and repeated polls may re-return consumed messages.

pub mod connection;
pub mod issuance;
pub mod presentation;
pub mod types;
