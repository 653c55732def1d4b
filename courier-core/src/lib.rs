//! `courier-core` is the protocol engine behind pairwise agent interactions
//! over a store-and-forward relay: establishing an authenticated connection
//! between two autonomous agents, issuing a verifiable credential over that
//! connection, and requesting and verifying a proof derived from it.
//!
//! Neither peer can call the other directly. Each side polls the relay for
//! pending protocol messages and folds them into local state, so every state
//! machine here is resumable, idempotent and replay-safe against an
//! unordered, at-least-once delivery channel.
//!
//! The wallet and key-management subsystem, the ledger, the relay transport
//! and the cryptographic verifier are consumed as traits; this crate owns
//! only the orchestration state machines and their transition rules.

pub mod agent;
pub mod ledger;
pub mod relay;
pub mod scheduler;
