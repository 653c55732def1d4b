//! # Connection Module
//!
//! The `connection` module drives the pairwise handshake between two agents
//! over the store-and-forward relay:
//!
//! ```text
//! Initial -> InviteSent -> RequestReceived -> ResponseSent -> Accepted
//! ```
//!
//! with the alternate terminal `Undefined` on a counterparty problem report.
//!
//! ## Module Structure
//!
//! - [`types`] - errors, states, identifiers and the domain traits
//! - [`connection`] - the connection entity and its pure message fold
//! - [`usecase`] - the state machine over its repository/relay collaborators

pub mod types;

pub mod connection;
pub use connection::Connection;

mod usecase;
pub use usecase::Usecase;
