//! # Presentation Module
//!
//! The `presentation` module drives one proof exchange from the verifier's
//! side:
//!
//! ```text
//! RequestPrepared -> RequestSent -> PresentationReceived -> Accepted | Undefined
//! ```
//!
//! The protocol terminal state and the truth value of the proof are distinct:
//! a presentation that fails verification completes the exchange on
//! `Undefined` with a recorded `false` result, and is never a transport
//! error.

pub mod types;

mod exchange;
pub use exchange::ProofExchange;

mod usecase;
pub use usecase::Usecase;
