//! The `scheduler` module replaces ad-hoc sleep-and-retry loops with one
//! suspend-at-boundary polling driver. Any of the three protocol usecases
//! plugs in through [`types::Pollable`]; cancellation and backoff live here,
//! not in caller code.

pub mod types;

mod scheduler;
pub use scheduler::PollingScheduler;
