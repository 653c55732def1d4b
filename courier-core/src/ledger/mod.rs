//! The `ledger` module defines the contract of the distributed ledger this
//! core writes schemas and credential definitions to. Consensus, genesis
//! material and wallet signing all live behind the [`types::LedgerClient`]
//! trait; the only entity owned here is the transaction author agreement
//! acceptance record

pub mod types;

mod agreement;
pub use agreement::AgreementAcceptance;
