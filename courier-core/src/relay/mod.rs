//! The `relay` module defines the contract of the store-and-forward message
//! relay both peers poll. The transport itself is an external collaborator;
//! this core only consumes the [`types::RelayClient`] trait

pub mod types;
