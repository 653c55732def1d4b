use std::collections::BTreeMap;
use std::fmt::Debug;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

use rstdev_domain::entity::ToJSON;

use crate::agent::connection::types::ConnectionID;
use crate::agent::connection::Connection;
use crate::agent::types::ExchangeID;
use crate::ledger::types::{CredentialDefinitionRef, SchemaRef, SchemaSpec};
use crate::ledger::AgreementAcceptance;
use crate::relay::types::ChannelID;

/// `IssuanceError` is a base error types for the `issuance` domain
#[derive(Debug, PartialEq, Error, Serialize, Deserialize, Clone)]
#[serde(crate = "self::serde")]
pub enum IssuanceError {
    #[error("invalid attributes: {0}")]
    InvalidAttributes(String),

    #[error("connection not ready: {0}")]
    ConnectionNotReady(String),

    #[error("transaction author agreement not accepted")]
    AgreementNotAccepted,

    #[error("illegal transition from state: {from:?}")]
    IllegalTransition { from: State },

    #[error("relay unavailable: {0}")]
    RelayUnavailable(String),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("entity error: {0}")]
    EntityError(String),

    #[error("exchange not found: {0}")]
    NotFound(String),
}

/// State represents one issuance flow from the issuer's side
///
/// Rejection by the counterparty at any point lands on [`State::Undefined`];
/// there is no automatic retry, a caller starts over with a fresh offer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub enum State {
    OfferPrepared,
    OfferSent,
    RequestReceived,
    CredentialSent,
    Accepted,
    Undefined,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Accepted | State::Undefined)
    }
}

/// `CredentialExchangeEntityAccessor` is a special trait used to access the
/// credential exchange entity property fields
pub trait CredentialExchangeEntityAccessor:
    Clone + Debug + ToJSON + TryInto<Vec<u8>> + TryFrom<Vec<u8>>
{
    fn get_id(&self) -> ExchangeID;
    fn get_connection_id(&self) -> ConnectionID;
    fn get_channel(&self) -> ChannelID;
    fn get_attributes(&self) -> BTreeMap<String, String>;
    fn get_cred_def(&self) -> CredentialDefinitionRef;
    fn get_state(&self) -> State;
    fn is_rejected(&self) -> bool;
    fn get_reject_reason(&self) -> Option<String>;
    fn get_created_at(&self) -> DateTime<Utc>;
    fn get_updated_at(&self) -> DateTime<Utc>;
}

/// `IssuanceAPI` is the main entrypoint to the `issuance` domain
///
/// The ledger-write preconditions live here next to the offer operations
/// because an offer against a ledger that enforces the transaction author
/// agreement cannot be published before acceptance
#[async_trait]
pub trait IssuanceAPI: Clone {
    type EntityAccessor: CredentialExchangeEntityAccessor;

    /// Fetch the transaction author agreement, submit acceptance with the
    /// first advertised mechanism and persist the record. Returns `None`
    /// when the target ledger enforces no agreement
    async fn accept_agreement(&self) -> Result<Option<AgreementAcceptance>, IssuanceError>;

    /// Register a schema on the ledger. Requires a covering acceptance
    /// record when the ledger enforces the agreement
    async fn register_schema(&self, spec: SchemaSpec) -> Result<SchemaRef, IssuanceError>;

    /// Register a credential definition on the ledger. Same acceptance
    /// requirement as [`IssuanceAPI::register_schema`]
    async fn register_credential_definition(
        &self,
        schema_ref: SchemaRef,
        tag: String,
    ) -> Result<CredentialDefinitionRef, IssuanceError>;

    /// Assemble a new exchange in `OfferPrepared`. Fails with
    /// [`IssuanceError::InvalidAttributes`] on an empty attribute map and
    /// with [`IssuanceError::ConnectionNotReady`] unless the connection is
    /// accepted. The attribute map is immutable from here on
    async fn prepare_offer(
        &self,
        connection: &Connection,
        attributes: BTreeMap<String, String>,
        cred_def: CredentialDefinitionRef,
    ) -> Result<Self::EntityAccessor, IssuanceError>;

    /// Publish the offer. Valid only from `OfferPrepared`; performs the
    /// agreement check against the ledger first
    async fn send_offer(
        &self,
        exchange: Self::EntityAccessor,
    ) -> Result<Self::EntityAccessor, IssuanceError>;

    /// Poll the relay once and fold any pending message into the exchange.
    /// A terminal exchange is returned unchanged
    async fn update_state(
        &self,
        exchange: Self::EntityAccessor,
    ) -> Result<Self::EntityAccessor, IssuanceError>;

    /// Publish the signed credential. Valid only from `RequestReceived`
    async fn issue(
        &self,
        exchange: Self::EntityAccessor,
    ) -> Result<Self::EntityAccessor, IssuanceError>;

    fn is_terminal(&self, exchange: &Self::EntityAccessor) -> bool;

    async fn get_exchange(&self, id: ExchangeID) -> Result<Self::EntityAccessor, IssuanceError>;
}

/// `RepoExchangeBuilder` is a `CredentialExchange Repository` abstraction by
/// implementing repository pattern
#[async_trait]
pub trait RepoExchangeBuilder: Clone + Sync + Send {
    type EntityAccessor: CredentialExchangeEntityAccessor;

    async fn save(&self, exchange: &Self::EntityAccessor) -> Result<(), IssuanceError>;

    async fn get_exchange(&self, id: ExchangeID) -> Result<Self::EntityAccessor, IssuanceError>;
}

/// `RepoAgreementBuilder` persists the transaction author agreement
/// acceptance record for the current ledger-write session
#[async_trait]
pub trait RepoAgreementBuilder: Clone + Sync + Send {
    async fn save_acceptance(
        &self,
        acceptance: &AgreementAcceptance,
    ) -> Result<(), IssuanceError>;

    async fn get_acceptance(&self) -> Result<Option<AgreementAcceptance>, IssuanceError>;
}

/// `UsecaseBuilder` is a trait behavior that provides base application
/// logic's handlers
pub trait UsecaseBuilder<TEntityAccessor>: IssuanceAPI<EntityAccessor = TEntityAccessor>
where
    TEntityAccessor: CredentialExchangeEntityAccessor,
{
    type RepoExchangeImplementer: RepoExchangeBuilder<EntityAccessor = TEntityAccessor>;
    type RepoAgreementImplementer: RepoAgreementBuilder;
    type RelayImplementer: crate::relay::types::RelayClient;
    type LedgerImplementer: crate::ledger::types::LedgerClient;

    fn repo_exchange(&self) -> Self::RepoExchangeImplementer;
    fn repo_agreement(&self) -> Self::RepoAgreementImplementer;
    fn relay(&self) -> Self::RelayImplementer;
    fn ledger(&self) -> Self::LedgerImplementer;
}
