use std::fmt::Debug;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::with_errors::thiserror::{self, Error};

use rstdev_domain::entity::ToJSON;

use crate::agent::connection::types::ConnectionID;
use crate::agent::connection::Connection;
use crate::agent::types::ExchangeID;
use crate::ledger::types::CredentialDefinitionRef;
use crate::relay::types::ChannelID;

/// `PresentationError` is a base error types for the `presentation` domain
#[derive(Debug, PartialEq, Error, Serialize, Deserialize, Clone)]
#[serde(crate = "self::serde")]
pub enum PresentationError {
    #[error("invalid predicates: {0}")]
    InvalidPredicates(String),

    #[error("connection not ready: {0}")]
    ConnectionNotReady(String),

    #[error("illegal transition from state: {from:?}")]
    IllegalTransition { from: State },

    #[error("relay unavailable: {0}")]
    RelayUnavailable(String),

    #[error("verification error: {0}")]
    VerificationError(String),

    #[error("entity error: {0}")]
    EntityError(String),

    #[error("exchange not found: {0}")]
    NotFound(String),
}

/// State represents one proof exchange from the verifier's side
///
/// `Accepted` means the exchange completed AND the presentation verified.
/// `Undefined` covers both a counterparty rejection (no verification result)
/// and a presentation that failed verification (result `false`); callers
/// must inspect the terminal state and the recorded result separately
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub enum State {
    RequestPrepared,
    RequestSent,
    PresentationReceived,
    Accepted,
    Undefined,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Accepted | State::Undefined)
    }
}

/// `Restriction` narrows which credentials may answer a predicate, e.g. the
/// identity of the issuer that signed them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(crate = "self::serde")]
pub struct Restriction {
    issuer_did: Option<String>,
    cred_def: Option<CredentialDefinitionRef>,
}

impl Restriction {
    pub fn issuer(did: String) -> Self {
        Self {
            issuer_did: Some(did),
            cred_def: None,
        }
    }

    pub fn cred_def(cred_def: CredentialDefinitionRef) -> Self {
        Self {
            issuer_did: None,
            cred_def: Some(cred_def),
        }
    }

    pub fn get_issuer_did(&self) -> Option<String> {
        self.issuer_did.clone()
    }

    pub fn get_cred_def(&self) -> Option<CredentialDefinitionRef> {
        self.cred_def.clone()
    }
}

/// `Predicate` is one requested disclosure: a single attribute name or a
/// group of names that must come from the same credential, plus the
/// restrictions answering credentials must satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Predicate {
    names: Vec<String>,
    restrictions: Vec<Restriction>,
}

impl Predicate {
    pub fn single(name: String, restrictions: Vec<Restriction>) -> Self {
        Self {
            names: vec![name],
            restrictions,
        }
    }

    pub fn group(names: Vec<String>, restrictions: Vec<Restriction>) -> Self {
        Self {
            names,
            restrictions,
        }
    }

    pub fn get_names(&self) -> &Vec<String> {
        &self.names
    }

    pub fn get_restrictions(&self) -> &Vec<Restriction> {
        &self.restrictions
    }
}

/// `ProofExchangeEntityAccessor` is a special trait used to access the proof
/// exchange entity property fields
pub trait ProofExchangeEntityAccessor:
    Clone + Debug + ToJSON + TryInto<Vec<u8>> + TryFrom<Vec<u8>>
{
    fn get_id(&self) -> ExchangeID;
    fn get_connection_id(&self) -> ConnectionID;
    fn get_channel(&self) -> ChannelID;
    fn get_predicates(&self) -> Vec<Predicate>;
    fn get_presentation(&self) -> Option<Value>;
    fn get_verification(&self) -> Option<bool>;
    fn get_state(&self) -> State;
    fn get_reject_reason(&self) -> Option<String>;
    fn get_created_at(&self) -> DateTime<Utc>;
    fn get_updated_at(&self) -> DateTime<Utc>;
}

/// `PresentationVerifier` is the consumed verification capability
///
/// Verification is local and deterministic; the cryptographic mechanics live
/// in the wallet subsystem behind this trait. A `false` result is a protocol
/// outcome, not an error
pub trait PresentationVerifier: Clone + Send + Sync {
    fn verify(
        &self,
        presentation: &Value,
        predicates: &[Predicate],
    ) -> Result<bool, PresentationError>;
}

/// `PresentationAPI` is the main entrypoint to the `presentation` domain
#[async_trait]
pub trait PresentationAPI: Clone {
    type EntityAccessor: ProofExchangeEntityAccessor;

    /// Assemble a new exchange in `RequestPrepared`. Fails with
    /// [`PresentationError::InvalidPredicates`] on an empty predicate
    /// sequence and with [`PresentationError::ConnectionNotReady`] unless
    /// the connection is accepted
    async fn prepare_request(
        &self,
        connection: &Connection,
        predicates: Vec<Predicate>,
    ) -> Result<Self::EntityAccessor, PresentationError>;

    /// Publish the proof request. Valid only from `RequestPrepared`
    async fn send_request(
        &self,
        exchange: Self::EntityAccessor,
    ) -> Result<Self::EntityAccessor, PresentationError>;

    /// Poll the relay once and fold any pending message into the exchange.
    /// Receiving the presentation triggers local verification and records
    /// the boolean result before the terminal move
    async fn update_state(
        &self,
        exchange: Self::EntityAccessor,
    ) -> Result<Self::EntityAccessor, PresentationError>;

    fn is_terminal(&self, exchange: &Self::EntityAccessor) -> bool;

    async fn get_exchange(
        &self,
        id: ExchangeID,
    ) -> Result<Self::EntityAccessor, PresentationError>;
}

/// `RepoBuilder` is a `ProofExchange Repository` abstraction by implementing
/// repository pattern
#[async_trait]
pub trait RepoBuilder: Clone + Sync + Send {
    type EntityAccessor: ProofExchangeEntityAccessor;

    async fn save(&self, exchange: &Self::EntityAccessor) -> Result<(), PresentationError>;

    async fn get_exchange(
        &self,
        id: ExchangeID,
    ) -> Result<Self::EntityAccessor, PresentationError>;
}

/// `UsecaseBuilder` is a trait behavior that provides base application
/// logic's handlers
pub trait UsecaseBuilder<TEntityAccessor>: PresentationAPI<EntityAccessor = TEntityAccessor>
where
    TEntityAccessor: ProofExchangeEntityAccessor,
{
    type RepoImplementer: RepoBuilder<EntityAccessor = TEntityAccessor>;
    type RelayImplementer: crate::relay::types::RelayClient;
    type VerifierImplementer: PresentationVerifier;

    fn repo(&self) -> Self::RepoImplementer;
    fn relay(&self) -> Self::RelayImplementer;
    fn verifier(&self) -> Self::VerifierImplementer;
}
