use std::fmt::Debug;

use derive_more::{AsRef, From, Into};
use the_newtype::Newtype;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::standard::uuid::Uuid;
use rst_common::with_errors::thiserror::{self, Error};

use rstdev_domain::entity::ToJSON;

use crate::agent::types::AgentProfile;
use crate::relay::types::ChannelID;

/// `ConnectionError` is a base error types for the `connection` domain
#[derive(Debug, PartialEq, Error, Serialize, Deserialize, Clone)]
#[serde(crate = "self::serde")]
pub enum ConnectionError {
    #[error("invalid alias: {0}")]
    InvalidAlias(String),

    #[error("illegal transition from state: {from:?}")]
    IllegalTransition { from: State },

    #[error("relay unavailable: {0}")]
    RelayUnavailable(String),

    #[error("entity error: {0}")]
    EntityError(String),

    #[error("connection not found: {0}")]
    NotFound(String),
}

/// State represents the handshake progress with one counterparty
///
/// A fresh entity starts at [`State::Initial`] and moves to
/// [`State::InviteSent`] once the invitation is published. The counterparty's
/// connection request moves it to [`State::RequestReceived`], publishing the
/// response records [`State::ResponseSent`], and the counterparty's
/// acknowledgement lands it on [`State::Accepted`]. A problem report at any
/// point ends on [`State::Undefined`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub enum State {
    Initial,
    InviteSent,
    RequestReceived,
    ResponseSent,
    Accepted,
    Undefined,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Accepted | State::Undefined)
    }
}

/// Unique identifier for a connection entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Newtype, From, Into, AsRef)]
#[serde(crate = "self::serde")]
pub struct ConnectionID(String);

impl ConnectionID {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_validated(id: String) -> Self {
        Self(id)
    }

    pub fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Counterparty alias chosen by the caller, e.g. `alice`
///
/// At most one live (non-terminal) connection may exist per alias
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Newtype, From, Into, AsRef)]
#[serde(crate = "self::serde")]
pub struct Alias(String);

impl Alias {
    pub fn validate(alias: &str) -> Result<(), ConnectionError> {
        if alias.trim().is_empty() {
            return Err(ConnectionError::InvalidAlias(
                "alias must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn from_validated(alias: String) -> Self {
        Self(alias)
    }

    pub fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `Invitation` is the payload published to open the handshake
///
/// It carries the inviter's profile so the counterparty can render who is
/// asking, plus the pairwise channel the rest of the handshake runs on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Invitation {
    id: String,
    label: String,
    logo_url: Option<String>,
    channel: ChannelID,
}

impl Invitation {
    pub fn new(profile: &AgentProfile, channel: ChannelID) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: profile.get_name().to_owned(),
            logo_url: profile.get_logo_url(),
            channel,
        }
    }

    pub fn get_id(&self) -> &String {
        &self.id
    }

    pub fn get_label(&self) -> &String {
        &self.label
    }

    pub fn get_logo_url(&self) -> Option<String> {
        self.logo_url.clone()
    }

    pub fn get_channel(&self) -> ChannelID {
        self.channel.clone()
    }
}

/// `ConnectionEntityAccessor` is a special trait used to access the main
/// connection entity property fields without exposing them to direct
/// manipulation from outside
pub trait ConnectionEntityAccessor:
    Clone + Debug + ToJSON + TryInto<Vec<u8>> + TryFrom<Vec<u8>>
{
    fn get_id(&self) -> ConnectionID;
    fn get_alias(&self) -> Alias;
    fn get_channel(&self) -> ChannelID;
    fn get_invitation(&self) -> Invitation;
    fn get_pairwise(&self) -> Option<Value>;
    fn get_state(&self) -> State;
    fn get_reject_reason(&self) -> Option<String>;
    fn get_created_at(&self) -> DateTime<Utc>;
    fn get_updated_at(&self) -> DateTime<Utc>;
}

/// `ConnectionAPI` is the main entrypoint to the `connection` domain
///
/// `create_invite` and the transitions inside `update_state` publish the
/// connection's outbound messages; the entity-level fold only consumes
#[async_trait]
pub trait ConnectionAPI: Clone {
    type EntityAccessor: ConnectionEntityAccessor;

    /// Open the handshake towards a new counterparty. Fails with
    /// [`ConnectionError::InvalidAlias`] when the alias is empty or already
    /// bound to a live connection
    async fn create_invite(&self, alias: Alias) -> Result<Self::EntityAccessor, ConnectionError>;

    /// Poll the relay once and fold any pending handshake message into the
    /// connection. Entering `RequestReceived` publishes the connection
    /// response. A terminal connection is returned unchanged
    async fn update_state(
        &self,
        connection: Self::EntityAccessor,
    ) -> Result<Self::EntityAccessor, ConnectionError>;

    /// Publish a trust ping over an accepted connection. The counterparty's
    /// ping response is consumed by the fold without advancing state
    async fn send_ping(&self, connection: &Self::EntityAccessor) -> Result<(), ConnectionError>;

    fn is_terminal(&self, connection: &Self::EntityAccessor) -> bool;

    async fn get_connection(
        &self,
        id: ConnectionID,
    ) -> Result<Self::EntityAccessor, ConnectionError>;

    async fn list_connections(
        &self,
        state: Option<State>,
    ) -> Result<Vec<Self::EntityAccessor>, ConnectionError>;
}

/// `RepoBuilder` is a `Connection Repository` abstraction by implementing
/// repository pattern
#[async_trait]
pub trait RepoBuilder: Clone + Sync + Send {
    type EntityAccessor: ConnectionEntityAccessor;

    async fn save(&self, connection: &Self::EntityAccessor) -> Result<(), ConnectionError>;

    async fn get_connection(
        &self,
        id: ConnectionID,
    ) -> Result<Self::EntityAccessor, ConnectionError>;

    /// Load the live (non-terminal) connection bound to the alias, if any.
    /// Backs the at-most-one-live-connection-per-alias invariant
    async fn find_live_by_alias(
        &self,
        alias: Alias,
    ) -> Result<Option<Self::EntityAccessor>, ConnectionError>;

    async fn list_by_state(
        &self,
        state: Option<State>,
    ) -> Result<Vec<Self::EntityAccessor>, ConnectionError>;
}

/// `UsecaseBuilder` is a trait behavior that provides base application
/// logic's handlers
pub trait UsecaseBuilder<TEntityAccessor>: ConnectionAPI<EntityAccessor = TEntityAccessor>
where
    TEntityAccessor: ConnectionEntityAccessor,
{
    type RepoImplementer: RepoBuilder<EntityAccessor = TEntityAccessor>;
    type RelayImplementer: crate::relay::types::RelayClient;

    fn repo(&self) -> Self::RepoImplementer;
    fn relay(&self) -> Self::RelayImplementer;
    fn profile(&self) -> AgentProfile;
}
