use derive_more::{AsRef, From, Into};
use the_newtype::Newtype;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::standard::uuid::Uuid;
use rst_common::with_errors::thiserror::{self, Error};

/// `RelayError` is a base error types for the relay collaborator
///
/// The relay is a consumed capability. Any failure talking to it must be
/// surfaced to the caller, never swallowed
#[derive(Debug, PartialEq, Error, Serialize, Deserialize, Clone)]
#[serde(crate = "self::serde")]
pub enum RelayError {
    #[error("relay unavailable: {0}")]
    Unavailable(String),

    #[error("malformed relay message: {0}")]
    MalformedMessage(String),
}

/// Unique identifier of a pairwise relay channel
///
/// Exactly two parties share a channel. The relay must deliver messages
/// for one channel in send order; no ordering holds across channels
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Newtype, From, Into, AsRef)]
#[serde(crate = "self::serde")]
pub struct ChannelID(String);

impl ChannelID {
    /// Generate a new unique channel ID
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

/// Unique identifier of a single relay message
///
/// The relay delivers at-least-once and its `poll` is restartable, so
/// already-consumed messages may come back. Consumers de-duplicate by this id
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Newtype,
    From,
    Into,
    AsRef,
)]
#[serde(crate = "self::serde")]
pub struct MessageID(String);

impl MessageID {
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

/// `MessageKind` enumerates the protocol messages the three state machines
/// publish and consume over a pairwise channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub enum MessageKind {
    Invitation,
    ConnectionRequest,
    ConnectionResponse,
    ConnectionAck,
    Ping,
    PingResponse,
    CredentialOffer,
    CredentialRequest,
    Credential,
    CredentialAck,
    ProofRequest,
    Presentation,
    /// Counterparty rejection at any protocol step. Carries a
    /// human-inspectable reason under the `explain` payload key
    ProblemReport,
}

/// `RelayMessage` is the envelope every protocol message travels in
///
/// The payload stays an opaque [`Value`]: the wire bytes of credentials and
/// proofs belong to the wallet subsystem, not to this core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct RelayMessage {
    id: MessageID,
    channel: ChannelID,
    kind: MessageKind,
    payload: Value,
    sent_at: DateTime<Utc>,
}

impl RelayMessage {
    pub fn new(channel: ChannelID, kind: MessageKind, payload: Value) -> Self {
        Self {
            id: MessageID::generate(),
            channel,
            kind,
            payload,
            sent_at: Utc::now(),
        }
    }

    pub fn get_id(&self) -> MessageID {
        self.id.clone()
    }

    pub fn get_channel(&self) -> ChannelID {
        self.channel.clone()
    }

    pub fn get_kind(&self) -> MessageKind {
        self.kind.clone()
    }

    pub fn get_payload(&self) -> Value {
        self.payload.clone()
    }

    pub fn get_sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    /// Human-inspectable reason carried by a [`MessageKind::ProblemReport`]
    pub fn reason(&self) -> Option<String> {
        self.payload
            .get("explain")
            .and_then(|explain| explain.as_str())
            .map(|explain| explain.to_string())
    }
}

/// `RelayClient` is the consumed store-and-forward transport
///
/// Neither peer can call the other directly; all interaction happens by each
/// side publishing to and polling from the relay. `poll` produces the pending
/// messages for one channel and is restartable: repeated polls may re-return
/// messages a consumer already folded, so consumers must de-duplicate by
/// [`MessageID`]
#[async_trait]
pub trait RelayClient: Clone + Send + Sync {
    async fn publish(&self, channel: ChannelID, message: RelayMessage) -> Result<(), RelayError>;

    async fn poll(&self, channel: ChannelID) -> Result<Vec<RelayMessage>, RelayError>;
}
