use std::collections::BTreeSet;

use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;
use rst_common::standard::serde_json::Value;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use crate::agent::types::AgentProfile;
use crate::relay::types::{ChannelID, MessageID, MessageKind, RelayMessage};

use super::types::{Alias, ConnectionEntityAccessor, ConnectionError, ConnectionID, Invitation, State};

/// `Connection` represents a pairwise relationship with one counterparty
///
/// The entity is the folded view of every handshake message consumed so far.
/// All mutation goes through [`Connection::advance`] (consume-only, replay
/// safe) and [`Connection::update_state`]; the surrounding usecase performs
/// the outbound publishes a transition requires.
///
/// Pairwise-DID material arrives inside the counterparty's connection
/// request and stays opaque to this core: key management belongs to the
/// wallet subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Connection {
    id: ConnectionID,
    alias: Alias,
    channel: ChannelID,
    invitation: Invitation,
    pairwise: Option<Value>,
    state: State,
    reject_reason: Option<String>,
    consumed: BTreeSet<MessageID>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Updates the connection state and refreshes the updated timestamp
    pub fn update_state(&mut self, state: State) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Folds pending relay messages into the connection
    ///
    /// Pure and consume-only: at most one state-advancing message is applied
    /// per call, in delivery order. Messages for another channel, messages
    /// already consumed, and anything arriving once the connection is
    /// terminal are ignored, so duplicate or replayed delivery can never
    /// regress or re-apply state
    pub fn advance(&self, messages: &[RelayMessage]) -> Connection {
        let mut next = self.clone();
        if next.state.is_terminal() {
            return next;
        }

        for message in messages {
            if message.get_channel() != next.channel {
                continue;
            }

            if next.consumed.contains(&message.get_id()) {
                continue;
            }

            match (next.state.clone(), message.get_kind()) {
                (State::InviteSent, MessageKind::ConnectionRequest) => {
                    next.pairwise = Some(message.get_payload());
                    next.consumed.insert(message.get_id());
                    next.update_state(State::RequestReceived);
                    break;
                }
                (
                    State::RequestReceived | State::ResponseSent,
                    MessageKind::ConnectionAck,
                ) => {
                    next.consumed.insert(message.get_id());
                    next.update_state(State::Accepted);
                    break;
                }
                (_, MessageKind::ProblemReport) => {
                    next.reject_reason = message.reason();
                    next.consumed.insert(message.get_id());
                    next.update_state(State::Undefined);
                    break;
                }
                (_, MessageKind::PingResponse) => {
                    // non-advancing, consumed so a replay stays a no-op
                    next.consumed.insert(message.get_id());
                }
                _ => {}
            }
        }

        next
    }
}

impl ConnectionEntityAccessor for Connection {
    fn get_id(&self) -> ConnectionID {
        self.id.clone()
    }

    fn get_alias(&self) -> Alias {
        self.alias.clone()
    }

    fn get_channel(&self) -> ChannelID {
        self.channel.clone()
    }

    fn get_invitation(&self) -> Invitation {
        self.invitation.clone()
    }

    fn get_pairwise(&self) -> Option<Value> {
        self.pairwise.clone()
    }

    fn get_state(&self) -> State {
        self.state.clone()
    }

    fn get_reject_reason(&self) -> Option<String> {
        self.reject_reason.clone()
    }

    fn get_created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn get_updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl ToJSON for Connection {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}

impl TryInto<Vec<u8>> for Connection {
    type Error = ConnectionError;

    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec(&self).map_err(|err| ConnectionError::EntityError(err.to_string()))
    }
}

impl TryFrom<Vec<u8>> for Connection {
    type Error = ConnectionError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        serde_json::from_slice(&bytes).map_err(|err| ConnectionError::EntityError(err.to_string()))
    }
}

/// `ConnectionBuilder` assembles a fresh connection in [`State::Initial`]
///
/// The invitation is derived from the caller's [`AgentProfile`]; channel and
/// id are generated unless provided (tests pin them for determinism)
#[derive(Debug, Default)]
pub struct ConnectionBuilder {
    id: Option<ConnectionID>,
    alias: Option<Alias>,
    channel: Option<ChannelID>,
    profile: Option<AgentProfile>,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: ConnectionID) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_alias(mut self, alias: Alias) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn with_channel(mut self, channel: ChannelID) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_profile(mut self, profile: AgentProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn build(self) -> Result<Connection, ConnectionError> {
        let alias = self
            .alias
            .ok_or_else(|| ConnectionError::InvalidAlias("alias is required".to_string()))?;

        Alias::validate(alias.as_ref())?;

        let profile = self.profile.ok_or_else(|| {
            ConnectionError::EntityError("agent profile is required".to_string())
        })?;

        let channel = self.channel.unwrap_or_else(ChannelID::generate);
        let invitation = Invitation::new(&profile, channel.clone());
        let now = Utc::now();

        Ok(Connection {
            id: self.id.unwrap_or_else(ConnectionID::generate),
            alias,
            channel,
            invitation,
            pairwise: None,
            state: State::Initial,
            reject_reason: None,
            consumed: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        })
    }
}
