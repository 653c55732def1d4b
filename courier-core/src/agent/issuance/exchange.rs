use std::collections::{BTreeMap, BTreeSet};

use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use crate::agent::connection::types::{ConnectionEntityAccessor, ConnectionID};
use crate::agent::connection::Connection;
use crate::agent::types::ExchangeID;
use crate::ledger::types::CredentialDefinitionRef;
use crate::relay::types::{ChannelID, MessageID, MessageKind, RelayMessage};

use super::types::{CredentialExchangeEntityAccessor, IssuanceError, State};

/// `CredentialExchange` represents one issuance flow scoped to a connection
///
/// The attribute mapping is fixed at construction: once the offer is out,
/// the counterparty requests and accepts exactly what was offered. State
/// moves only through [`CredentialExchange::advance`] and the explicit
/// operations in the usecase layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct CredentialExchange {
    id: ExchangeID,
    connection_id: ConnectionID,
    channel: ChannelID,
    attributes: BTreeMap<String, String>,
    cred_def: CredentialDefinitionRef,
    state: State,
    rejected: bool,
    reject_reason: Option<String>,
    consumed: BTreeSet<MessageID>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CredentialExchange {
    pub fn builder() -> CredentialExchangeBuilder {
        CredentialExchangeBuilder::new()
    }

    pub fn update_state(&mut self, state: State) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Folds pending relay messages into the exchange
    ///
    /// Same contract as the connection fold: pure, consume-only, at most one
    /// state-advancing message per call, replayed or out-of-order messages
    /// for a terminal exchange are no-ops
    pub fn advance(&self, messages: &[RelayMessage]) -> CredentialExchange {
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
                (State::OfferSent, MessageKind::CredentialRequest) => {
                    next.consumed.insert(message.get_id());
                    next.update_state(State::RequestReceived);
                    break;
                }
                (State::CredentialSent, MessageKind::CredentialAck) => {
                    next.consumed.insert(message.get_id());
                    next.update_state(State::Accepted);
                    break;
                }
                (_, MessageKind::ProblemReport) => {
                    next.rejected = true;
                    next.reject_reason = message.reason();
                    next.consumed.insert(message.get_id());
                    next.update_state(State::Undefined);
                    break;
                }
                _ => {}
            }
        }

        next
    }
}

impl CredentialExchangeEntityAccessor for CredentialExchange {
    fn get_id(&self) -> ExchangeID {
        self.id.clone()
    }

    fn get_connection_id(&self) -> ConnectionID {
        self.connection_id.clone()
    }

    fn get_channel(&self) -> ChannelID {
        self.channel.clone()
    }

    fn get_attributes(&self) -> BTreeMap<String, String> {
        self.attributes.clone()
    }

    fn get_cred_def(&self) -> CredentialDefinitionRef {
        self.cred_def.clone()
    }

    fn get_state(&self) -> State {
        self.state.clone()
    }

    fn is_rejected(&self) -> bool {
        self.rejected
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

impl ToJSON for CredentialExchange {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}

impl TryInto<Vec<u8>> for CredentialExchange {
    type Error = IssuanceError;

    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec(&self).map_err(|err| IssuanceError::EntityError(err.to_string()))
    }
}

impl TryFrom<Vec<u8>> for CredentialExchange {
    type Error = IssuanceError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        serde_json::from_slice(&bytes).map_err(|err| IssuanceError::EntityError(err.to_string()))
    }
}

/// `CredentialExchangeBuilder` assembles a fresh exchange in
/// [`State::OfferPrepared`], bound to an accepted connection
#[derive(Debug, Default)]
pub struct CredentialExchangeBuilder {
    id: Option<ExchangeID>,
    connection: Option<(ConnectionID, ChannelID)>,
    attributes: Option<BTreeMap<String, String>>,
    cred_def: Option<CredentialDefinitionRef>,
}

impl CredentialExchangeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: ExchangeID) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_connection(mut self, connection: &Connection) -> Self {
        self.connection = Some((connection.get_id(), connection.get_channel()));
        self
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_cred_def(mut self, cred_def: CredentialDefinitionRef) -> Self {
        self.cred_def = Some(cred_def);
        self
    }

    pub fn build(self) -> Result<CredentialExchange, IssuanceError> {
        let (connection_id, channel) = self.connection.ok_or_else(|| {
            IssuanceError::EntityError("connection is required".to_string())
        })?;

        let attributes = self.attributes.ok_or_else(|| {
            IssuanceError::InvalidAttributes("attributes are required".to_string())
        })?;

        if attributes.is_empty() {
            return Err(IssuanceError::InvalidAttributes(
                "attribute mapping must not be empty".to_string(),
            ));
        }

        let cred_def = self.cred_def.ok_or_else(|| {
            IssuanceError::EntityError("credential definition is required".to_string())
        })?;

        let now = Utc::now();

        Ok(CredentialExchange {
            id: self.id.unwrap_or_else(ExchangeID::generate),
            connection_id,
            channel,
            attributes,
            cred_def,
            state: State::OfferPrepared,
            rejected: false,
            reject_reason: None,
            consumed: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        })
    }
}
