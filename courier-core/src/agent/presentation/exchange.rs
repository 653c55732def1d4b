use std::collections::BTreeSet;

use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;
use rst_common::standard::serde_json::Value;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use crate::agent::connection::types::{ConnectionEntityAccessor, ConnectionID};
use crate::agent::connection::Connection;
use crate::agent::types::ExchangeID;
use crate::relay::types::{ChannelID, MessageID, MessageKind, RelayMessage};

use super::types::{Predicate, PresentationError, ProofExchangeEntityAccessor, State};

/// `ProofExchange` represents one verification flow scoped to a connection
///
/// The protocol terminal state and the truth value of the proof are stored
/// separately: `verification` is only meaningful once the state is terminal,
/// and stays `None` when the counterparty rejected before presenting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ProofExchange {
    id: ExchangeID,
    connection_id: ConnectionID,
    channel: ChannelID,
    predicates: Vec<Predicate>,
    presentation: Option<Value>,
    verification: Option<bool>,
    state: State,
    reject_reason: Option<String>,
    consumed: BTreeSet<MessageID>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProofExchange {
    pub fn builder() -> ProofExchangeBuilder {
        ProofExchangeBuilder::new()
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
    /// A presentation lands the exchange on the intermediate
    /// [`State::PresentationReceived`]; the usecase layer runs the verifier
    /// and finalizes through [`ProofExchange::record_verification`]. The
    /// fold itself stays pure and consume-only
    pub fn advance(&self, messages: &[RelayMessage]) -> ProofExchange {
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
                (State::RequestSent, MessageKind::Presentation) => {
                    next.presentation = Some(message.get_payload());
                    next.consumed.insert(message.get_id());
                    next.update_state(State::PresentationReceived);
                    break;
                }
                (_, MessageKind::ProblemReport) => {
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

    /// Record the verifier's verdict and move to the terminal state:
    /// `true` lands on `Accepted`, `false` on `Undefined`. A failed
    /// verification is a completed exchange, not a transport error
    pub fn record_verification(&mut self, verified: bool) {
        self.verification = Some(verified);
        match verified {
            true => self.update_state(State::Accepted),
            false => self.update_state(State::Undefined),
        }
    }
}

impl ProofExchangeEntityAccessor for ProofExchange {
    fn get_id(&self) -> ExchangeID {
        self.id.clone()
    }

    fn get_connection_id(&self) -> ConnectionID {
        self.connection_id.clone()
    }

    fn get_channel(&self) -> ChannelID {
        self.channel.clone()
    }

    fn get_predicates(&self) -> Vec<Predicate> {
        self.predicates.clone()
    }

    fn get_presentation(&self) -> Option<Value> {
        self.presentation.clone()
    }

    fn get_verification(&self) -> Option<bool> {
        self.verification
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

impl ToJSON for ProofExchange {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}

impl TryInto<Vec<u8>> for ProofExchange {
    type Error = PresentationError;

    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec(&self).map_err(|err| PresentationError::EntityError(err.to_string()))
    }
}

impl TryFrom<Vec<u8>> for ProofExchange {
    type Error = PresentationError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        serde_json::from_slice(&bytes)
            .map_err(|err| PresentationError::EntityError(err.to_string()))
    }
}

/// `ProofExchangeBuilder` assembles a fresh exchange in
/// [`State::RequestPrepared`], bound to an accepted connection
#[derive(Debug, Default)]
pub struct ProofExchangeBuilder {
    id: Option<ExchangeID>,
    connection: Option<(ConnectionID, ChannelID)>,
    predicates: Option<Vec<Predicate>>,
}

impl ProofExchangeBuilder {
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

    pub fn with_predicates(mut self, predicates: Vec<Predicate>) -> Self {
        self.predicates = Some(predicates);
        self
    }

    pub fn build(self) -> Result<ProofExchange, PresentationError> {
        let (connection_id, channel) = self.connection.ok_or_else(|| {
            PresentationError::EntityError("connection is required".to_string())
        })?;

        let predicates = self.predicates.ok_or_else(|| {
            PresentationError::InvalidPredicates("predicates are required".to_string())
        })?;

        if predicates.is_empty() {
            return Err(PresentationError::InvalidPredicates(
                "predicate sequence must not be empty".to_string(),
            ));
        }

        let now = Utc::now();

        Ok(ProofExchange {
            id: self.id.unwrap_or_else(ExchangeID::generate),
            connection_id,
            channel,
            predicates,
            presentation: None,
            verification: None,
            state: State::RequestPrepared,
            reject_reason: None,
            consumed: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        })
    }
}
