use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json::json;
use rst_common::with_logging::log::debug;

use crate::agent::connection::types::{
    ConnectionEntityAccessor, State as ConnectionState,
};
use crate::agent::connection::Connection;
use crate::agent::types::ExchangeID;
use crate::relay::types::{MessageKind, RelayClient, RelayMessage};
use crate::scheduler::types::Pollable;

use super::exchange::ProofExchange;
use super::types::{
    Predicate, PresentationAPI, PresentationError, PresentationVerifier,
    ProofExchangeEntityAccessor, RepoBuilder, State, UsecaseBuilder,
};

/// `Usecase` is the proof exchange state machine over its collaborators: a
/// persistence repository, the relay transport and the local verifier
/// capability
#[derive(Clone)]
pub struct Usecase<TRepo, TRelay, TVerifier>
where
    TRepo: RepoBuilder<EntityAccessor = ProofExchange>,
    TRelay: RelayClient,
    TVerifier: PresentationVerifier,
{
    repo: TRepo,
    relay: TRelay,
    verifier: TVerifier,
}

impl<TRepo, TRelay, TVerifier> Usecase<TRepo, TRelay, TVerifier>
where
    TRepo: RepoBuilder<EntityAccessor = ProofExchange>,
    TRelay: RelayClient,
    TVerifier: PresentationVerifier,
{
    pub fn new(repo: TRepo, relay: TRelay, verifier: TVerifier) -> Self {
        Self {
            repo,
            relay,
            verifier,
        }
    }
}

impl<TRepo, TRelay, TVerifier> UsecaseBuilder<ProofExchange>
    for Usecase<TRepo, TRelay, TVerifier>
where
    TRepo: RepoBuilder<EntityAccessor = ProofExchange>,
    TRelay: RelayClient,
    TVerifier: PresentationVerifier,
{
    type RepoImplementer = TRepo;
    type RelayImplementer = TRelay;
    type VerifierImplementer = TVerifier;

    fn repo(&self) -> Self::RepoImplementer {
        self.repo.clone()
    }

    fn relay(&self) -> Self::RelayImplementer {
        self.relay.clone()
    }

    fn verifier(&self) -> Self::VerifierImplementer {
        self.verifier.clone()
    }
}

#[async_trait]
impl<TRepo, TRelay, TVerifier> PresentationAPI for Usecase<TRepo, TRelay, TVerifier>
where
    TRepo: RepoBuilder<EntityAccessor = ProofExchange>,
    TRelay: RelayClient,
    TVerifier: PresentationVerifier,
{
    type EntityAccessor = ProofExchange;

    async fn prepare_request(
        &self,
        connection: &Connection,
        predicates: Vec<Predicate>,
    ) -> Result<ProofExchange, PresentationError> {
        if predicates.is_empty() {
            return Err(PresentationError::InvalidPredicates(
                "predicate sequence must not be empty".to_string(),
            ));
        }

        if connection.get_state() != ConnectionState::Accepted {
            return Err(PresentationError::ConnectionNotReady(format!(
                "connection {} in state {:?}",
                connection.get_id().as_ref(),
                connection.get_state(),
            )));
        }

        let exchange = ProofExchange::builder()
            .with_connection(connection)
            .with_predicates(predicates)
            .build()?;

        self.repo().save(&exchange).await?;
        Ok(exchange)
    }

    async fn send_request(
        &self,
        mut exchange: ProofExchange,
    ) -> Result<ProofExchange, PresentationError> {
        if exchange.get_state() != State::RequestPrepared {
            return Err(PresentationError::IllegalTransition {
                from: exchange.get_state(),
            });
        }

        let request = RelayMessage::new(
            exchange.get_channel(),
            MessageKind::ProofRequest,
            json!({"requested": exchange.get_predicates()}),
        );

        self.relay()
            .publish(exchange.get_channel(), request)
            .await
            .map_err(|err| PresentationError::RelayUnavailable(err.to_string()))?;

        exchange.update_state(State::RequestSent);
        self.repo().save(&exchange).await?;

        debug!(
            "proof request published: exchange={}",
            exchange.get_id().as_ref()
        );
        Ok(exchange)
    }

    async fn update_state(
        &self,
        exchange: ProofExchange,
    ) -> Result<ProofExchange, PresentationError> {
        if exchange.is_terminal() {
            return Ok(exchange);
        }

        let pending = self
            .relay()
            .poll(exchange.get_channel())
            .await
            .map_err(|err| PresentationError::RelayUnavailable(err.to_string()))?;

        let before = exchange.get_state();
        let mut advanced = exchange.advance(&pending);

        if advanced.get_state() == State::PresentationReceived {
            let presentation = advanced.get_presentation().ok_or_else(|| {
                PresentationError::EntityError("presentation payload missing".to_string())
            })?;

            let verified = self
                .verifier()
                .verify(&presentation, &advanced.get_predicates())?;
            advanced.record_verification(verified);

            debug!(
                "exchange={} presentation verified={}",
                advanced.get_id().as_ref(),
                verified
            );
        }

        if advanced.get_state() != before {
            self.repo().save(&advanced).await?;
        }

        Ok(advanced)
    }

    fn is_terminal(&self, exchange: &ProofExchange) -> bool {
        exchange.is_terminal()
    }

    async fn get_exchange(&self, id: ExchangeID) -> Result<ProofExchange, PresentationError> {
        self.repo().get_exchange(id).await
    }
}

#[async_trait]
impl<TRepo, TRelay, TVerifier> Pollable for Usecase<TRepo, TRelay, TVerifier>
where
    TRepo: RepoBuilder<EntityAccessor = ProofExchange>,
    TRelay: RelayClient,
    TVerifier: PresentationVerifier,
{
    type Entity = ProofExchange;
    type Error = PresentationError;

    async fn poll_once(&self, entity: ProofExchange) -> Result<ProofExchange, PresentationError> {
        self.update_state(entity).await
    }

    fn is_finished(&self, entity: &ProofExchange) -> bool {
        entity.is_terminal()
    }

    fn is_transient(&self, error: &PresentationError) -> bool {
        matches!(error, PresentationError::RelayUnavailable(_))
    }
}
