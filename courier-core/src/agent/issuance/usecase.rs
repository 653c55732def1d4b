use std::collections::BTreeMap;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json::json;
use rst_common::with_logging::log::{debug, info};

use crate::agent::connection::types::{
    ConnectionEntityAccessor, State as ConnectionState,
};
use crate::agent::connection::Connection;
use crate::agent::types::ExchangeID;
use crate::ledger::types::{CredentialDefinitionRef, LedgerClient, SchemaRef, SchemaSpec};
use crate::ledger::AgreementAcceptance;
use crate::relay::types::{MessageKind, RelayClient, RelayMessage};
use crate::scheduler::types::Pollable;

use super::exchange::CredentialExchange;
use super::types::{
    CredentialExchangeEntityAccessor, IssuanceAPI, IssuanceError, RepoAgreementBuilder,
    RepoExchangeBuilder, State, UsecaseBuilder,
};

/// `Usecase` is the credential issuance state machine over its
/// collaborators: exchange and agreement repositories, the relay transport
/// and the ledger client
#[derive(Clone)]
pub struct Usecase<TRepoExchange, TRepoAgreement, TRelay, TLedger>
where
    TRepoExchange: RepoExchangeBuilder<EntityAccessor = CredentialExchange>,
    TRepoAgreement: RepoAgreementBuilder,
    TRelay: RelayClient,
    TLedger: LedgerClient,
{
    repo_exchange: TRepoExchange,
    repo_agreement: TRepoAgreement,
    relay: TRelay,
    ledger: TLedger,
}

impl<TRepoExchange, TRepoAgreement, TRelay, TLedger>
    Usecase<TRepoExchange, TRepoAgreement, TRelay, TLedger>
where
    TRepoExchange: RepoExchangeBuilder<EntityAccessor = CredentialExchange>,
    TRepoAgreement: RepoAgreementBuilder,
    TRelay: RelayClient,
    TLedger: LedgerClient,
{
    pub fn new(
        repo_exchange: TRepoExchange,
        repo_agreement: TRepoAgreement,
        relay: TRelay,
        ledger: TLedger,
    ) -> Self {
        Self {
            repo_exchange,
            repo_agreement,
            relay,
            ledger,
        }
    }

    /// Ledger-mutating operations and the offer publish are gated on a
    /// persisted acceptance record covering the agreement the ledger
    /// currently enforces
    async fn ensure_agreement_accepted(&self) -> Result<(), IssuanceError> {
        let agreement = self
            .ledger()
            .fetch_agreement()
            .await
            .map_err(|err| IssuanceError::LedgerUnavailable(err.to_string()))?;

        match agreement {
            None => Ok(()),
            Some(agreement) => {
                let acceptance = self.repo_agreement().get_acceptance().await?;
                match acceptance {
                    Some(acceptance) if acceptance.covers(&agreement) => Ok(()),
                    _ => Err(IssuanceError::AgreementNotAccepted),
                }
            }
        }
    }
}

impl<TRepoExchange, TRepoAgreement, TRelay, TLedger> UsecaseBuilder<CredentialExchange>
    for Usecase<TRepoExchange, TRepoAgreement, TRelay, TLedger>
where
    TRepoExchange: RepoExchangeBuilder<EntityAccessor = CredentialExchange>,
    TRepoAgreement: RepoAgreementBuilder,
    TRelay: RelayClient,
    TLedger: LedgerClient,
{
    type RepoExchangeImplementer = TRepoExchange;
    type RepoAgreementImplementer = TRepoAgreement;
    type RelayImplementer = TRelay;
    type LedgerImplementer = TLedger;

    fn repo_exchange(&self) -> Self::RepoExchangeImplementer {
        self.repo_exchange.clone()
    }

    fn repo_agreement(&self) -> Self::RepoAgreementImplementer {
        self.repo_agreement.clone()
    }

    fn relay(&self) -> Self::RelayImplementer {
        self.relay.clone()
    }

    fn ledger(&self) -> Self::LedgerImplementer {
        self.ledger.clone()
    }
}

#[async_trait]
impl<TRepoExchange, TRepoAgreement, TRelay, TLedger> IssuanceAPI
    for Usecase<TRepoExchange, TRepoAgreement, TRelay, TLedger>
where
    TRepoExchange: RepoExchangeBuilder<EntityAccessor = CredentialExchange>,
    TRepoAgreement: RepoAgreementBuilder,
    TRelay: RelayClient,
    TLedger: LedgerClient,
{
    type EntityAccessor = CredentialExchange;

    async fn accept_agreement(&self) -> Result<Option<AgreementAcceptance>, IssuanceError> {
        let ledger = self.ledger();
        let agreement = ledger
            .fetch_agreement()
            .await
            .map_err(|err| IssuanceError::LedgerUnavailable(err.to_string()))?;

        let agreement = match agreement {
            None => return Ok(None),
            Some(agreement) => agreement,
        };

        let mechanism = agreement
            .get_acceptance_mechanisms()
            .first()
            .ok_or_else(|| {
                IssuanceError::EntityError(
                    "agreement advertises no acceptance mechanism".to_string(),
                )
            })?
            .to_owned();

        let acceptance = AgreementAcceptance::new(
            agreement.get_text().to_owned(),
            agreement.get_version().to_owned(),
            mechanism.clone(),
        );

        ledger
            .submit_agreement_acceptance(
                acceptance.get_text().to_owned(),
                acceptance.get_version().to_owned(),
                mechanism,
                acceptance.get_accepted_at(),
            )
            .await
            .map_err(|err| IssuanceError::LedgerUnavailable(err.to_string()))?;

        self.repo_agreement().save_acceptance(&acceptance).await?;

        info!(
            "transaction author agreement accepted: version={}",
            acceptance.get_version()
        );
        Ok(Some(acceptance))
    }

    async fn register_schema(&self, spec: SchemaSpec) -> Result<SchemaRef, IssuanceError> {
        self.ensure_agreement_accepted().await?;

        self.ledger()
            .register_schema(spec)
            .await
            .map_err(|err| IssuanceError::LedgerUnavailable(err.to_string()))
    }

    async fn register_credential_definition(
        &self,
        schema_ref: SchemaRef,
        tag: String,
    ) -> Result<CredentialDefinitionRef, IssuanceError> {
        self.ensure_agreement_accepted().await?;

        self.ledger()
            .register_credential_definition(schema_ref, tag)
            .await
            .map_err(|err| IssuanceError::LedgerUnavailable(err.to_string()))
    }

    async fn prepare_offer(
        &self,
        connection: &Connection,
        attributes: BTreeMap<String, String>,
        cred_def: CredentialDefinitionRef,
    ) -> Result<CredentialExchange, IssuanceError> {
        if attributes.is_empty() {
            return Err(IssuanceError::InvalidAttributes(
                "attribute mapping must not be empty".to_string(),
            ));
        }

        if connection.get_state() != ConnectionState::Accepted {
            return Err(IssuanceError::ConnectionNotReady(format!(
                "connection {} in state {:?}",
                connection.get_id().as_ref(),
                connection.get_state(),
            )));
        }

        let exchange = CredentialExchange::builder()
            .with_connection(connection)
            .with_attributes(attributes)
            .with_cred_def(cred_def)
            .build()?;

        self.repo_exchange().save(&exchange).await?;
        Ok(exchange)
    }

    async fn send_offer(
        &self,
        mut exchange: CredentialExchange,
    ) -> Result<CredentialExchange, IssuanceError> {
        if exchange.get_state() != State::OfferPrepared {
            return Err(IssuanceError::IllegalTransition {
                from: exchange.get_state(),
            });
        }

        self.ensure_agreement_accepted().await?;

        let offer = RelayMessage::new(
            exchange.get_channel(),
            MessageKind::CredentialOffer,
            json!({
                "attributes": exchange.get_attributes(),
                "cred_def": exchange.get_cred_def().as_ref(),
            }),
        );

        self.relay()
            .publish(exchange.get_channel(), offer)
            .await
            .map_err(|err| IssuanceError::RelayUnavailable(err.to_string()))?;

        exchange.update_state(State::OfferSent);
        self.repo_exchange().save(&exchange).await?;

        debug!("offer published: exchange={}", exchange.get_id().as_ref());
        Ok(exchange)
    }

    async fn update_state(
        &self,
        exchange: CredentialExchange,
    ) -> Result<CredentialExchange, IssuanceError> {
        if exchange.is_terminal() {
            return Ok(exchange);
        }

        let pending = self
            .relay()
            .poll(exchange.get_channel())
            .await
            .map_err(|err| IssuanceError::RelayUnavailable(err.to_string()))?;

        let before = exchange.get_state();
        let advanced = exchange.advance(&pending);

        if advanced.get_state() != before {
            debug!(
                "exchange={} advanced: {:?} -> {:?}",
                advanced.get_id().as_ref(),
                before,
                advanced.get_state()
            );
            self.repo_exchange().save(&advanced).await?;
        }

        Ok(advanced)
    }

    async fn issue(
        &self,
        mut exchange: CredentialExchange,
    ) -> Result<CredentialExchange, IssuanceError> {
        if exchange.get_state() != State::RequestReceived {
            return Err(IssuanceError::IllegalTransition {
                from: exchange.get_state(),
            });
        }

        let credential = RelayMessage::new(
            exchange.get_channel(),
            MessageKind::Credential,
            json!({
                "values": exchange.get_attributes(),
                "cred_def": exchange.get_cred_def().as_ref(),
            }),
        );

        self.relay()
            .publish(exchange.get_channel(), credential)
            .await
            .map_err(|err| IssuanceError::RelayUnavailable(err.to_string()))?;

        exchange.update_state(State::CredentialSent);
        self.repo_exchange().save(&exchange).await?;

        debug!("credential published: exchange={}", exchange.get_id().as_ref());
        Ok(exchange)
    }

    fn is_terminal(&self, exchange: &CredentialExchange) -> bool {
        exchange.is_terminal()
    }

    async fn get_exchange(&self, id: ExchangeID) -> Result<CredentialExchange, IssuanceError> {
        self.repo_exchange().get_exchange(id).await
    }
}

#[async_trait]
impl<TRepoExchange, TRepoAgreement, TRelay, TLedger> Pollable
    for Usecase<TRepoExchange, TRepoAgreement, TRelay, TLedger>
where
    TRepoExchange: RepoExchangeBuilder<EntityAccessor = CredentialExchange>,
    TRepoAgreement: RepoAgreementBuilder,
    TRelay: RelayClient,
    TLedger: LedgerClient,
{
    type Entity = CredentialExchange;
    type Error = IssuanceError;

    async fn poll_once(
        &self,
        entity: CredentialExchange,
    ) -> Result<CredentialExchange, IssuanceError> {
        self.update_state(entity).await
    }

    fn is_finished(&self, entity: &CredentialExchange) -> bool {
        entity.is_terminal()
    }

    fn is_transient(&self, error: &IssuanceError) -> bool {
        matches!(
            error,
            IssuanceError::RelayUnavailable(_) | IssuanceError::LedgerUnavailable(_)
        )
    }
}
