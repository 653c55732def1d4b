use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json;
use rst_common::standard::serde_json::json;
use rst_common::with_logging::log::debug;

use crate::agent::types::AgentProfile;
use crate::relay::types::{MessageKind, RelayClient, RelayMessage};
use crate::scheduler::types::Pollable;

use super::connection::Connection;
use super::types::{
    Alias, ConnectionAPI, ConnectionEntityAccessor, ConnectionError, ConnectionID, RepoBuilder,
    State, UsecaseBuilder,
};

/// `Usecase` is the connection state machine over its collaborators: a
/// persistence repository and the relay transport
///
/// Outbound messages (invitation, response, ping) are published here; the
/// entity fold stays consume-only
#[derive(Clone)]
pub struct Usecase<TRepo, TRelay>
where
    TRepo: RepoBuilder<EntityAccessor = Connection>,
    TRelay: RelayClient,
{
    repo: TRepo,
    relay: TRelay,
    profile: AgentProfile,
}

impl<TRepo, TRelay> Usecase<TRepo, TRelay>
where
    TRepo: RepoBuilder<EntityAccessor = Connection>,
    TRelay: RelayClient,
{
    pub fn new(repo: TRepo, relay: TRelay, profile: AgentProfile) -> Self {
        Self {
            repo,
            relay,
            profile,
        }
    }
}

impl<TRepo, TRelay> UsecaseBuilder<Connection> for Usecase<TRepo, TRelay>
where
    TRepo: RepoBuilder<EntityAccessor = Connection>,
    TRelay: RelayClient,
{
    type RepoImplementer = TRepo;
    type RelayImplementer = TRelay;

    fn repo(&self) -> Self::RepoImplementer {
        self.repo.clone()
    }

    fn relay(&self) -> Self::RelayImplementer {
        self.relay.clone()
    }

    fn profile(&self) -> AgentProfile {
        self.profile.clone()
    }
}

#[async_trait]
impl<TRepo, TRelay> ConnectionAPI for Usecase<TRepo, TRelay>
where
    TRepo: RepoBuilder<EntityAccessor = Connection>,
    TRelay: RelayClient,
{
    type EntityAccessor = Connection;

    async fn create_invite(&self, alias: Alias) -> Result<Connection, ConnectionError> {
        Alias::validate(alias.as_ref())?;

        let repo = self.repo();
        let relay = self.relay();

        if let Some(live) = repo.find_live_by_alias(alias.clone()).await? {
            return Err(ConnectionError::InvalidAlias(format!(
                "alias {} already bound to live connection {}",
                alias.as_ref(),
                live.get_id().as_ref(),
            )));
        }

        let mut connection = Connection::builder()
            .with_alias(alias)
            .with_profile(self.profile())
            .build()?;

        let payload = serde_json::to_value(connection.get_invitation())
            .map_err(|err| ConnectionError::EntityError(err.to_string()))?;
        let invite = RelayMessage::new(connection.get_channel(), MessageKind::Invitation, payload);

        relay
            .publish(connection.get_channel(), invite)
            .await
            .map_err(|err| ConnectionError::RelayUnavailable(err.to_string()))?;

        connection.update_state(State::InviteSent);
        repo.save(&connection).await?;

        debug!(
            "invitation published: connection={}",
            connection.get_id().as_ref()
        );
        Ok(connection)
    }

    async fn update_state(&self, connection: Connection) -> Result<Connection, ConnectionError> {
        if connection.is_terminal() {
            return Ok(connection);
        }

        let relay = self.relay();
        let pending = relay
            .poll(connection.get_channel())
            .await
            .map_err(|err| ConnectionError::RelayUnavailable(err.to_string()))?;

        let before = connection.get_state();
        let mut advanced = connection.advance(&pending);

        // the fold never sends; the response publish belongs to this layer
        if advanced.get_state() == State::RequestReceived {
            let response = RelayMessage::new(
                advanced.get_channel(),
                MessageKind::ConnectionResponse,
                json!({
                    "label": self.profile().get_name(),
                    "invitation_id": advanced.get_invitation().get_id(),
                }),
            );

            relay
                .publish(advanced.get_channel(), response)
                .await
                .map_err(|err| ConnectionError::RelayUnavailable(err.to_string()))?;
            advanced.update_state(State::ResponseSent);
        }

        if advanced.get_state() != before {
            debug!(
                "connection={} advanced: {:?} -> {:?}",
                advanced.get_id().as_ref(),
                before,
                advanced.get_state()
            );
            self.repo().save(&advanced).await?;
        }

        Ok(advanced)
    }

    async fn send_ping(&self, connection: &Connection) -> Result<(), ConnectionError> {
        if connection.get_state() != State::Accepted {
            return Err(ConnectionError::IllegalTransition {
                from: connection.get_state(),
            });
        }

        let ping = RelayMessage::new(
            connection.get_channel(),
            MessageKind::Ping,
            json!({"comment": "ping"}),
        );

        self.relay()
            .publish(connection.get_channel(), ping)
            .await
            .map_err(|err| ConnectionError::RelayUnavailable(err.to_string()))
    }

    fn is_terminal(&self, connection: &Connection) -> bool {
        connection.is_terminal()
    }

    async fn get_connection(&self, id: ConnectionID) -> Result<Connection, ConnectionError> {
        self.repo().get_connection(id).await
    }

    async fn list_connections(
        &self,
        state: Option<State>,
    ) -> Result<Vec<Connection>, ConnectionError> {
        self.repo().list_by_state(state).await
    }
}

#[async_trait]
impl<TRepo, TRelay> Pollable for Usecase<TRepo, TRelay>
where
    TRepo: RepoBuilder<EntityAccessor = Connection>,
    TRelay: RelayClient,
{
    type Entity = Connection;
    type Error = ConnectionError;

    async fn poll_once(&self, entity: Connection) -> Result<Connection, ConnectionError> {
        self.update_state(entity).await
    }

    fn is_finished(&self, entity: &Connection) -> bool {
        entity.is_terminal()
    }

    fn is_transient(&self, error: &ConnectionError) -> bool {
        matches!(error, ConnectionError::RelayUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    use rst_common::standard::serde_json::json;
    use rst_common::with_tokio::tokio;

    use crate::relay::types::{ChannelID, RelayError};

    mock!(
        FakeRepo{}

        impl Clone for FakeRepo {
            fn clone(&self) -> Self;
        }

        #[async_trait]
        impl RepoBuilder for FakeRepo {
            type EntityAccessor = Connection;

            async fn save(&self, connection: &Connection) -> Result<(), ConnectionError>;
            async fn get_connection(&self, id: ConnectionID) -> Result<Connection, ConnectionError>;
            async fn find_live_by_alias(
                &self,
                alias: Alias,
            ) -> Result<Option<Connection>, ConnectionError>;
            async fn list_by_state(
                &self,
                state: Option<State>,
            ) -> Result<Vec<Connection>, ConnectionError>;
        }
    );

    mock!(
        FakeRelay{}

        impl Clone for FakeRelay {
            fn clone(&self) -> Self;
        }

        #[async_trait]
        impl RelayClient for FakeRelay {
            async fn publish(
                &self,
                channel: ChannelID,
                message: RelayMessage,
            ) -> Result<(), RelayError>;
            async fn poll(&self, channel: ChannelID) -> Result<Vec<RelayMessage>, RelayError>;
        }
    );

    fn generate_profile() -> AgentProfile {
        AgentProfile::new("Faber College".to_string(), None)
    }

    fn generate_connection(state: State) -> Connection {
        let mut connection = Connection::builder()
            .with_alias(Alias::from("alice".to_string()))
            .with_profile(generate_profile())
            .build()
            .unwrap();
        connection.update_state(state);
        connection
    }

    fn generate_usecase<
        TRepo: RepoBuilder<EntityAccessor = Connection>,
        TRelay: RelayClient,
    >(
        repo: TRepo,
        relay: TRelay,
    ) -> Usecase<TRepo, TRelay> {
        Usecase::new(repo, relay, generate_profile())
    }

    #[tokio::test]
    async fn test_create_invite_success() {
        let mut repo = MockFakeRepo::new();
        repo.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRepo::new();
            expected.expect_find_live_by_alias().returning(|_| Ok(None));
            expected.expect_save().returning(|_| Ok(()));
            expected
        });

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRelay::new();
            expected
                .expect_publish()
                .withf(|_, message| message.get_kind() == MessageKind::Invitation)
                .returning(|_, _| Ok(()));
            expected
        });

        let uc = generate_usecase(repo, relay);
        let connection = uc
            .create_invite(Alias::from("alice".to_string()))
            .await
            .unwrap();

        assert_eq!(connection.get_state(), State::InviteSent);
        assert!(!uc.is_terminal(&connection));
        assert_eq!(connection.get_alias().as_ref(), "alice");
    }

    #[tokio::test]
    async fn test_create_invite_empty_alias() {
        let uc = generate_usecase(MockFakeRepo::new(), MockFakeRelay::new());
        let created = uc.create_invite(Alias::from("".to_string())).await;

        assert!(matches!(created, Err(ConnectionError::InvalidAlias(_))));
    }

    #[tokio::test]
    async fn test_create_invite_alias_already_bound() {
        let mut repo = MockFakeRepo::new();
        repo.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRepo::new();
            expected
                .expect_find_live_by_alias()
                .returning(|_| Ok(Some(generate_connection(State::InviteSent))));
            expected
        });

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(MockFakeRelay::new);

        let uc = generate_usecase(repo, relay);
        let created = uc.create_invite(Alias::from("alice".to_string())).await;

        assert!(matches!(created, Err(ConnectionError::InvalidAlias(_))));
    }

    #[tokio::test]
    async fn test_create_invite_relay_down() {
        let mut repo = MockFakeRepo::new();
        repo.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRepo::new();
            expected.expect_find_live_by_alias().returning(|_| Ok(None));
            expected
        });

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRelay::new();
            expected
                .expect_publish()
                .returning(|_, _| Err(RelayError::Unavailable("gone".to_string())));
            expected
        });

        let uc = generate_usecase(repo, relay);
        let created = uc.create_invite(Alias::from("alice".to_string())).await;

        assert!(matches!(
            created,
            Err(ConnectionError::RelayUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_update_state_publishes_response_on_request() {
        let connection = generate_connection(State::InviteSent);

        let mut repo = MockFakeRepo::new();
        repo.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRepo::new();
            expected.expect_save().returning(|_| Ok(()));
            expected
        });

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRelay::new();
            expected.expect_poll().returning(|channel| {
                Ok(vec![RelayMessage::new(
                    channel,
                    MessageKind::ConnectionRequest,
                    json!({"pairwise_did": "JnQxiw6yRjvs4QiDCmyHxa"}),
                )])
            });
            expected
                .expect_publish()
                .withf(|_, message| message.get_kind() == MessageKind::ConnectionResponse)
                .returning(|_, _| Ok(()));
            expected
        });

        let uc = generate_usecase(repo, relay);
        let advanced = uc.update_state(connection).await.unwrap();

        assert_eq!(advanced.get_state(), State::ResponseSent);
        assert!(advanced.get_pairwise().is_some());
    }

    #[tokio::test]
    async fn test_update_state_ack_reaches_accepted() {
        let connection = generate_connection(State::ResponseSent);

        let mut repo = MockFakeRepo::new();
        repo.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRepo::new();
            expected.expect_save().returning(|_| Ok(()));
            expected
        });

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRelay::new();
            expected.expect_poll().returning(|channel| {
                Ok(vec![RelayMessage::new(
                    channel,
                    MessageKind::ConnectionAck,
                    json!({}),
                )])
            });
            expected
        });

        let uc = generate_usecase(repo, relay);
        let advanced = uc.update_state(connection).await.unwrap();

        assert_eq!(advanced.get_state(), State::Accepted);
        assert!(uc.is_terminal(&advanced));
    }

    #[tokio::test]
    async fn test_update_state_no_pending_messages() {
        let connection = generate_connection(State::InviteSent);

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRelay::new();
            expected.expect_poll().returning(|_| Ok(vec![]));
            expected
        });

        let uc = generate_usecase(MockFakeRepo::new(), relay);
        let advanced = uc.update_state(connection.clone()).await.unwrap();

        assert_eq!(advanced.get_state(), State::InviteSent);
        assert_eq!(advanced, connection);
    }

    #[tokio::test]
    async fn test_update_state_terminal_noop() {
        let connection = generate_connection(State::Accepted);

        let uc = generate_usecase(MockFakeRepo::new(), MockFakeRelay::new());
        let advanced = uc.update_state(connection.clone()).await.unwrap();

        assert_eq!(advanced, connection);
    }

    #[tokio::test]
    async fn test_update_state_relay_down() {
        let connection = generate_connection(State::InviteSent);

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRelay::new();
            expected
                .expect_poll()
                .returning(|_| Err(RelayError::Unavailable("gone".to_string())));
            expected
        });

        let uc = generate_usecase(MockFakeRepo::new(), relay);
        let advanced = uc.update_state(connection).await;

        assert!(matches!(
            advanced,
            Err(ConnectionError::RelayUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_send_ping_requires_accepted() {
        let connection = generate_connection(State::InviteSent);

        let uc = generate_usecase(MockFakeRepo::new(), MockFakeRelay::new());
        let sent = uc.send_ping(&connection).await;

        assert!(matches!(
            sent,
            Err(ConnectionError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_ping_publishes() {
        let connection = generate_connection(State::Accepted);

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRelay::new();
            expected
                .expect_publish()
                .withf(|_, message| message.get_kind() == MessageKind::Ping)
                .returning(|_, _| Ok(()));
            expected
        });

        let uc = generate_usecase(MockFakeRepo::new(), relay);
        let sent = uc.send_ping(&connection).await;

        assert!(sent.is_ok());
    }

    #[tokio::test]
    async fn test_handshake_scenario() {
        // invite published towards alias "alice"
        let mut repo = MockFakeRepo::new();
        repo.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRepo::new();
            expected.expect_find_live_by_alias().returning(|_| Ok(None));
            expected.expect_save().returning(|_| Ok(()));
            expected
        });

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRelay::new();
            expected.expect_publish().returning(|_, _| Ok(()));
            expected
        });

        let uc = generate_usecase(repo, relay);
        let connection = uc
            .create_invite(Alias::from("alice".to_string()))
            .await
            .unwrap();
        assert_eq!(connection.get_state(), State::InviteSent);

        // relay delivers the counterparty request
        let mut repo = MockFakeRepo::new();
        repo.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRepo::new();
            expected.expect_save().returning(|_| Ok(()));
            expected
        });

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRelay::new();
            expected.expect_poll().returning(|channel| {
                Ok(vec![RelayMessage::new(
                    channel,
                    MessageKind::ConnectionRequest,
                    json!({"pairwise_did": "JnQxiw6yRjvs4QiDCmyHxa"}),
                )])
            });
            expected.expect_publish().returning(|_, _| Ok(()));
            expected
        });

        let uc = generate_usecase(repo, relay);
        let connection = uc.update_state(connection).await.unwrap();
        assert_eq!(connection.get_state(), State::ResponseSent);

        // relay delivers the acknowledgement
        let mut repo = MockFakeRepo::new();
        repo.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRepo::new();
            expected.expect_save().returning(|_| Ok(()));
            expected
        });

        let mut relay = MockFakeRelay::new();
        relay.expect_clone().times(1).return_once(|| {
            let mut expected = MockFakeRelay::new();
            expected.expect_poll().returning(|channel| {
                Ok(vec![RelayMessage::new(
                    channel,
                    MessageKind::ConnectionAck,
                    json!({}),
                )])
            });
            expected
        });

        let uc = generate_usecase(repo, relay);
        let connection = uc.update_state(connection).await.unwrap();
        assert_eq!(connection.get_state(), State::Accepted);
        assert!(uc.is_terminal(&connection));
    }
}
