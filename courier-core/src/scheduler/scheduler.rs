use std::time::{Duration, Instant};

use rst_common::with_logging::log::{debug, warn};
use rst_common::with_tokio::tokio;

use tokio_util::sync::CancellationToken;

use super::types::{Budget, Pollable, RunOutcome};

/// `PollingScheduler` drives any [`Pollable`] state machine towards its
/// terminal state by repeated relay polls
///
/// The task suspends for the configured interval between polls; cancellation
/// is observed at every suspension boundary. Transient collaborator failures
/// are retried within the budget, hard errors propagate immediately, and in
/// every non-error outcome the entity comes back to the caller
pub struct PollingScheduler {
    interval: Duration,
    budget: Budget,
}

impl PollingScheduler {
    pub fn new(interval: Duration, budget: Budget) -> Self {
        Self { interval, budget }
    }

    /// Run until the machine is terminal, the budget runs out or the caller
    /// cancels
    pub async fn run<TMachine>(
        &self,
        machine: &TMachine,
        entity: TMachine::Entity,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome<TMachine::Entity>, TMachine::Error>
    where
        TMachine: Pollable,
    {
        self.run_until(machine, entity, cancel, |_| false).await
    }

    /// Run until the predicate holds, in addition to the terminal/budget/
    /// cancellation exits of [`PollingScheduler::run`]. Lets callers wait
    /// for an intermediate state, e.g. a credential exchange reaching
    /// `RequestReceived` before issuing
    pub async fn run_until<TMachine, TPredicate>(
        &self,
        machine: &TMachine,
        mut entity: TMachine::Entity,
        cancel: &CancellationToken,
        reached: TPredicate,
    ) -> Result<RunOutcome<TMachine::Entity>, TMachine::Error>
    where
        TMachine: Pollable,
        TPredicate: Fn(&TMachine::Entity) -> bool + Send + Sync,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if machine.is_finished(&entity) || reached(&entity) {
                return Ok(RunOutcome::Completed(entity));
            }

            match machine.poll_once(entity.clone()).await {
                Ok(advanced) => entity = advanced,
                Err(error) if machine.is_transient(&error) => {
                    warn!("transient failure while polling, retrying: {:?}", error);
                }
                Err(error) => return Err(error),
            }
            attempts += 1;

            if machine.is_finished(&entity) || reached(&entity) {
                return Ok(RunOutcome::Completed(entity));
            }

            let exhausted = match self.budget {
                Budget::Attempts(max) => attempts >= max,
                Budget::Deadline(limit) => started.elapsed() >= limit,
            };

            if exhausted {
                debug!("polling budget exhausted after {} attempts", attempts);
                return Ok(RunOutcome::TimedOut(entity));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled(entity)),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use rst_common::standard::async_trait::async_trait;

    #[derive(Debug, Clone, PartialEq)]
    struct FakeEntity {
        progress: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum FakeError {
        Transient,
        Hard,
    }

    struct FakeMachine {
        polls: Arc<AtomicU32>,
        errors: Arc<Mutex<VecDeque<FakeError>>>,
        advances: bool,
        finished_at: Option<u32>,
    }

    impl FakeMachine {
        fn new(polls: Arc<AtomicU32>, advances: bool, finished_at: Option<u32>) -> Self {
            Self {
                polls,
                errors: Arc::new(Mutex::new(VecDeque::new())),
                advances,
                finished_at,
            }
        }

        fn with_errors(mut self, errors: Vec<FakeError>) -> Self {
            self.errors = Arc::new(Mutex::new(errors.into()));
            self
        }
    }

    #[async_trait]
    impl Pollable for FakeMachine {
        type Entity = FakeEntity;
        type Error = FakeError;

        async fn poll_once(&self, entity: FakeEntity) -> Result<FakeEntity, FakeError> {
            self.polls.fetch_add(1, Ordering::SeqCst);

            if let Some(error) = self.errors.lock().unwrap().pop_front() {
                return Err(error);
            }

            match self.advances {
                true => Ok(FakeEntity {
                    progress: entity.progress + 1,
                }),
                false => Ok(entity),
            }
        }

        fn is_finished(&self, entity: &FakeEntity) -> bool {
            self.finished_at
                .map(|at| entity.progress >= at)
                .unwrap_or(false)
        }

        fn is_transient(&self, error: &FakeError) -> bool {
            matches!(error, FakeError::Transient)
        }
    }

    fn generate_scheduler(budget: Budget) -> PollingScheduler {
        PollingScheduler::new(Duration::from_millis(2), budget)
    }

    #[tokio::test]
    async fn test_run_times_out_after_exact_attempts() {
        let polls = Arc::new(AtomicU32::new(0));
        let machine = FakeMachine::new(polls.clone(), false, None);

        let scheduler = generate_scheduler(Budget::Attempts(3));
        let outcome = scheduler
            .run(&machine, FakeEntity { progress: 7 }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome, RunOutcome::TimedOut(FakeEntity { progress: 7 }));
    }

    #[tokio::test]
    async fn test_run_completes_when_terminal() {
        let polls = Arc::new(AtomicU32::new(0));
        let machine = FakeMachine::new(polls.clone(), true, Some(2));

        let scheduler = generate_scheduler(Budget::Attempts(10));
        let outcome = scheduler
            .run(&machine, FakeEntity { progress: 0 }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome, RunOutcome::Completed(FakeEntity { progress: 2 }));
    }

    #[tokio::test]
    async fn test_run_already_terminal_never_polls() {
        let polls = Arc::new(AtomicU32::new(0));
        let machine = FakeMachine::new(polls.clone(), true, Some(0));

        let scheduler = generate_scheduler(Budget::Attempts(10));
        let outcome = scheduler
            .run(&machine, FakeEntity { progress: 0 }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 0);
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn test_run_retries_transient_errors() {
        let polls = Arc::new(AtomicU32::new(0));
        let machine = FakeMachine::new(polls.clone(), true, Some(1))
            .with_errors(vec![FakeError::Transient, FakeError::Transient]);

        let scheduler = generate_scheduler(Budget::Attempts(10));
        let outcome = scheduler
            .run(&machine, FakeEntity { progress: 0 }, &CancellationToken::new())
            .await
            .unwrap();

        // two transient failures, then the successful poll
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome, RunOutcome::Completed(FakeEntity { progress: 1 }));
    }

    #[tokio::test]
    async fn test_run_propagates_hard_error() {
        let polls = Arc::new(AtomicU32::new(0));
        let machine =
            FakeMachine::new(polls.clone(), true, Some(5)).with_errors(vec![FakeError::Hard]);

        let scheduler = generate_scheduler(Budget::Attempts(10));
        let outcome = scheduler
            .run(&machine, FakeEntity { progress: 0 }, &CancellationToken::new())
            .await;

        assert_eq!(outcome, Err(FakeError::Hard));
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_observes_cancellation_at_suspension() {
        let polls = Arc::new(AtomicU32::new(0));
        let machine = FakeMachine::new(polls.clone(), true, None);

        // a long interval: without the cancellation exit this test would hang
        let scheduler = PollingScheduler::new(Duration::from_secs(60), Budget::Attempts(10));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = scheduler
            .run(&machine, FakeEntity { progress: 0 }, &cancel)
            .await
            .unwrap();

        // one poll ran; its accumulated state survives the cancellation
        assert_eq!(polls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome, RunOutcome::Cancelled(FakeEntity { progress: 1 }));
    }

    #[tokio::test]
    async fn test_run_until_stops_at_intermediate_state() {
        let polls = Arc::new(AtomicU32::new(0));
        let machine = FakeMachine::new(polls.clone(), true, Some(10));

        let scheduler = generate_scheduler(Budget::Attempts(10));
        let outcome = scheduler
            .run_until(
                &machine,
                FakeEntity { progress: 0 },
                &CancellationToken::new(),
                |entity| entity.progress >= 2,
            )
            .await
            .unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome, RunOutcome::Completed(FakeEntity { progress: 2 }));
    }

    #[tokio::test]
    async fn test_run_deadline_budget() {
        let polls = Arc::new(AtomicU32::new(0));
        let machine = FakeMachine::new(polls.clone(), false, None);

        let scheduler = PollingScheduler::new(
            Duration::from_millis(2),
            Budget::Deadline(Duration::from_millis(10)),
        );

        let outcome = scheduler
            .run(&machine, FakeEntity { progress: 0 }, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::TimedOut(_)));
        assert!(polls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_timed_out_run_is_resumable() {
        let polls = Arc::new(AtomicU32::new(0));
        let machine = FakeMachine::new(polls.clone(), true, Some(4));

        let scheduler = generate_scheduler(Budget::Attempts(2));
        let cancel = CancellationToken::new();

        let outcome = scheduler
            .run(&machine, FakeEntity { progress: 0 }, &cancel)
            .await
            .unwrap();
        let entity = match outcome {
            RunOutcome::TimedOut(entity) => entity,
            other => panic!("expected timeout, got {:?}", other),
        };
        assert_eq!(entity.progress, 2);

        // resumed run picks up where the first left off
        let resumed = scheduler.run(&machine, entity, &cancel).await.unwrap();
        assert_eq!(resumed, RunOutcome::Completed(FakeEntity { progress: 4 }));
    }
}
