use std::fmt::Debug;
use std::time::Duration;

use rst_common::standard::async_trait::async_trait;

/// `Pollable` is the contract the three protocol state machines expose to
/// the [`super::PollingScheduler`]
///
/// `poll_once` performs one relay poll plus fold and returns the advanced
/// entity; a failed poll leaves the caller's entity untouched, so it is
/// always safe to retry with the same value
#[async_trait]
pub trait Pollable: Send + Sync {
    type Entity: Clone + Send + Sync;
    type Error: Debug + Send;

    async fn poll_once(&self, entity: Self::Entity) -> Result<Self::Entity, Self::Error>;

    fn is_finished(&self, entity: &Self::Entity) -> bool;

    /// True for collaborator unavailability worth retrying within the
    /// scheduler budget; everything else propagates immediately
    fn is_transient(&self, error: &Self::Error) -> bool;
}

/// `Budget` bounds one scheduler run: a fixed number of poll attempts or a
/// wall-clock deadline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Budget {
    Attempts(u32),
    Deadline(Duration),
}

/// `RunOutcome` is the result of a scheduler run
///
/// Every variant hands the entity back: a timed-out or cancelled run loses
/// nothing, the caller resumes by invoking the scheduler again with the same
/// entity. Cancellation is a caller request, not an error
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<TEntity> {
    /// The machine reached a terminal state (or the caller's predicate held)
    Completed(TEntity),
    /// Budget exhausted while still non-terminal; recoverable
    TimedOut(TEntity),
    /// The cancellation signal fired at a suspension boundary
    Cancelled(TEntity),
}

impl<TEntity> RunOutcome<TEntity> {
    pub fn into_entity(self) -> TEntity {
        match self {
            RunOutcome::Completed(entity) => entity,
            RunOutcome::TimedOut(entity) => entity,
            RunOutcome::Cancelled(entity) => entity,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}
