//! Deletion executor
//!
//! Drives one resource through the deletion state machine:
//!
//! ```text
//! EXISTS --delete()--> DELETE_REQUESTED
//! DELETE_REQUESTED --accepted--> POLLING
//! DELETE_REQUESTED --already-not-found--> DELETED
//! POLLING --describe: not-found--> DELETED
//! POLLING --still exists, attempts remain--> POLLING
//! POLLING --still exists, attempts exhausted--> TIMED_OUT
//! POLLING --describe: FAILED--> FAILED
//! any --unexpected error--> FAILED
//! ```
//!
//! Transitions are a pure function ([`DeletionState::on`]); [`DeletionExecutor`]
//! feeds it API results and sleeps between polls through an injectable
//! [`Sleeper`].

use crate::api::{ResourceApi, ResourceNode, STATUS_FAILED};
use crate::error::ApiError;
use crate::wait::{PollConfig, Sleeper};
use futures::future::join_all;
use sitewise_sweep_common::ResourceKind;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Status reported when a timeout happens before any describe succeeded
const STATUS_UNOBSERVED: &str = "UNOBSERVED";

/// Deletion lifecycle of a single resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionState {
    Exists,
    /// Delete issued; `retries` counts throttled/conflicting attempts
    DeleteRequested { retries: u32 },
    /// Waiting for describe to report not-found
    Polling {
        attempt: u32,
        last_status: Option<String>,
    },
    Deleted { already_gone: bool },
    TimedOut {
        attempts: u32,
        last_status: Option<String>,
    },
    Failed(ApiError),
}

/// Observations that move a resource through [`DeletionState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionEvent {
    DeleteIssued,
    DeleteAccepted,
    DeleteNotFound,
    DescribeNotFound,
    StillExists { status: String },
    /// Throttling or a conflicting operation; the call may be repeated
    Retryable(ApiError),
    Error(ApiError),
}

impl DeletionState {
    /// Whether no further transitions can occur
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeletionState::Deleted { .. } | DeletionState::TimedOut { .. } | DeletionState::Failed(_)
        )
    }

    /// Apply `event` given an attempt `budget`.
    ///
    /// Terminal states absorb every event. Events that do not apply to the
    /// current state leave it unchanged.
    pub fn on(self, event: DeletionEvent, budget: u32) -> DeletionState {
        use DeletionEvent as E;
        use DeletionState as S;

        if self.is_terminal() {
            return self;
        }

        match (self, event) {
            (_, E::Error(e)) => S::Failed(e),
            (S::Exists, E::DeleteIssued) => S::DeleteRequested { retries: 0 },
            (S::DeleteRequested { .. }, E::DeleteAccepted) => S::Polling {
                attempt: 0,
                last_status: None,
            },
            (S::DeleteRequested { .. }, E::DeleteNotFound) => S::Deleted { already_gone: true },
            (S::DeleteRequested { retries }, E::Retryable(e)) => {
                let retries = retries + 1;
                if retries >= budget {
                    S::Failed(e)
                } else {
                    S::DeleteRequested { retries }
                }
            }
            (S::Polling { .. }, E::DescribeNotFound) => S::Deleted {
                already_gone: false,
            },
            (S::Polling { .. }, E::StillExists { status }) if status == STATUS_FAILED => {
                S::Failed(ApiError::Service {
                    code: "DeletionFailed".to_string(),
                    message: format!("service reported status {status}"),
                })
            }
            (S::Polling { attempt, .. }, E::StillExists { status }) => {
                next_poll(attempt + 1, Some(status), budget)
            }
            (
                S::Polling {
                    attempt,
                    last_status,
                },
                E::Retryable(_),
            ) => next_poll(attempt + 1, last_status, budget),
            (state, _) => state,
        }
    }
}

fn next_poll(attempt: u32, last_status: Option<String>, budget: u32) -> DeletionState {
    if attempt >= budget {
        DeletionState::TimedOut {
            attempts: attempt,
            last_status,
        }
    } else {
        DeletionState::Polling {
            attempt,
            last_status,
        }
    }
}

/// Successful end of a deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Delete accepted and describe later reported not-found
    Deleted,
    /// The delete call itself reported not-found
    AlreadyDeleted,
}

/// A resource never reached not-found within its attempt budget
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Timed out deleting {kind} {id} after {attempts} attempts (last status: {last_status})")]
pub struct DeletionTimeoutError {
    pub id: String,
    pub kind: ResourceKind,
    pub last_status: String,
    pub attempts: u32,
}

/// Per-resource deletion failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeleteError {
    #[error(transparent)]
    Timeout(#[from] DeletionTimeoutError),

    #[error("Failed to delete {kind} {id}")]
    Failed {
        id: String,
        kind: ResourceKind,
        #[source]
        source: ApiError,
    },
}

impl DeleteError {
    /// Whether the failure must abort the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeleteError::Failed { source, .. } if source.is_fatal())
    }
}

/// Deletes resources and waits for them to disappear
pub struct DeletionExecutor<A, S> {
    api: A,
    sleeper: S,
    poll: PollConfig,
}

impl<A: ResourceApi, S: Sleeper> DeletionExecutor<A, S> {
    pub fn new(api: A, sleeper: S, poll: PollConfig) -> Self {
        Self {
            api,
            sleeper,
            poll,
        }
    }

    /// Delete one resource and wait for a terminal state.
    ///
    /// Deleting a resource that is already gone succeeds with
    /// [`DeletionOutcome::AlreadyDeleted`].
    pub async fn delete(&self, node: &ResourceNode) -> Result<DeletionOutcome, DeleteError> {
        let budget = self.poll.attempts_for(node.kind);
        let mut delays = self.poll.delays(node.kind);
        let mut state = DeletionState::Exists.on(DeletionEvent::DeleteIssued, budget);

        info!(kind = %node.kind, id = %node.id, name = %node.name, "Deleting");

        loop {
            let event = match &state {
                DeletionState::DeleteRequested { .. } => {
                    match self.api.delete(node.kind, &node.id).await {
                        Ok(()) => DeletionEvent::DeleteAccepted,
                        Err(e) if e.is_not_found() => DeletionEvent::DeleteNotFound,
                        Err(e) if e.is_retryable() => DeletionEvent::Retryable(e),
                        Err(e) => DeletionEvent::Error(e),
                    }
                }
                DeletionState::Polling { .. } => {
                    match self.api.describe(node.kind, &node.id).await {
                        Ok(descriptor) => DeletionEvent::StillExists {
                            status: descriptor.status().to_string(),
                        },
                        Err(e) if e.is_not_found() => DeletionEvent::DescribeNotFound,
                        Err(e) if e.is_retryable() => DeletionEvent::Retryable(e),
                        Err(e) => DeletionEvent::Error(e),
                    }
                }
                DeletionState::Deleted { already_gone } => {
                    let outcome = if *already_gone {
                        debug!(kind = %node.kind, id = %node.id, "Already deleted");
                        DeletionOutcome::AlreadyDeleted
                    } else {
                        info!(kind = %node.kind, id = %node.id, "Deleted");
                        DeletionOutcome::Deleted
                    };
                    return Ok(outcome);
                }
                DeletionState::TimedOut {
                    attempts,
                    last_status,
                } => {
                    let err = DeletionTimeoutError {
                        id: node.id.clone(),
                        kind: node.kind,
                        last_status: last_status
                            .clone()
                            .unwrap_or_else(|| STATUS_UNOBSERVED.to_string()),
                        attempts: *attempts,
                    };
                    warn!(kind = %node.kind, id = %node.id, error = %err, "Deletion timed out");
                    return Err(err.into());
                }
                DeletionState::Failed(e) => {
                    warn!(kind = %node.kind, id = %node.id, error = %e, "Deletion failed");
                    return Err(DeleteError::Failed {
                        id: node.id.clone(),
                        kind: node.kind,
                        source: e.clone(),
                    });
                }
                DeletionState::Exists => DeletionEvent::DeleteIssued,
            };

            let retrying = matches!(event, DeletionEvent::Retryable(_));
            let next = state.on(event, budget);

            let waits = match &next {
                DeletionState::DeleteRequested { .. } => retrying,
                DeletionState::Polling { attempt, last_status } => {
                    if *attempt > 0 {
                        debug!(
                            kind = %node.kind,
                            id = %node.id,
                            attempt,
                            status = last_status.as_deref().unwrap_or(STATUS_UNOBSERVED),
                            "Still deleting"
                        );
                    }
                    *attempt > 0
                }
                _ => false,
            };
            if waits {
                let delay = delays.next().unwrap_or(self.poll.interval);
                self.sleeper.sleep(delay).await;
            }

            state = next;
        }
    }

    /// Delete every node of a batch, at most `concurrency` at a time.
    ///
    /// Results are returned in input order. All nodes reach a terminal state
    /// before this returns.
    pub async fn delete_batch(
        &self,
        nodes: &[ResourceNode],
        concurrency: usize,
    ) -> Vec<Result<DeletionOutcome, DeleteError>> {
        let gate = Arc::new(Semaphore::new(concurrency.max(1)));

        let futures = nodes.iter().map(|node| {
            let gate = Arc::clone(&gate);
            async move {
                // The semaphore is never closed
                let _permit = gate.acquire_owned().await.ok();
                self.delete(node).await
            }
        });

        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polling(attempt: u32) -> DeletionState {
        DeletionState::Polling {
            attempt,
            last_status: Some("DELETING".into()),
        }
    }

    #[test]
    fn delete_accepted_starts_polling() {
        let state = DeletionState::Exists
            .on(DeletionEvent::DeleteIssued, 3)
            .on(DeletionEvent::DeleteAccepted, 3);
        assert_eq!(
            state,
            DeletionState::Polling {
                attempt: 0,
                last_status: None
            }
        );
    }

    #[test]
    fn delete_not_found_is_success() {
        let state = DeletionState::DeleteRequested { retries: 0 }.on(DeletionEvent::DeleteNotFound, 3);
        assert_eq!(state, DeletionState::Deleted { already_gone: true });
    }

    #[test]
    fn still_exists_until_budget_then_times_out() {
        let still = || DeletionEvent::StillExists {
            status: "DELETING".into(),
        };
        let state = polling(0).on(still(), 3);
        assert_eq!(state, polling(1));
        let state = state.on(still(), 3).on(still(), 3);
        assert_eq!(
            state,
            DeletionState::TimedOut {
                attempts: 3,
                last_status: Some("DELETING".into())
            }
        );
    }

    #[test]
    fn failed_status_ends_polling() {
        let state = polling(1).on(
            DeletionEvent::StillExists {
                status: STATUS_FAILED.into(),
            },
            60,
        );
        assert!(matches!(
            state,
            DeletionState::Failed(ApiError::Service { ref code, .. }) if code == "DeletionFailed"
        ));
    }

    #[test]
    fn describe_not_found_completes() {
        let state = polling(2).on(DeletionEvent::DescribeNotFound, 3);
        assert_eq!(state, DeletionState::Deleted { already_gone: false });
    }

    #[test]
    fn unexpected_error_fails_from_any_state() {
        let err = ApiError::Service {
            code: "ValidationException".into(),
            message: "bad".into(),
        };
        for state in [
            DeletionState::Exists,
            DeletionState::DeleteRequested { retries: 0 },
            polling(1),
        ] {
            assert_eq!(
                state.on(DeletionEvent::Error(err.clone()), 5),
                DeletionState::Failed(err.clone())
            );
        }
    }

    #[test]
    fn terminal_states_absorb_events() {
        let done = DeletionState::Deleted { already_gone: false };
        assert_eq!(done.clone().on(DeletionEvent::DeleteIssued, 1), done);
        assert!(done.is_terminal());
    }

    #[test]
    fn retryable_delete_gives_up_after_budget() {
        let state = DeletionState::DeleteRequested { retries: 1 }
            .on(DeletionEvent::Retryable(ApiError::Throttled), 2);
        assert_eq!(state, DeletionState::Failed(ApiError::Throttled));
    }

    #[test]
    fn retryable_poll_keeps_last_status() {
        let state = polling(0).on(DeletionEvent::Retryable(ApiError::Throttled), 5);
        assert_eq!(state, polling(1));
    }

    #[test]
    fn fatal_only_for_transport_failures() {
        let transport = DeleteError::Failed {
            id: "a".into(),
            kind: ResourceKind::Asset,
            source: ApiError::Transport {
                message: "reset".into(),
            },
        };
        assert!(transport.is_fatal());

        let timeout = DeleteError::from(DeletionTimeoutError {
            id: "a".into(),
            kind: ResourceKind::Asset,
            last_status: "DELETING".into(),
            attempts: 3,
        });
        assert!(!timeout.is_fatal());
    }
}
