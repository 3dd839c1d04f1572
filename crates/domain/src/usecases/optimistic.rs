//! Optimistic transaction: apply locally, call remote, roll back on failure
//!
//! Every mutation kind goes through [`run`] so failure handling cannot drift
//! between them. Each apply bumps the record's generation; a rollback only
//! happens when no newer optimistic state was applied to the same record
//! meanwhile and the owning state has not been torn down.

use std::future::Future;
use std::sync::Mutex;

use crate::lock;

/// State that tracks per-record generations and teardown
pub trait Versioned {
    /// Increment and return the generation of `key`
    fn bump(&mut self, key: &str) -> u64;

    /// Current generation of `key` (0 if never touched)
    fn generation(&self, key: &str) -> u64;

    /// True once the owner has been torn down
    fn is_closed(&self) -> bool;
}

/// Lifecycle of one optimistic mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Applied,
    Confirmed,
    RolledBack,
}

/// How an optimistic transaction ended
#[derive(Debug, PartialEq)]
pub enum TxOutcome<T, E> {
    /// Remote write succeeded; local state already matches
    Confirmed(T),
    /// Remote write failed and the local change was undone
    RolledBack(E),
    /// Remote write failed, but a newer local change owns the record now
    Superseded(E),
    /// The state was torn down; nothing was applied or undone
    Cancelled,
}

impl<T, E> TxOutcome<T, E> {
    pub fn state(&self) -> TxState {
        match self {
            Self::Confirmed(_) => TxState::Confirmed,
            Self::RolledBack(_) | Self::Superseded(_) => TxState::RolledBack,
            Self::Cancelled => TxState::Idle,
        }
    }

    pub fn into_result(self) -> Option<Result<T, E>> {
        match self {
            Self::Confirmed(value) => Some(Ok(value)),
            Self::RolledBack(error) | Self::Superseded(error) => Some(Err(error)),
            Self::Cancelled => None,
        }
    }
}

/// Run one optimistic transaction against `state` for record `key`
///
/// `apply` runs synchronously under the lock and returns the undo token that
/// `rollback` receives on failure. The lock is never held across `remote`.
pub async fn run<S, U, T, E, A, F, R>(
    state: &Mutex<S>,
    key: &str,
    apply: A,
    remote: F,
    rollback: R,
) -> TxOutcome<T, E>
where
    S: Versioned,
    A: FnOnce(&mut S) -> U,
    F: Future<Output = Result<T, E>>,
    R: FnOnce(&mut S, U),
{
    let (generation, undo) = {
        let mut guard = lock(state);
        if guard.is_closed() {
            return TxOutcome::Cancelled;
        }
        let generation = guard.bump(key);
        (generation, apply(&mut guard))
    };

    tracing::debug!(key = %key, generation, state = ?TxState::Applied, "Optimistic change applied");

    match remote.await {
        Ok(value) => {
            tracing::debug!(
                key = %key,
                generation,
                state = ?TxState::Confirmed,
                "Remote confirmed"
            );
            TxOutcome::Confirmed(value)
        }
        Err(error) => {
            let mut guard = lock(state);
            if guard.is_closed() {
                tracing::debug!(key = %key, generation, "Remote failed after teardown, ignoring");
                return TxOutcome::Cancelled;
            }
            if guard.generation(key) != generation {
                tracing::debug!(
                    key = %key,
                    generation,
                    current = guard.generation(key),
                    "Remote failed but newer state exists, skipping rollback"
                );
                return TxOutcome::Superseded(error);
            }
            rollback(&mut guard, undo);
            tracing::debug!(key = %key, generation, state = ?TxState::RolledBack, "Rolled back");
            TxOutcome::RolledBack(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct Counter {
        value: i64,
        generations: HashMap<String, u64>,
        closed: bool,
    }

    impl Versioned for Counter {
        fn bump(&mut self, key: &str) -> u64 {
            let generation = self.generations.entry(key.to_string()).or_insert(0);
            *generation += 1;
            *generation
        }

        fn generation(&self, key: &str) -> u64 {
            self.generations.get(key).copied().unwrap_or(0)
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    fn increment(state: &mut Counter) -> i64 {
        state.value += 1;
        1
    }

    fn undo(state: &mut Counter, delta: i64) {
        state.value -= delta;
    }

    #[tokio::test]
    async fn confirmed_keeps_applied_state() {
        let state = Mutex::new(Counter::default());
        let outcome = run(&state, "a", increment, async { Ok::<_, String>(()) }, undo).await;

        assert_eq!(outcome, TxOutcome::Confirmed(()));
        assert_eq!(state.lock().unwrap().value, 1);
    }

    #[tokio::test]
    async fn failure_rolls_back() {
        let state = Mutex::new(Counter::default());
        let outcome = run(
            &state,
            "a",
            increment,
            async { Err::<(), _>("boom".to_string()) },
            undo,
        )
        .await;

        assert_eq!(outcome, TxOutcome::RolledBack("boom".to_string()));
        assert_eq!(state.lock().unwrap().value, 0);
    }

    #[tokio::test]
    async fn newer_generation_blocks_rollback() {
        let state = Mutex::new(Counter::default());
        let (tx, rx) = oneshot::channel::<Result<(), String>>();

        let first = run(
            &state,
            "a",
            increment,
            async move { rx.await.unwrap_or(Err("dropped".to_string())) },
            undo,
        );
        let second = async {
            tokio::task::yield_now().await;
            state.lock().unwrap().bump("a");
            tx.send(Err("boom".to_string())).unwrap();
        };

        let (outcome, ()) = tokio::join!(first, second);

        assert_eq!(outcome, TxOutcome::Superseded("boom".to_string()));
        assert_eq!(state.lock().unwrap().value, 1);
    }

    #[tokio::test]
    async fn closed_state_is_never_touched() {
        let state = Mutex::new(Counter {
            closed: true,
            ..Default::default()
        });
        let outcome = run(&state, "a", increment, async { Ok::<_, String>(()) }, undo).await;

        assert_eq!(outcome, TxOutcome::Cancelled);
        assert_eq!(state.lock().unwrap().value, 0);
    }

    #[tokio::test]
    async fn teardown_during_flight_skips_rollback() {
        let state = Mutex::new(Counter::default());
        let (tx, rx) = oneshot::channel::<Result<(), String>>();

        let first = run(
            &state,
            "a",
            increment,
            async move { rx.await.unwrap_or(Err("dropped".to_string())) },
            undo,
        );
        let teardown = async {
            tokio::task::yield_now().await;
            state.lock().unwrap().closed = true;
            tx.send(Err("boom".to_string())).unwrap();
        };

        let (outcome, ()) = tokio::join!(first, teardown);

        assert_eq!(outcome, TxOutcome::Cancelled);
        assert_eq!(state.lock().unwrap().value, 1);
    }
}
