//! Remote Resource API abstraction
//!
//! Adapters for a concrete control-plane API implement these traits; the
//! helpers here glue them to the reconciler and the poller.

use crate::error::{ApiError, DuplicateKeyError, Result};
use crate::item::Keyed;
use crate::poller::{
    Clock, PollSettings, PollableOperation, TerminalStates, TokioClock, await_convergence,
};
use crate::reconcile::{Collection, Delta, reconcile};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use tokio_util::sync::CancellationToken;

/// A collection attached to a remote object with separate add/remove semantics
#[async_trait]
pub trait RemoteCollection<T>: Send + Sync
where
    T: Send + Sync,
{
    /// Fetch the currently observed items
    async fn observe(&self) -> std::result::Result<Vec<T>, ApiError>;

    /// Apply a delta; `add` and `remove` never share an item
    async fn mutate(&self, add: &[T], remove: &[T]) -> std::result::Result<(), ApiError>;
}

/// A remote mutation that completes asynchronously
#[async_trait]
pub trait AsyncOperationApi: Send + Sync {
    type Spec: Send + Sync;
    type Handle: Send + Sync;
    type Status: Eq + Hash + fmt::Display + Send;

    /// Name used in logs and errors
    fn describe(&self, spec: &Self::Spec) -> String;

    /// How this API's statuses map onto success, failure and in-progress
    fn terminal_states(&self) -> TerminalStates<Self::Status>;

    async fn trigger(&self, spec: &Self::Spec) -> std::result::Result<Self::Handle, ApiError>;

    async fn status(&self, handle: &Self::Handle) -> std::result::Result<Self::Status, ApiError>;
}

/// Observe, reconcile against `desired` and send only the delta
///
/// Returns the delta that was applied (empty when already converged).
pub async fn converge_collection<T, A>(api: &A, desired: &Collection<T>) -> Result<Delta<T>>
where
    T: Keyed + Clone + PartialEq + Send + Sync,
    A: RemoteCollection<T> + ?Sized,
{
    let observed = api.observe().await?;
    let observed = Collection::try_from_items(observed)
        .map_err(|e: DuplicateKeyError| e.in_side("observed"))?;

    let delta = reconcile(desired, &observed);
    if delta.is_empty() {
        tracing::debug!("Collection already converged");
        return Ok(delta);
    }

    tracing::info!(
        add = delta.to_add.len(),
        remove = delta.to_remove.len(),
        "Applying collection delta"
    );
    api.mutate(&delta.to_add, &delta.to_remove).await?;
    Ok(delta)
}

/// Trigger an asynchronous operation and wait for it to reach a terminal status
///
/// The trigger is issued exactly once; only the status probe is repeated.
pub async fn run_to_convergence<A>(
    api: &A,
    spec: &A::Spec,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<A::Status>
where
    A: AsyncOperationApi + ?Sized,
{
    let name = api.describe(spec);
    let handle = api.trigger(spec).await?;
    let accepted_at = TokioClock.now();
    tracing::info!(operation = %name, "Operation accepted");

    let op = PollableOperation::new(name, api.terminal_states(), || api.status(&handle))
        .with_settings(settings)
        .started_at(accepted_at);

    Ok(await_convergence(op, cancel).await?)
}

/// Run `create`; if the object already exists fall back to `set`
///
/// Only [`ApiError::AlreadyExists`] triggers the fallback. The fallback is a
/// different mutation, not a retry of `create`.
pub async fn create_or_set<T, C, CF, S, SF>(
    what: &str,
    create: C,
    set: S,
) -> std::result::Result<T, ApiError>
where
    C: FnOnce() -> CF,
    CF: Future<Output = std::result::Result<T, ApiError>>,
    S: FnOnce() -> SF,
    SF: Future<Output = std::result::Result<T, ApiError>>,
{
    match create().await {
        Err(ApiError::AlreadyExists(reason)) => {
            tracing::warn!(target_object = %what, %reason, "Already exists, setting value instead");
            set().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConvergenceError, Error};
    use crate::item::Label;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeLabels {
        items: Mutex<Vec<Label>>,
        mutations: AtomicU32,
    }

    #[async_trait]
    impl RemoteCollection<Label> for FakeLabels {
        async fn observe(&self) -> std::result::Result<Vec<Label>, ApiError> {
            Ok(self.items.lock().unwrap().clone())
        }

        async fn mutate(
            &self,
            add: &[Label],
            remove: &[Label],
        ) -> std::result::Result<(), ApiError> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            let mut items = self.items.lock().unwrap();
            items.retain(|l| !remove.contains(l));
            items.extend_from_slice(add);
            Ok(())
        }
    }

    fn desired(pairs: &[(&str, &str)]) -> Collection<Label> {
        Collection::try_from_items(pairs.iter().map(|(k, v)| Label::new(*k, *v))).unwrap()
    }

    #[tokio::test]
    async fn test_converge_collection_sends_only_delta() {
        let api = FakeLabels::default();
        *api.items.lock().unwrap() = vec![Label::new("team", "x"), Label::new("owner", "y")];

        let target = desired(&[("env", "prod"), ("team", "x")]);
        let delta = converge_collection(&api, &target).await.unwrap();
        assert_eq!(delta.to_add, vec![Label::new("env", "prod")]);
        assert_eq!(delta.to_remove, vec![Label::new("owner", "y")]);

        let observed = Collection::try_from_items(api.observe().await.unwrap()).unwrap();
        assert_eq!(observed, target);

        // second apply is a no-op
        let again = converge_collection(&api, &target).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(api.mutations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_converge_collection_rejects_duplicate_observed() {
        let api = FakeLabels::default();
        *api.items.lock().unwrap() = vec![Label::new("env", "a"), Label::new("env", "b")];

        let err = converge_collection(&api, &desired(&[])).await.unwrap_err();
        match err {
            Error::DuplicateKey(e) => assert_eq!(e.side, "observed"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.mutations.load(Ordering::SeqCst), 0);
    }

    struct FakeOnboarding {
        triggers: AtomicU32,
        probes: AtomicU32,
        syncing_probes: u32,
    }

    #[async_trait]
    impl AsyncOperationApi for FakeOnboarding {
        type Spec = String;
        type Handle = String;
        type Status = String;

        fn describe(&self, spec: &String) -> String {
            format!("onboard {}", spec)
        }

        fn terminal_states(&self) -> TerminalStates<String> {
            TerminalStates::new()
                .succeeded(["Connected".to_string()])
                .failed(["Failed".to_string()])
                .in_progress(["Syncing".to_string()])
        }

        async fn trigger(&self, spec: &String) -> std::result::Result<String, ApiError> {
            self.triggers.fetch_add(1, Ordering::SeqCst);
            Ok(format!("op-{}", spec))
        }

        async fn status(&self, _handle: &String) -> std::result::Result<String, ApiError> {
            let n = self.probes.fetch_add(1, Ordering::SeqCst);
            if n < self.syncing_probes {
                Ok("Syncing".to_string())
            } else {
                Ok("Connected".to_string())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_to_convergence_triggers_once() {
        let api = FakeOnboarding {
            triggers: AtomicU32::new(0),
            probes: AtomicU32::new(0),
            syncing_probes: 3,
        };
        let settings = PollSettings::default().with_interval(Duration::from_millis(10));

        let cancel = CancellationToken::new();
        let status = run_to_convergence(&api, &"www".to_string(), settings, &cancel)
            .await
            .unwrap();
        assert_eq!(status, "Connected");
        assert_eq!(api.triggers.load(Ordering::SeqCst), 1);
        assert_eq!(api.probes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_to_convergence_surfaces_timeout() {
        let api = FakeOnboarding {
            triggers: AtomicU32::new(0),
            probes: AtomicU32::new(0),
            syncing_probes: u32::MAX,
        };
        let settings = PollSettings::default()
            .with_interval(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(3));

        let cancel = CancellationToken::new();
        let err = run_to_convergence(&api, &"www".to_string(), settings, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Convergence(ConvergenceError::TimedOut { .. })
        ));
        assert_eq!(api.triggers.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_or_set_falls_back_on_conflict() {
        let sets = AtomicU32::new(0);
        let result = create_or_set(
            "label env",
            || async { Err::<&str, _>(ApiError::AlreadyExists("env".to_string())) },
            || async {
                sets.fetch_add(1, Ordering::SeqCst);
                Ok("set")
            },
        )
        .await;
        assert_eq!(result.unwrap(), "set");
        assert_eq!(sets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_or_set_propagates_other_errors() {
        let sets = AtomicU32::new(0);
        let result = create_or_set(
            "label env",
            || async {
                Err::<&str, _>(ApiError::Status {
                    code: 500,
                    message: "boom".to_string(),
                })
            },
            || async {
                sets.fetch_add(1, Ordering::SeqCst);
                Ok("set")
            },
        )
        .await;
        assert!(matches!(result, Err(ApiError::Status { code: 500, .. })));
        assert_eq!(sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_or_set_skips_fallback_on_success() {
        let result = create_or_set(
            "label env",
            || async { Ok::<_, ApiError>("created") },
            || async { Ok("set") },
        )
        .await;
        assert_eq!(result.unwrap(), "created");
    }
}
