//! Boot sequencing: settle the schema migration, then make the service
//! reachable.
//!
//! The migration runs as an independent unit raced against a startup ceiling.
//! Whichever settles first moves the sequencer on to starting the service; a
//! migration still running at the ceiling is left to finish on its own and
//! its eventual outcome is only logged. A failed migration is a loud
//! operational signal but never blocks the service from coming up — a
//! failed-but-idempotent migration costs less than a deployment that never
//! becomes reachable. Do not tighten this into fail-fast.
//!
//! Nothing on this path is retried. The only fatal condition is the service
//! itself failing to start.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Default ceiling on how long boot may wait for the migration to settle.
pub const DEFAULT_BOOT_CEILING: Duration = Duration::from_secs(30);

/// How the migration settled, as observed by the boot sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Exit status zero.
    Success,
    /// Non-zero exit status, or `None` when the process could not be spawned
    /// at all (or was killed by a signal).
    Failure(Option<i32>),
    /// The startup ceiling elapsed before the migration settled. The
    /// migration keeps running detached; only the sequencer stops waiting.
    TimedOut,
}

/// Boot-time states. Owned exclusively by the sequencer; no other component
/// observes or mutates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Idle,
    MigrationRunning,
    MigrationSettled(MigrationOutcome),
    ServiceStarting,
    ServiceRunning,
    ServiceFailed,
}

/// A migration unit the sequencer can launch.
///
/// Implementations report an outcome and never raise: a launch failure is
/// `Failure(None)`. `TimedOut` is produced by the sequencer, never by a
/// migrator.
pub trait Migrator: Send + 'static {
    /// Run the migration to completion and report how it settled.
    fn run(self) -> impl Future<Output = MigrationOutcome> + Send;
}

#[derive(Debug, Error)]
pub enum BootError {
    /// The service itself could not start. The only fatal boot condition.
    #[error("failed to start service")]
    ServiceStart(#[source] anyhow::Error),
}

/// Result of a completed boot: the running service plus the migration
/// outcome the sequencer acted on.
#[derive(Debug)]
pub struct BootHandoff<T> {
    pub service: T,
    pub migration: MigrationOutcome,
}

/// One-shot boot driver. Construct, then [`run`](Self::run) exactly once per
/// process start.
pub struct BootSequencer {
    ceiling: Duration,
    state: BootState,
}

impl BootSequencer {
    pub fn new() -> Self {
        Self {
            ceiling: DEFAULT_BOOT_CEILING,
            state: BootState::Idle,
        }
    }

    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Drive the boot sequence: launch the migration, wait for it to settle
    /// or for the ceiling to fire, then invoke `start_service`.
    ///
    /// `start_service` is `FnOnce` and runs exactly once for every migration
    /// outcome — never zero times, never twice.
    pub async fn run<M, F, Fut, T>(
        mut self,
        migrator: M,
        start_service: F,
    ) -> Result<BootHandoff<T>, BootError>
    where
        M: Migrator,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.advance(BootState::MigrationRunning);
        let outcome = race_ceiling(migrator, self.ceiling).await;
        self.advance(BootState::MigrationSettled(outcome));

        self.advance(BootState::ServiceStarting);
        info!("service starting");
        match start_service().await {
            Ok(service) => {
                self.advance(BootState::ServiceRunning);
                Ok(BootHandoff {
                    service,
                    migration: outcome,
                })
            }
            Err(err) => {
                self.advance(BootState::ServiceFailed);
                Err(BootError::ServiceStart(err))
            }
        }
    }

    fn advance(&mut self, next: BootState) {
        debug!(from = ?self.state, to = ?next, "boot transition");
        self.state = next;
    }
}

impl Default for BootSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Launch the migration detached and wait for it to settle or for the
/// ceiling to fire, whichever comes first.
///
/// Past the ceiling the migration is deliberately not killed: interrupting a
/// schema migration mid-flight risks leaving storage in a worse state than
/// letting it finish unobserved. The spawned task logs the eventual outcome
/// either way; the send below goes nowhere once the sequencer has moved on.
async fn race_ceiling<M: Migrator>(migrator: M, ceiling: Duration) -> MigrationOutcome {
    let (tx, rx) = oneshot::channel();

    info!("migration started");
    tokio::spawn(async move {
        let outcome = migrator.run().await;
        match outcome {
            MigrationOutcome::Success => info!("migration succeeded"),
            MigrationOutcome::Failure(Some(code)) => error!(code, "migration failed"),
            MigrationOutcome::Failure(None) => error!("migration failed to launch"),
            MigrationOutcome::TimedOut => {}
        }
        let _ = tx.send(outcome);
    });

    tokio::select! {
        settled = rx => settled.unwrap_or(MigrationOutcome::Failure(None)),
        _ = sleep(ceiling) => {
            warn!(
                ceiling_secs = ceiling.as_secs_f64(),
                "migration still running at startup ceiling; starting service anyway"
            );
            MigrationOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Migrator that settles with a fixed outcome after a delay, flipping a
    /// completion flag so tests can observe that it was never killed.
    struct FakeMigrator {
        outcome: MigrationOutcome,
        delay: Duration,
        completed: Arc<AtomicBool>,
    }

    impl FakeMigrator {
        fn settling(outcome: MigrationOutcome, delay: Duration) -> (Self, Arc<AtomicBool>) {
            let completed = Arc::new(AtomicBool::new(false));
            (
                Self {
                    outcome,
                    delay,
                    completed: completed.clone(),
                },
                completed,
            )
        }
    }

    impl Migrator for FakeMigrator {
        async fn run(self) -> MigrationOutcome {
            sleep(self.delay).await;
            self.completed.store(true, Ordering::Relaxed);
            self.outcome
        }
    }

    fn counting_start(
        starts: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> std::future::Ready<anyhow::Result<()>> {
        let starts = starts.clone();
        move || {
            starts.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn fast_success_starts_service_once() {
        let (migrator, _) =
            FakeMigrator::settling(MigrationOutcome::Success, Duration::from_millis(10));
        let starts = Arc::new(AtomicUsize::new(0));

        let handoff = BootSequencer::new()
            .with_ceiling(Duration::from_millis(500))
            .run(migrator, counting_start(&starts))
            .await
            .unwrap();

        assert_eq!(handoff.migration, MigrationOutcome::Success);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_migration_still_starts_service() {
        let (migrator, _) = FakeMigrator::settling(
            MigrationOutcome::Failure(Some(1)),
            Duration::from_millis(10),
        );
        let starts = Arc::new(AtomicUsize::new(0));

        let handoff = BootSequencer::new()
            .with_ceiling(Duration::from_millis(500))
            .run(migrator, counting_start(&starts))
            .await
            .unwrap();

        assert_eq!(handoff.migration, MigrationOutcome::Failure(Some(1)));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ceiling_fires_and_migration_keeps_running() {
        let (migrator, completed) =
            FakeMigrator::settling(MigrationOutcome::Success, Duration::from_millis(100));
        let starts = Arc::new(AtomicUsize::new(0));

        let handoff = BootSequencer::new()
            .with_ceiling(Duration::from_millis(20))
            .run(migrator, counting_start(&starts))
            .await
            .unwrap();

        assert_eq!(handoff.migration, MigrationOutcome::TimedOut);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        // The service is already up; the detached migration settles later.
        assert!(!completed.load(Ordering::Relaxed));
        sleep(Duration::from_millis(150)).await;
        assert!(completed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn settled_before_ceiling_is_not_reported_as_timeout() {
        let (migrator, _) =
            FakeMigrator::settling(MigrationOutcome::Success, Duration::from_millis(10));
        let starts = Arc::new(AtomicUsize::new(0));

        let handoff = BootSequencer::new()
            .with_ceiling(Duration::from_millis(5_000))
            .run(migrator, counting_start(&starts))
            .await
            .unwrap();

        assert_ne!(handoff.migration, MigrationOutcome::TimedOut);
    }

    #[tokio::test]
    async fn service_start_failure_is_fatal() {
        let (migrator, _) =
            FakeMigrator::settling(MigrationOutcome::Success, Duration::from_millis(5));

        let result = BootSequencer::new()
            .with_ceiling(Duration::from_millis(500))
            .run(migrator, || {
                std::future::ready(Err::<(), _>(anyhow::anyhow!("bind failed")))
            })
            .await;

        assert!(matches!(result, Err(BootError::ServiceStart(_))));
    }
}
