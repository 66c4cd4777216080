//! Shutdown sequencing: drain, ordered cleanup, bounded-time exit.
//!
//! A termination trigger moves the service through
//! `Running → Draining → CleaningUp → Exited`. New connections stop being
//! accepted before any resource is torn down, and storage is disconnected
//! only after the push subscription has been dealt with. A deadline guard
//! races the whole sequence; once it fires the graceful paths have had their
//! full budget and the process is forced out with a non-zero code so a deploy
//! pipeline never hangs waiting on a stuck cleanup step.
//!
//! States are monotonic: there is no path back to `Running`, and a second
//! trigger while shutdown is in progress is ignored (see
//! [`crate::signal::await_first_trigger`]).

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Default budget for drain + cleanup before the process is forced out.
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// Deployment environment, controlling which cleanup steps run.
///
/// Production push subscriptions are provisioned out of band and deliberately
/// long-lived; only non-production environments tear theirs down on every
/// restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!(
                "unknown environment '{other}': expected development, staging, or production"
            )),
        }
    }
}

/// What set the shutdown in motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// Interrupt signal (ctrl-c).
    Interrupt,
    /// Terminate signal (SIGTERM).
    Terminate,
    /// Uncaught synchronous fault; process state is no longer reliable.
    Fault,
}

/// Shutdown states. Monotonic: transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    CleaningUp,
    ForcedExit,
    Exited(i32),
}

impl ShutdownState {
    fn rank(self) -> u8 {
        match self {
            ShutdownState::Running => 0,
            ShutdownState::Draining => 1,
            ShutdownState::CleaningUp => 2,
            ShutdownState::ForcedExit | ShutdownState::Exited(_) => 3,
        }
    }
}

fn advance(state: &mut ShutdownState, next: ShutdownState) {
    if next.rank() < state.rank() {
        warn!(from = ?state, to = ?next, "ignoring backwards shutdown transition");
        return;
    }
    debug!(from = ?state, to = ?next, "shutdown transition");
    *state = next;
}

/// The listening transport. `drain` must stop accepting new connections
/// immediately and resolve once in-flight work has finished — the transport's
/// native graceful primitive, not a blunt kill.
pub trait Listener: Send {
    fn drain(self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// The storage layer. `disconnect` settles once connections are released.
pub trait Storage: Send {
    fn disconnect(self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// An externally-registered push subscription. `release` settles once the
/// provider has dropped the callback registration.
pub trait Subscription: Send {
    fn release(self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// One-shot shutdown driver. Construct when a trigger is accepted, then
/// [`run`](Self::run) exactly once; the return value is the process exit
/// code.
pub struct ShutdownSequencer<L, W, S> {
    listener: L,
    subscription: W,
    storage: S,
    environment: Environment,
    deadline: Duration,
}

impl<L, W, S> ShutdownSequencer<L, W, S>
where
    L: Listener,
    W: Subscription,
    S: Storage,
{
    pub fn new(listener: L, subscription: W, storage: S, environment: Environment) -> Self {
        Self {
            listener,
            subscription,
            storage,
            environment,
            deadline: DEFAULT_SHUTDOWN_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run drain + cleanup for an accepted trigger, racing the deadline
    /// guard. Exactly one of the two branches wins.
    ///
    /// Exit codes: 0 clean; 1 drain error, cleanup-step error, or deadline
    /// exceeded.
    pub async fn run(self, trigger: ShutdownTrigger) -> i32 {
        info!(?trigger, "shutdown requested");
        let deadline = self.deadline;

        tokio::select! {
            code = self.sequence() => code,
            _ = sleep(deadline) => {
                error!(
                    deadline_secs = deadline.as_secs_f64(),
                    "shutdown deadline exceeded; forcing exit"
                );
                1
            }
        }
    }

    async fn sequence(self) -> i32 {
        let mut state = ShutdownState::Running;

        advance(&mut state, ShutdownState::Draining);
        if let Err(err) = self.listener.drain().await {
            // Connection state is unreliable now; skip cleanup entirely.
            error!("error while draining connections: {err:#}");
            return 1;
        }
        info!("connections drained");

        advance(&mut state, ShutdownState::CleaningUp);
        if self.environment.is_production() {
            info!("production environment; leaving push subscription registered");
        } else if let Err(err) = self.subscription.release().await {
            error!("failed to release push subscription: {err:#}");
            return 1;
        }

        if let Err(err) = self.storage.disconnect().await {
            error!("failed to disconnect storage: {err:#}");
            return 1;
        }
        info!("storage disconnected");

        advance(&mut state, ShutdownState::Exited(0));
        info!("shutdown complete");
        0
    }
}
