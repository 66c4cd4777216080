//! The `serve` command: the whole lifecycle of one deployment.
//!
//! Boot sequencer (migration raced against the ceiling, then bind) hands off
//! to the running server; the first termination trigger hands off to the
//! shutdown sequencer; the process exit code is whatever the sequencer
//! decides. If the server stops on its own, its result becomes the exit
//! status directly.

use std::process;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::{error, info};

use paceline_lifecycle::boot::BootSequencer;
use paceline_lifecycle::migrate::ProcessMigrator;
use paceline_lifecycle::shutdown::{Environment, ShutdownSequencer};
use paceline_lifecycle::signal;
use paceline_server::state::AppState;
use paceline_server::storage::Database;
use paceline_server::webhook::PushSubscription;
use paceline_server::ServiceHandle;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "PACELINE_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Postgres connection URL
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://paceline@localhost/paceline"
    )]
    database_url: String,

    /// Migration command (whitespace-separated argv)
    #[arg(long, env = "PACELINE_MIGRATE_CMD", default_value = "paceline-migrate")]
    migrate_command: String,

    /// Deployment environment: development, staging, production
    #[arg(long, env = "PACELINE_ENV", default_value = "development")]
    environment: Environment,

    /// Seconds to wait for the migration before starting the service anyway
    #[arg(long, env = "PACELINE_BOOT_CEILING", default_value = "30")]
    boot_ceiling_secs: u64,

    /// Seconds allowed for drain + cleanup before the process is forced out
    #[arg(long, env = "PACELINE_SHUTDOWN_DEADLINE", default_value = "10")]
    shutdown_deadline_secs: u64,

    /// Activity provider push-subscription endpoint
    #[arg(
        long,
        env = "PACELINE_PUSH_ENDPOINT",
        default_value = "https://api.activity.example/push_subscriptions"
    )]
    push_endpoint: String,

    /// Push subscription id registered with the provider
    #[arg(long, env = "PACELINE_PUSH_SUBSCRIPTION_ID", default_value = "paceline-dev")]
    push_subscription_id: String,

    /// Provider access token
    #[arg(long, env = "PACELINE_PUSH_TOKEN", default_value = "", hide_env_values = true)]
    push_token: String,

    /// Public callback URL delivered to the provider
    #[arg(
        long,
        env = "PACELINE_CALLBACK_URL",
        default_value = "http://localhost:8080/api/webhooks/activity"
    )]
    callback_url: String,
}

pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        let environment = args.environment;

        // All trigger sources funnel into one channel: signals and the panic
        // hook (synchronous faults escalate; background-task faults only log).
        let (trigger_tx, trigger_rx) = signal::trigger_channel();
        signal::escalate_panics(trigger_tx.clone());
        signal::spawn_signal_listener(trigger_tx);

        let db = Database::connect_lazy(&args.database_url).context("invalid database URL")?;
        let subscription = PushSubscription::new(
            args.push_endpoint,
            args.push_subscription_id,
            args.push_token,
            args.callback_url,
        );

        let migrator = ProcessMigrator::from_command(&args.migrate_command);
        let state = AppState::new(db.clone());
        let bind = args.bind;

        let handoff = BootSequencer::new()
            .with_ceiling(Duration::from_secs(args.boot_ceiling_secs))
            .run(migrator, || ServiceHandle::start(&bind, state))
            .await
            .context("boot failed")?;
        let mut service = handoff.service;

        if environment.is_production() {
            info!("production environment; push subscription managed out of band");
        } else {
            let sub = subscription.clone();
            signal::monitor_background(
                "push-subscription-register",
                tokio::spawn(async move { sub.register().await }),
            );
        }

        let trigger = tokio::select! {
            trigger = signal::await_first_trigger(trigger_rx) => trigger,
            stopped = service.stopped() => {
                // In-process analogue of propagating a child service's exit
                // status: the server's own result decides the host's code.
                match stopped {
                    Ok(()) => {
                        info!("server stopped");
                        process::exit(0);
                    }
                    Err(err) => {
                        error!("server failed: {err:#}");
                        process::exit(1);
                    }
                }
            }
        };

        let code = ShutdownSequencer::new(service, subscription, db, environment)
            .with_deadline(Duration::from_secs(args.shutdown_deadline_secs))
            .run(trigger)
            .await;
        process::exit(code);
    })
}
