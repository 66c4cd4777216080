//! Process-wide trigger plumbing: termination signals, panic escalation, and
//! background-task fault observation.
//!
//! Triggers from every source funnel into one channel owned by the caller,
//! so the lifecycle state stays in an explicitly constructed context instead
//! of ambient globals. An uncaught panic (synchronous fault) escalates to
//! shutdown because process state is no longer trustworthy; a failed
//! background task (the asynchronous analogue) is logged and the service
//! keeps running.

use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::shutdown::ShutdownTrigger;

/// Create the trigger channel shared by signal listeners and the panic hook.
pub fn trigger_channel() -> (
    mpsc::UnboundedSender<ShutdownTrigger>,
    mpsc::UnboundedReceiver<ShutdownTrigger>,
) {
    mpsc::unbounded_channel()
}

/// Register ctrl-c and (on unix) SIGTERM handlers, forwarding each receipt
/// as a trigger. Runs until the receiving side goes away.
pub fn spawn_signal_listener(tx: mpsc::UnboundedSender<ShutdownTrigger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let trigger = termination_signal().await;
            if tx.send(trigger).is_err() {
                break;
            }
        }
    })
}

/// Install a process-wide panic hook that logs the panic and submits it as a
/// shutdown trigger. The previous hook still runs, so backtraces are not
/// lost.
pub fn escalate_panics(tx: mpsc::UnboundedSender<ShutdownTrigger>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!(panic = %info, "uncaught panic; shutting down");
        let _ = tx.send(ShutdownTrigger::Fault);
        previous(info);
    }));
}

/// Observe a spawned task's result, logging failure without escalating.
pub fn monitor_background<T>(
    name: &'static str,
    handle: JoinHandle<anyhow::Result<T>>,
) -> JoinHandle<()>
where
    T: Send + 'static,
{
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                warn!(task = name, "background task failed: {err:#}")
            }
            Err(err) => warn!(task = name, error = %err, "background task aborted"),
        }
    })
}

/// Wait for the first termination trigger.
///
/// Later triggers are drained and logged so a repeated ctrl-c cannot queue a
/// second shutdown sequence: exactly one sequence, exactly one exit.
pub async fn await_first_trigger(
    mut rx: mpsc::UnboundedReceiver<ShutdownTrigger>,
) -> ShutdownTrigger {
    let trigger = rx.recv().await.unwrap_or(ShutdownTrigger::Fault);
    tokio::spawn(async move {
        while let Some(repeat) = rx.recv().await {
            info!(?repeat, "shutdown already in progress; ignoring trigger");
        }
    });
    trigger
}

async fn termination_signal() -> ShutdownTrigger {
    #[cfg(unix)]
    {
        tokio::select! {
            _ = ctrl_c() => ShutdownTrigger::Interrupt,
            _ = terminate() => ShutdownTrigger::Terminate,
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        ShutdownTrigger::Interrupt
    }
}

async fn ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(?err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(err) => {
            warn!(?err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}
