//! Child-process migration runner.
//!
//! The migration tool is invoked as an independent process with the parent's
//! environment and standard streams, so its output lands in the operator's
//! terminal alongside the service logs. Its contract with the sequencer is
//! exit-status only: zero is success, anything else is failure. The tool's
//! internal mechanics are not this crate's concern.

use tokio::process::Command;
use tracing::warn;

use crate::boot::{MigrationOutcome, Migrator};

/// Runs a configured argv as the migration unit.
#[derive(Debug, Clone)]
pub struct ProcessMigrator {
    argv: Vec<String>,
}

impl ProcessMigrator {
    /// Build from an argv, e.g. `["paceline-migrate"]`. An empty argv is
    /// reported as a launch failure at run time rather than a panic.
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// Parse a single command string by splitting on whitespace.
    pub fn from_command(command: &str) -> Self {
        Self::new(command.split_whitespace().map(str::to_owned).collect())
    }
}

impl Migrator for ProcessMigrator {
    async fn run(self) -> MigrationOutcome {
        let Some((program, args)) = self.argv.split_first() else {
            warn!("migration command is empty");
            return MigrationOutcome::Failure(None);
        };

        // stdin/stdout/stderr and the environment are inherited by default.
        let status = match Command::new(program).args(args).status().await {
            Ok(status) => status,
            Err(err) => {
                warn!(command = %program, error = %err, "failed to spawn migration");
                return MigrationOutcome::Failure(None);
            }
        };

        if status.success() {
            MigrationOutcome::Success
        } else {
            MigrationOutcome::Failure(status.code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_exit_is_success() {
        let outcome = ProcessMigrator::from_command("sh -c true").run().await;
        assert_eq!(outcome, MigrationOutcome::Success);
    }

    #[tokio::test]
    async fn nonzero_exit_reports_the_code() {
        let outcome = ProcessMigrator::new(vec!["sh".into(), "-c".into(), "exit 3".into()])
            .run()
            .await;
        assert_eq!(outcome, MigrationOutcome::Failure(Some(3)));
    }

    #[tokio::test]
    async fn unspawnable_command_is_a_launch_failure() {
        let outcome = ProcessMigrator::from_command("__paceline_no_such_binary__")
            .run()
            .await;
        assert_eq!(outcome, MigrationOutcome::Failure(None));
    }

    #[tokio::test]
    async fn empty_command_is_a_launch_failure() {
        let outcome = ProcessMigrator::from_command("   ").run().await;
        assert_eq!(outcome, MigrationOutcome::Failure(None));
    }
}
