//! The `migrate` command: run the migration in the foreground and mirror its
//! exit status, so operators and CI can invoke it without the serve path.

use paceline_lifecycle::boot::{MigrationOutcome, Migrator};
use paceline_lifecycle::migrate::ProcessMigrator;

pub fn run(command: &str) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(ProcessMigrator::from_command(command).run());

    match outcome {
        MigrationOutcome::Success => Ok(()),
        MigrationOutcome::Failure(Some(code)) => std::process::exit(code),
        _ => std::process::exit(1),
    }
}
