pub mod boot;
pub mod migrate;
pub mod shutdown;
pub mod signal;

pub use boot::{BootError, BootHandoff, BootSequencer, MigrationOutcome, Migrator};
pub use migrate::ProcessMigrator;
pub use shutdown::{
    Environment, Listener, ShutdownSequencer, ShutdownTrigger, Storage, Subscription,
};
