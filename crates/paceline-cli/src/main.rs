mod cmd;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "paceline",
    about = "Activity-sync service with sequenced boot and shutdown",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations, serve until a termination signal, then drain and exit
    Serve(cmd::serve::ServeArgs),

    /// Run the schema migration in the foreground and exit with its status
    Migrate {
        /// Migration command (whitespace-separated argv)
        #[arg(long, env = "PACELINE_MIGRATE_CMD", default_value = "paceline-migrate")]
        command: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Serve(args) => cmd::serve::run(args),
        Commands::Migrate { command } => cmd::migrate::run(&command),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
