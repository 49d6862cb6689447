//! Database seeding CLI

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use school_events::{
    config::Settings,
    database::{
        create_pool, run_migrations,
        seed::{SeedTarget, Seeder},
        DatabaseService, PoolConfig,
    },
    utils::logging,
};

#[derive(Parser)]
#[command(name = "db", about = "Seed the School Events database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the given data set (default: all)
    Seed {
        #[arg(value_enum, default_value_t = SeedTarget::All)]
        target: SeedTarget,
    },
    /// Admin, users, events, demo and reservations
    All,
    /// Administrator accounts
    Admin,
    /// The three sample events
    Events,
    /// Organizer, analyst and school representatives
    Users,
    /// Upcoming demo events
    Demo,
    /// Reservations and waiting list entries on demo dates
    Reservations,
}

impl From<Commands> for SeedTarget {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Seed { target } => target,
            Commands::All => SeedTarget::All,
            Commands::Admin => SeedTarget::Admin,
            Commands::Events => SeedTarget::Events,
            Commands::Users => SeedTarget::Users,
            Commands::Demo => SeedTarget::Demo,
            Commands::Reservations => SeedTarget::Reservations,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new().context("failed to load settings")?;
    let _guard = logging::init_logging(&settings.logging)?;

    let pool = create_pool(&PoolConfig::from(&settings)).await?;
    run_migrations(&pool).await?;

    let target = SeedTarget::from(cli.command);
    info!(?target, "Seeding database");
    Seeder::new(DatabaseService::new(pool), settings)?.run(target).await?;
    info!("Seeding finished");
    Ok(())
}
