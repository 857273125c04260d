use clap::{Parser, Subcommand};

use crate::{
    app,
    config::AppConfig,
    migrate::{self, MigrationStatus},
    seed::{self, SeedOptions},
    state::AppState,
};

#[derive(Parser, Debug)]
#[command(name = "sunshare")]
#[command(about = "Sunshare admin backend: API server, migrations and seed data")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Run the HTTP API")]
    Serve {
        #[arg(long, help = "Apply pending migrations before listening")]
        migrate: bool,
    },

    #[command(about = "Apply, revert or inspect SQL migrations")]
    Migrate {
        #[command(subcommand)]
        cmd: MigrateCommands,
    },

    #[command(about = "Insert roles, the super admin, locations and default settings")]
    Seed {
        #[arg(long, help = "Also create demo users")]
        demo: bool,

        #[arg(long, help = "Replace passwords of users that already exist")]
        force_password: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum MigrateCommands {
    #[command(about = "Apply pending migrations")]
    Up {
        #[arg(long, help = "Apply at most this many files")]
        limit: Option<usize>,
    },

    #[command(about = "Revert the most recent migrations")]
    Down {
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },

    #[command(about = "List applied, pending, missing and drifted migrations")]
    Status,
}

fn print_status(status: &MigrationStatus) {
    println!("applied ({}):", status.applied.len());
    for m in &status.applied {
        let drift = if status.drifted.contains(&m.filename) {
            "  [checksum changed]"
        } else {
            ""
        };
        println!("  {}  {}{}", m.applied_at, m.filename, drift);
    }
    println!("pending ({}):", status.pending.len());
    for name in &status.pending {
        println!("  {name}");
    }
    if !status.missing.is_empty() {
        println!("missing on disk ({}):", status.missing.len());
        for name in &status.missing {
            println!("  {name}");
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let state = AppState::init(config).await?;
    let migrator = || migrate::postgres(state.db.clone(), &state.config.migrations_dir);

    match cli.command.unwrap_or(Commands::Serve { migrate: false }) {
        Commands::Serve { migrate } => {
            if migrate {
                let applied = migrator().up(None).await?;
                tracing::info!(count = applied.len(), "startup migrations done");
            }
            app::serve(state).await
        }
        Commands::Migrate { cmd } => match cmd {
            MigrateCommands::Up { limit } => {
                let applied = migrator().up(limit).await?;
                for name in &applied {
                    println!("applied {name}");
                }
                println!("{} migration(s) applied", applied.len());
                Ok(())
            }
            MigrateCommands::Down { steps } => {
                let report = migrator().down(steps).await?;
                for name in &report.reverted {
                    println!("reverted {name}");
                }
                if let Some(name) = &report.stopped_at {
                    println!("stopped at {name}: no rollback file");
                }
                Ok(())
            }
            MigrateCommands::Status => {
                print_status(&migrator().status().await?);
                Ok(())
            }
        },
        Commands::Seed {
            demo,
            force_password,
        } => {
            let report = seed::run(
                &state.db,
                &state.config.seed,
                SeedOptions {
                    demo,
                    force_password,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_migrate_flags() {
        let cli = Cli::try_parse_from(["sunshare", "migrate", "up", "--limit", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Migrate {
                cmd: MigrateCommands::Up { limit: Some(2) }
            })
        ));

        let cli = Cli::try_parse_from(["sunshare", "migrate", "down"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Migrate {
                cmd: MigrateCommands::Down { steps: 1 }
            })
        ));
    }

    #[test]
    fn parses_seed_flags() {
        let cli = Cli::try_parse_from(["sunshare", "seed", "--demo", "--force-password"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Seed {
                demo: true,
                force_password: true
            })
        ));
    }

    #[test]
    fn bare_invocation_defaults_to_serve() {
        let cli = Cli::try_parse_from(["sunshare"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
