pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "wedmatch",
    about = "Wedmatch operator CLI",
    long_about = "Manage the wedmatch database, inspect configuration, and query vendor recommendations.",
    after_help = "Examples:\n  wedmatch migrate\n  wedmatch seed\n  wedmatch doctor --json\n  wedmatch recommend W-AUSTIN-001 --category Photography --limit 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset (weddings, preferences, vendors)")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, database connectivity, and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Compute or fetch cached vendor recommendations for a wedding")]
    Recommend {
        wedding_id: String,
        #[arg(long, help = "Restrict to one vendor category, e.g. Photography")]
        category: Option<String>,
        #[arg(long, help = "Maximum number of recommendations to return")]
        limit: Option<i64>,
        #[arg(long, help = "Bypass the cache and recompute")]
        refresh: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Recommend { wedding_id, category, limit, refresh } => {
            commands::recommend::run(commands::recommend::RecommendArgs {
                wedding_id,
                category,
                limit,
                refresh,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
