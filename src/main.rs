use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

use cli::event::EventKind;

#[derive(Parser)]
#[command(name = "studyquest")]
#[command(about = "StudyQuest - XP, levels, streaks and achievements for learning activity")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.studyquest/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create the database
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Record a learning event and apply XP, streak and achievements
    Event {
        /// Student the event belongs to
        student: String,

        /// Kind of learning activity
        #[arg(value_enum)]
        kind: EventKind,

        /// Activity date in the student's timezone (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Correct answers (session)
        #[arg(long, default_value_t = 0)]
        correct: u32,

        /// Attempted answers (session)
        #[arg(long, default_value_t = 0)]
        attempted: u32,

        /// The flashcard was answered incorrectly
        #[arg(long)]
        wrong: bool,

        /// Goal id (goal)
        #[arg(long)]
        goal: Option<String>,

        /// Subject of the session
        #[arg(long)]
        subject: Option<String>,

        /// Fixed base XP instead of the configured amount
        #[arg(long, allow_negative_numbers = true)]
        xp: Option<i64>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show level, XP and streak of a student
    Stats {
        student: String,

        #[arg(long)]
        json: bool,
    },

    /// List unlocked achievements of a student
    Achievements {
        student: String,

        /// Show locked achievements with progress instead
        #[arg(long)]
        locked: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show the most recent XP awards of a student
    History {
        student: String,

        /// Maximum number of entries
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Inspect the achievement catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Run random events for many students concurrently (in memory)
    Simulate {
        /// Number of students
        #[arg(long, default_value_t = 8)]
        students: usize,

        /// Number of consecutive days
        #[arg(long, default_value_t = 14)]
        days: u32,

        /// Events per student per day
        #[arg(long, default_value_t = 6)]
        events_per_day: usize,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Validate config tables and catalog, rejecting unknown requirement types
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config_path = cli.config;

    match cli.command {
        Commands::Init { force } => {
            cli::init::init_command(config_path, force)?;
        }
        Commands::Event {
            student,
            kind,
            date,
            correct,
            attempted,
            wrong,
            goal,
            subject,
            xp,
            json,
        } => {
            let args = cli::event::EventArgs {
                student,
                kind,
                date,
                correct,
                attempted,
                wrong,
                goal,
                subject,
                xp,
            };
            cli::event::event_command(config_path.as_deref(), args, json)?;
        }
        Commands::Stats { student, json } => {
            cli::stats::stats_command(config_path.as_deref(), &student, json)?;
        }
        Commands::Achievements {
            student,
            locked,
            json,
        } => {
            cli::achievements::achievements_command(config_path.as_deref(), &student, locked, json)?;
        }
        Commands::History { student, limit } => {
            cli::history::history_command(config_path.as_deref(), &student, limit)?;
        }
        Commands::Catalog {
            action: CatalogAction::Validate,
        } => {
            cli::catalog::validate_command(config_path.as_deref())?;
        }
        Commands::Simulate {
            students,
            days,
            events_per_day,
        } => {
            cli::simulate::simulate_command(config_path.as_deref(), students, days, events_per_day)
                .await?;
        }
    }

    Ok(())
}
