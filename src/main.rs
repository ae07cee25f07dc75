//! Arbiter CLI - orchestrate or compete in a two-process duel.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

/// Arbiter - deterministic match execution between two competitor processes
#[derive(Parser, Debug)]
#[command(name = "arbiter")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Orchestrate one match between two competitor commands
    Run {
        /// Shell command for competitor A (receives ARBITER_CHANNEL and
        /// ARBITER_MAX_TURNS in its environment)
        #[arg(long = "competitor-a")]
        competitor_a: String,

        /// Shell command for competitor B
        #[arg(long = "competitor-b")]
        competitor_b: String,

        /// Per-turn instruction ceiling (overruns void that turn's moves)
        #[arg(long, default_value = "100000")]
        turn_limit: u64,

        /// Whole-match instruction ceiling (overruns end the match)
        #[arg(long, default_value = "10000000")]
        game_limit: u64,

        /// Maximum rounds before the match is decided by score
        #[arg(short = 't', long, default_value = "1000")]
        max_turns: u32,

        /// Wall-clock budget for the whole match, in milliseconds
        #[arg(long, default_value = "60000")]
        duration_ms: u64,

        /// Shared-memory channel name prefix (default: unique per process)
        #[arg(long)]
        channel_prefix: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },

    /// Run the built-in demo competitor against a published channel
    Compete {
        /// Channel name (default: the ARBITER_CHANNEL environment variable)
        #[arg(long)]
        channel: Option<String>,

        /// Maximum turns to serve (default: ARBITER_MAX_TURNS, then 1000)
        #[arg(short = 't', long)]
        max_turns: Option<u32>,

        /// Where to flush the bounded debug log at exit
        #[arg(long)]
        log: Option<std::path::PathBuf>,

        /// Extra instructions to account per turn (exercises budget policy)
        #[arg(long, default_value = "0")]
        spin: u64,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            competitor_a,
            competitor_b,
            turn_limit,
            game_limit,
            max_turns,
            duration_ms,
            channel_prefix,
            format,
        } => cli::run_match(&cli::RunArgs {
            competitor_a,
            competitor_b,
            turn_limit,
            game_limit,
            max_turns,
            duration_ms,
            channel_prefix,
            format,
        }),

        Commands::Compete {
            channel,
            max_turns,
            log,
            spin,
        } => cli::compete(channel, max_turns, log, spin),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
