mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use runcode_common::config::DEFAULT_LANGUAGES_PATH;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "runcode-cli")]
#[command(about = "Run-code CLI - Grade submissions locally and inspect language configuration", long_about = None)]
struct Cli {
    /// Path to languages.json (built-in languages are used when it is missing)
    #[arg(long, global = true, default_value = DEFAULT_LANGUAGES_PATH)]
    config: PathBuf,

    /// Print engine logs, including output from the submitted code
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a source file against a JSON file of test cases
    Grade {
        /// Source file to grade
        #[arg(short, long)]
        code: PathBuf,

        /// JSON test cases: an array, or an object with a `testCases` array
        #[arg(short, long)]
        tests: PathBuf,

        /// Language name or alias (inferred from the file extension when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Entry point names to try, in order (repeatable)
        #[arg(long = "candidate")]
        candidates: Vec<String>,

        /// Print the raw result array as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List configured languages
    Languages,

    /// Load and validate the languages file
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Grade {
            code,
            tests,
            language,
            candidates,
            json,
        } => {
            let all_passed = commands::grade(
                &cli.config,
                &code,
                &tests,
                language.as_deref(),
                candidates,
                json,
            )
            .await?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        Commands::Languages => {
            commands::list_languages(&cli.config)?;
        }
        Commands::CheckConfig => {
            commands::check_config(&cli.config)?;
        }
    }

    Ok(())
}
