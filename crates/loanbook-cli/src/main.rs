mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::risk::{ClassifyArgs, PortfolioArgs, StatusArgs};
use commands::schedule::ScheduleArgs;

/// EMI schedules, repayment status and portfolio-at-risk
#[derive(Parser)]
#[command(
    name = "loanbook",
    version,
    about = "EMI schedules, repayment status and portfolio-at-risk",
    long_about = "Builds reducing-balance EMI schedules with cents-exact rounding, \
                  classifies loans by days past due, and aggregates PAR30/PAR90 \
                  across a portfolio. Inputs come from --input files, piped JSON \
                  on stdin, or individual flags."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log debug detail to stderr (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an EMI amortization schedule
    Schedule(ScheduleArgs),
    /// Days past due and delinquency bucket for one loan
    Classify(ClassifyArgs),
    /// Repayment position (dues, paid, arrears, next installment) for one loan
    Status(StatusArgs),
    /// PAR30/PAR90 and bucket counts across a portfolio
    Portfolio(PortfolioArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "warn,loanbook_cli=debug"
        } else {
            "warn"
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Schedule(args) => commands::schedule::run_schedule(args),
        Commands::Classify(args) => commands::risk::run_classify(args),
        Commands::Status(args) => commands::risk::run_status(args),
        Commands::Portfolio(args) => commands::risk::run_portfolio(args),
        Commands::Version => {
            println!("loanbook {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
