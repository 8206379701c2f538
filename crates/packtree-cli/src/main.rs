#![forbid(unsafe_code)]

mod cmd;
mod output;
mod project;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "pkt: multi-level package hierarchy for warehouse stock",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    const fn output_mode(&self) -> OutputMode {
        OutputMode::from_json_flag(self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize a packtree project",
        after_help = "EXAMPLES:\n    # Allow pallets of boxes of bags\n    pkt init --max-depth 3"
    )]
    Init(cmd::init::InitArgs),

    #[command(about = "Manage stock locations")]
    Location(cmd::location::LocationArgs),

    #[command(
        about = "Create, move, delete and show packages",
        after_help = "EXAMPLES:\n    pkt package create --name PALLET\n    pkt package create --name BOX --parent PALLET\n    pkt package move BOX --parent none"
    )]
    Package(cmd::package::PackageArgs),

    #[command(about = "Print the package forest")]
    Tree(cmd::tree::TreeArgs),

    #[command(about = "Register stock")]
    Quant(cmd::quant::QuantArgs),

    #[command(
        about = "Plan, process and complete movement lines",
        after_help = "EXAMPLES:\n    pkt moves add apple 6 --from WH/Stock --to WH/Output --package BOX --picking 1\n    pkt moves detect --picking 1\n    pkt moves process BOX --picking 1\n    pkt moves complete --picking 1"
    )]
    Moves(cmd::moves::MovesArgs),

    #[command(about = "Re-validate stored trees against the current configuration")]
    Check,

    #[command(about = "List hierarchy links")]
    Links(cmd::links::LinksArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("PACKTREE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "packtree=debug,info"
        } else {
            "packtree=info,warn"
        })
    });

    let format = env::var("PACKTREE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &project_root),
        Commands::Location(args) => cmd::location::run_location(args, output, &project_root),
        Commands::Package(args) => cmd::package::run_package(args, output, &project_root),
        Commands::Tree(args) => cmd::tree::run_tree(args, output, &project_root),
        Commands::Quant(args) => cmd::quant::run_quant(args, output, &project_root),
        Commands::Moves(args) => cmd::moves::run_moves(args, output, &project_root),
        Commands::Check => cmd::check::run_check(output, &project_root),
        Commands::Links(args) => cmd::links::run_links(args, output, &project_root),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if render_error(cli.output_mode(), &CliError::from(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
