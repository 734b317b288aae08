mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{cmd_clean, cmd_gen, cmd_hash, cmd_query};
use crate::output::{OutputFormat, print_error};

/// buildgen - generate ninja build files from declarative BUILD files
#[derive(Parser)]
#[command(name = "buildgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Source root containing the BUILD files
  #[arg(short = 'C', long = "root", global = true, default_value = ".")]
  root: PathBuf,

  /// Configuration file (default: <root>/BUILD_CONFIG.toml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate ninja files for the selected targets
  Gen {
    /// Target patterns (`dir:name`, `dir`, `dir/...`)
    #[arg(default_value = "...")]
    patterns: Vec<String>,
  },

  /// Print the rule hash of the selected targets
  Hash {
    #[arg(default_value = "...")]
    patterns: Vec<String>,
  },

  /// Show the declaration and dependencies of the selected targets
  Query {
    #[arg(default_value = "...")]
    patterns: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Remove files generated for the selected targets
  Clean {
    #[arg(default_value = "...")]
    patterns: Vec<String>,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let config = cli.config.as_deref();
  let result = match &cli.command {
    Commands::Gen { patterns } => cmd_gen(&cli.root, config, patterns),
    Commands::Hash { patterns } => cmd_hash(&cli.root, config, patterns),
    Commands::Query { patterns, output } => cmd_query(&cli.root, config, patterns, *output),
    Commands::Clean { patterns } => cmd_clean(&cli.root, config, patterns),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}
