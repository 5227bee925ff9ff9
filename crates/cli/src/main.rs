mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{GlobalOptions, InvocationArgs};

/// Argo CD config management plugin that renders Pulumi Stack resources
#[derive(Parser)]
#[command(name = "stackcmp")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(flatten)]
  global: GlobalOptions,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the marker file if the plugin applies to the source
  Discover {
    #[command(flatten)]
    invocation: InvocationArgs,
  },

  /// Discover, then ensure the application's state store
  Init {
    #[command(flatten)]
    invocation: InvocationArgs,
  },

  /// Discover, init, and write the rendered manifest to stdout
  Generate {
    #[command(flatten)]
    invocation: InvocationArgs,
  },

  /// Print the invocation context templates can reference
  Vars {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Write plugin.yaml and the default Stack template into a directory
  Scaffold {
    /// Target directory
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Overwrite existing files
    #[arg(short, long)]
    force: bool,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  // stdout carries manifests only, so logs go to stderr.
  let default_level = if cli.global.verbose { "info" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Discover { invocation } => cmd::cmd_discover(&cli.global, &invocation),
    Commands::Init { invocation } => cmd::cmd_init(&cli.global, &invocation),
    Commands::Generate { invocation } => cmd::cmd_generate(&cli.global, &invocation),
    Commands::Vars { json } => cmd::cmd_vars(&cli.global, json),
    Commands::Scaffold { dir, force } => cmd::cmd_scaffold(dir, force),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      output::print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
