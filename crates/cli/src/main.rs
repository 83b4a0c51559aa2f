mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::Session;
use crate::output::OutputFormat;

/// kiln - evaluate build configurations and select what to build
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Set an input variable (repeatable)
  #[arg(long = "var", value_name = "NAME=VALUE", global = true, value_parser = parse_var)]
  vars: Vec<(String, String)>,

  /// Directory to search for plugin binaries (repeatable). Defaults to the
  /// entries of KILN_PLUGIN_PATH followed by the user plugin directory.
  #[arg(long = "plugin-dir", value_name = "DIR", global = true)]
  plugin_dirs: Vec<PathBuf>,

  /// Evaluate locals and datasources as one dependency graph
  #[arg(long, global = true)]
  sequential: bool,

  /// Output format
  #[arg(long, value_enum, default_value_t, global = true)]
  format: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Report required plugins and the installed binaries that satisfy them
  Init {
    /// Configuration files or directories of *.kiln.json files
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,
  },

  /// Check a configuration without executing data sources
  Validate {
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,
  },

  /// Evaluate a configuration and list the builds that would run
  Build {
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Only select builds matching this pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    only: Vec<String>,

    /// Skip builds matching this pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    except: Vec<String>,

    /// What to do when a build fails: cleanup, abort or ask
    #[arg(long, value_name = "MODE", default_value = "cleanup")]
    on_error: String,

    /// Run builds in debug mode
    #[arg(long)]
    debug: bool,

    /// Force builds to run even if artifacts exist
    #[arg(long)]
    force: bool,

    /// Maximum number of builds to run at once (0 = unlimited)
    #[arg(long, value_name = "N", default_value_t = 0)]
    parallel_builds: usize,

    /// Answer yes to confirmation prompts
    #[arg(short, long)]
    yes: bool,
  },

  /// Evaluate expressions against a configuration
  Console {
    #[arg(long = "config", value_name = "PATH", default_value = ".")]
    paths: Vec<PathBuf>,

    /// Expression to evaluate; reads lines from stdin when omitted
    expr: Option<String>,
  },

  /// Upgrade configuration written in a legacy layout
  Fix {
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// How to emit the result: stdout, inplace or diff
    #[arg(long, value_name = "MODE", default_value = "stdout")]
    mode: String,
  },

  /// Show variables, locals, data sources and builds of a configuration
  Inspect {
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,
  },
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
  match raw.split_once('=') {
    Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.to_string())),
    _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let session = Session::new(cli.vars, cli.plugin_dirs, cli.sequential, cli.format);

  match cli.command {
    Commands::Init { paths } => cmd::cmd_init(&session, &paths),
    Commands::Validate { paths } => cmd::cmd_validate(&session, &paths),
    Commands::Build {
      paths,
      only,
      except,
      on_error,
      debug,
      force,
      parallel_builds,
      yes,
    } => cmd::cmd_build(
      &session,
      &paths,
      cmd::BuildArgs {
        only,
        except,
        on_error,
        debug,
        force,
        parallel_builds,
        yes,
      },
    ),
    Commands::Console { paths, expr } => cmd::cmd_console(&session, &paths, expr.as_deref()),
    Commands::Fix { paths, mode } => cmd::cmd_fix(&session, &paths, &mode),
    Commands::Inspect { paths } => cmd::cmd_inspect(&session, &paths),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_var_splits_on_first_equals() {
    assert_eq!(
      parse_var("tags={\"a\"=1}").unwrap(),
      ("tags".to_string(), "{\"a\"=1}".to_string())
    );
    assert_eq!(parse_var("empty=").unwrap(), ("empty".to_string(), String::new()));
    assert!(parse_var("novalue").is_err());
    assert!(parse_var("=1").is_err());
  }

  #[test]
  fn cli_definition_is_valid() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
  }
}
