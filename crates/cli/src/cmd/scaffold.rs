//! Implementation of the `stackcmp scaffold` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use stackcmp_lib::scaffold::{ScaffoldOptions, scaffold};

use crate::output::{print_success, symbols};

/// Write `plugin.yaml` and `stack.yaml.envsubst` into `dir`.
///
/// # Errors
///
/// Returns an error if either file exists and `force` is not set, or if
/// there are permission issues.
pub fn cmd_scaffold(dir: PathBuf, force: bool) -> Result<()> {
  let result = scaffold(&ScaffoldOptions { dir, force }).context("Failed to scaffold plugin files")?;

  print_success("Scaffolded config management plugin");
  println!();
  for (label, path) in [
    ("Directory:     ", &result.dir),
    ("Plugin config: ", &result.plugin_yaml),
    ("Stack template:", &result.stack_template),
  ] {
    println!(
      "  {} {} {}",
      symbols::INFO.if_supports_color(Stream::Stdout, |s| s.cyan()),
      label,
      path.display()
    );
  }
  println!();
  println!("{}", "Next steps:".if_supports_color(Stream::Stdout, |s| s.bold()));
  println!(
    "  1. Mount {} into the repo-server sidecar at /home/argocd/cmp-server/config",
    result.plugin_yaml.display()
  );
  println!(
    "  2. Copy {} into an application repo to customize its Stack",
    result.stack_template.display()
  );

  Ok(())
}
