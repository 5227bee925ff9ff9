//! Implementation of the `stackcmp vars` command.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::output::{print_info, print_json};

use super::GlobalOptions;

/// Print every name the invocation context resolves, as `NAME=value` lines
/// or a JSON object.
pub fn cmd_vars(global: &GlobalOptions, json: bool) -> Result<()> {
  let context = global.context.build()?;
  let entries = context.entries();

  if json {
    let map: BTreeMap<String, &str> = entries.into_iter().collect();
    return print_json(&map);
  }

  if entries.is_empty() {
    print_info("No invocation context. Set ARGOCD_APP_* variables or pass --app-name and --param.");
    return Ok(());
  }

  for (name, value) in entries {
    println!("{name}={value}");
  }
  Ok(())
}
