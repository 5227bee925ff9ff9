//! Implementation of the `stackcmp init` command.

use anyhow::{Context, Result};
use tracing::info;

use super::{GlobalOptions, InvocationArgs, invocation, run_cancellable};

/// Discover, then ensure the application's state store.
///
/// Writes nothing to stdout. Running it again with the same inputs leaves
/// the state store unchanged.
pub fn cmd_init(global: &GlobalOptions, args: &InvocationArgs) -> Result<()> {
  let invocation = invocation(global, args)?;

  let (outcome, record) = run_cancellable(invocation, |inv| {
    inv.discover()?;
    let outcome = inv.init()?;
    Ok((outcome, inv.stored_record()?))
  })
  .context("Init failed")?;

  info!(
    state_dir = %outcome.state_dir.display(),
    changed = outcome.changed,
    "init complete"
  );
  for template in record.iter().flat_map(|r| &r.templates) {
    info!(path = %template.path, sha256 = %template.sha256, "recorded template");
  }
  Ok(())
}
