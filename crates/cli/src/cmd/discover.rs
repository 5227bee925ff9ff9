//! Implementation of the `stackcmp discover` command.
//!
//! Argo CD treats any output from the discover command as a match, so this
//! prints the marker path when the plugin applies and nothing otherwise.

use anyhow::Result;

use super::{GlobalOptions, InvocationArgs, invocation};

pub fn cmd_discover(global: &GlobalOptions, args: &InvocationArgs) -> Result<()> {
  let mut invocation = invocation(global, args)?;

  if invocation.discover()?
    && let Some(marker) = invocation.marker()
  {
    println!("{}", marker.display());
  }

  Ok(())
}
