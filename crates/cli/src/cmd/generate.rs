//! Implementation of the `stackcmp generate` command.
//!
//! The manifest stream is the only thing written to stdout, and only after
//! every document has rendered and validated.

use std::io::Write;

use anyhow::{Context, Result};

use super::{GlobalOptions, InvocationArgs, invocation, run_cancellable};

pub fn cmd_generate(global: &GlobalOptions, args: &InvocationArgs) -> Result<()> {
  let invocation = invocation(global, args)?;

  let generated = run_cancellable(invocation, |inv| {
    inv.discover()?;
    inv.init()?;
    inv.generate()
  })
  .context("Generate failed")?;

  let mut stdout = std::io::stdout().lock();
  stdout
    .write_all(generated.output.as_bytes())
    .and_then(|()| stdout.flush())
    .context("Failed to write manifest")?;

  Ok(())
}
