//! Reset command implementation.

use anyhow::{Context, Result, bail};

use smarttank_types::KeyValueStore;

use super::{confirm, is_interactive, open_store};
use crate::config::Config;
use crate::style;

pub fn cmd_reset(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        if !is_interactive() {
            bail!("Refusing to reset without confirmation; pass --yes");
        }
        if !confirm("Forget all saved setup values?", false)? {
            eprintln!("Cancelled.");
            return Ok(());
        }
    }

    let store = open_store(config)?;
    store.clear().context("Failed to clear saved values")?;
    eprintln!("{}", style::success("Saved setup values cleared"));
    Ok(())
}
