use anyhow::Result;
use std::path::PathBuf;

use pagekeep::purge_stale;

pub fn exec(root: PathBuf, dry_run: bool) -> Result<()> {
    let purged = purge_stale(&root, dry_run)?;
    let verb = if dry_run { "Would purge" } else { "Purged" };
    println!("{} {} stale run(s) under {}", verb, purged.len(), root.display());
    for p in &purged {
        println!("  {}", p.display());
    }
    Ok(())
}
