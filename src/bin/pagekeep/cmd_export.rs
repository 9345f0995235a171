use anyhow::{anyhow, Result};
use std::path::PathBuf;

use pagekeep::recover::{export_run, inspect_run};

pub fn exec(run: PathBuf, out: PathBuf) -> Result<()> {
    let r = inspect_run(&run)?;
    if !r.is_stale() {
        return Err(anyhow!(
            "run {} is owned by a live process, refusing to export",
            run.display()
        ));
    }
    if let Some(err) = &r.journal_error {
        return Err(anyhow!("run {} has an unreadable journal: {}", run.display(), err));
    }
    let written = export_run(&r, &out)?;
    println!("Exported {} page(s) to {}", written.len(), out.display());
    Ok(())
}
