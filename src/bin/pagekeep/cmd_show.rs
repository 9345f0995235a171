use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use pagekeep::recover::inspect_run;

pub fn exec(run: PathBuf, json: bool) -> Result<()> {
    let r = inspect_run(&run)?;
    let pages = r.pages();

    if json {
        let items: Vec<_> = pages
            .iter()
            .map(|p| {
                json!({
                    "file_name": p.file_name,
                    "transform": p.transform.degrees(),
                    "present": p.exists(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "folder": r.folder.display().to_string(),
                "stale": r.is_stale(),
                "journal_error": r.journal_error,
                "pages": items,
            }))?
        );
        return Ok(());
    }

    println!("Run {} ({})", r.folder.display(), if r.is_stale() { "stale" } else { "live" });
    if let Some(err) = &r.journal_error {
        println!("  journal: {}", err);
    }
    for p in &pages {
        println!(
            "  {:<12} transform={:<4} {}",
            p.file_name,
            p.transform,
            if p.exists() { "" } else { "(missing)" }
        );
    }
    Ok(())
}
