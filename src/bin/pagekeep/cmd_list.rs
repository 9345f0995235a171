use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use pagekeep::lock::LockState;
use pagekeep::scan_root;

fn state_str(s: LockState) -> &'static str {
    match s {
        LockState::Held => "live",
        LockState::Abandoned => "stale",
        LockState::Missing => "stale(no-lock)",
    }
}

pub fn exec(root: PathBuf, json: bool) -> Result<()> {
    let runs = scan_root(&root)?;

    if json {
        let items: Vec<_> = runs
            .iter()
            .map(|r| {
                json!({
                    "run": r.name(),
                    "folder": r.folder.display().to_string(),
                    "state": state_str(r.lock),
                    "pages": r.entries.len(),
                    "journal_error": r.journal_error,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "root": root.display().to_string(),
                "runs": items,
            }))?
        );
        return Ok(());
    }

    println!("Recovery root {}", root.display());
    if runs.is_empty() {
        println!("  (no runs)");
        return Ok(());
    }
    for r in &runs {
        print!("  {:<20} {:<15} pages={}", r.name(), state_str(r.lock), r.entries.len());
        if let Some(err) = &r.journal_error {
            print!("  journal_error={}", err);
        }
        println!();
    }
    Ok(())
}
