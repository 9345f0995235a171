use anyhow::{Context, Result};
use std::path::PathBuf;

use pagekeep::encoder::PageFormat;
use pagekeep::{CapturedImage, RecoveryContext, ScannedPage, StoreConfig};

use crate::cli::DepthArg;

pub fn exec(
    root: PathBuf,
    input: PathBuf,
    bit_depth: DepthArg,
    high_quality: bool,
    rotate: i32,
    keep: bool,
) -> Result<()> {
    let ctx = RecoveryContext::new(StoreConfig::from_env().with_recovery_root(root));

    let bytes = std::fs::read(&input).with_context(|| format!("read {}", input.display()))?;
    // JPEG/PNG от источника отдаём как есть, остальное декодируем
    let captured = match input
        .extension()
        .and_then(|x| x.to_str())
        .and_then(PageFormat::from_extension)
    {
        Some(format) => CapturedImage::Encoded { bytes, format },
        None => CapturedImage::Raster(
            image::load_from_memory(&bytes).with_context(|| format!("decode {}", input.display()))?,
        ),
    };

    let mut page = ScannedPage::create(&ctx, captured, bit_depth.into(), high_quality)?;
    if rotate != 0 {
        page.rotate_degrees(rotate)?;
    }
    println!(
        "Stored {} as {} ({:?}, transform {})",
        input.display(),
        page.path().display(),
        page.format(),
        page.orientation()
    );

    if keep {
        // Без dispose: run остаётся на диске как после падения процесса.
        println!("Leaving run {} in place", page.session().folder().display());
        std::mem::forget(page);
    }
    Ok(())
}
