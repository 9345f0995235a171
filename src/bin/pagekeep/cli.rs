use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use pagekeep::{BitDepth, StoreConfig};

/// Инспекция recovery-каталогов отсканированных страниц
#[derive(Parser, Debug)]
#[command(name = "pagekeep", version, about = "Scanned page recovery store", arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List run folders under the recovery root (live and stale)
    List {
        /// Recovery root (default: PK_RECOVERY_DIR or <tmp>/pagekeep/recovery)
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the journal of one run folder
    Show {
        #[arg(long)]
        run: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Materialize every page of a stale run into PNG files
    Export {
        #[arg(long)]
        run: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Delete stale run folders (live runs are never touched)
    Purge {
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Store an image file as a page (with --keep the run is left behind, as after a crash)
    Capture {
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long)]
        image: PathBuf,
        #[arg(long, value_enum, default_value_t = DepthArg::Color)]
        bit_depth: DepthArg,
        #[arg(long, default_value_t = false)]
        high_quality: bool,
        /// Clockwise rotation in degrees (multiple of 90)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        rotate: i32,
        #[arg(long, default_value_t = false)]
        keep: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DepthArg {
    Bw,
    Gray,
    Color,
}

impl From<DepthArg> for BitDepth {
    fn from(d: DepthArg) -> Self {
        match d {
            DepthArg::Bw => BitDepth::BlackWhite,
            DepthArg::Gray => BitDepth::Grayscale,
            DepthArg::Color => BitDepth::Color,
        }
    }
}

pub fn resolve_root(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| StoreConfig::from_env().recovery_root)
}
