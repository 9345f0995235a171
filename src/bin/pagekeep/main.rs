use anyhow::Result;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod cmd_capture;
mod cmd_export;
mod cmd_list;
mod cmd_purge;
mod cmd_show;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт: info.
    // Пример: RUST_LOG=debug pagekeep list
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        // Логируем ошибку и выходим с кодом 1.
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse_args();
    match cli.cmd {
        cli::Cmd::List { root, json } =>
            cmd_list::exec(cli::resolve_root(root), json),

        cli::Cmd::Show { run, json } =>
            cmd_show::exec(run, json),

        cli::Cmd::Export { run, out } =>
            cmd_export::exec(run, out),

        cli::Cmd::Purge { root, dry_run } =>
            cmd_purge::exec(cli::resolve_root(root), dry_run),

        cli::Cmd::Capture { root, image, bit_depth, high_quality, rotate, keep } =>
            cmd_capture::exec(cli::resolve_root(root), image, bit_depth, high_quality, rotate, keep),
    }
}
