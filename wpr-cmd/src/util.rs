use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Set up the stage logger: a daily-rotated file under `log_dir` (rotation
/// happens on the UTC day) mirrored to stdout. The returned guard must be
/// kept alive for the life of the stage.
pub fn init_logging(log_dir: &Path, prefix: &str, filter: &str) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(fmt::layer().with_ansi(false))
        .init();
    Ok(guard)
}

/// Plain file names in `dir`.
pub fn list_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(names)
}

/// `yyyymmdd` subdirectories of `root`, ascending.
pub fn day_dirs(root: &Path) -> io::Result<Vec<String>> {
    let mut days = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            if name.len() == 8 && name.bytes().all(|b| b.is_ascii_digit()) {
                days.push(name);
            }
        }
    }
    days.sort();
    Ok(days)
}

pub fn latest_day_dir(root: &Path) -> io::Result<Option<String>> {
    Ok(day_dirs(root)?.pop())
}

/// Block until `path` exists, polling every 10 s.
pub fn wait_for_dir(path: &Path) {
    while !path.exists() {
        info!("waiting for {}", path.display());
        thread::sleep(Duration::from_secs(10));
    }
}

/// Block until `dir` has at least one entry, polling every 10 s, then give
/// the upstream writer a moment to settle.
pub fn wait_for_nonempty(dir: &Path) {
    loop {
        let has_files = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if has_files {
            info!("preparing");
            thread::sleep(Duration::from_secs(5));
            return;
        }
        thread::sleep(Duration::from_secs(10));
    }
}
