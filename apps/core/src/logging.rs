//! Append-only diagnostics for the launcher.
//!
//! Lines look like `[1700000000] [WARN] message`. `run1c.log` is shifted to
//! `run1c.1.log` … `run1c.5.log` once it grows past 1 MB; the oldest is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::storage::FormatError;

const LOG_STEM: &str = "run1c";
const MAX_LOG_BYTES: u64 = 1_000_000;
const KEPT_GENERATIONS: usize = 5;

static SINK: OnceLock<Mutex<File>> = OnceLock::new();
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

pub fn logs_dir() -> PathBuf {
    crate::config::stable_app_data_dir().join("logs")
}

pub fn log_path(dir: &Path) -> PathBuf {
    generation_path(dir, 0)
}

pub fn init() -> Result<(), std::io::Error> {
    init_in(&logs_dir())
}

/// Opens `<dir>/run1c.log` as the process-wide sink. Only the first successful call wins.
pub fn init_in(dir: &Path) -> Result<(), std::io::Error> {
    fs::create_dir_all(dir)?;
    shift_generations(dir)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path(dir))?;
    let _ = SINK.set(Mutex::new(file));

    install_panic_hook();
    Ok(())
}

pub fn info(message: &str) {
    emit(Level::Info, message);
}

pub fn warn(message: &str) {
    emit(Level::Warn, message);
}

pub fn error(message: &str) {
    emit(Level::Error, message);
}

/// Skipped store lines, always as `<file>:<line>: <problem>`.
pub fn store_format_error(store_path: &Path, problem: &FormatError) {
    emit(Level::Warn, &format_store_error(store_path, problem));
}

pub fn format_store_error(store_path: &Path, problem: &FormatError) -> String {
    format!(
        "storage {}:{}: {}",
        store_path.display(),
        problem.line,
        problem.kind
    )
}

pub fn format_line(level: Level, epoch_secs: u64, message: &str) -> String {
    format!("[{epoch_secs}] [{}] {message}\n", level.tag())
}

fn emit(level: Level, message: &str) {
    let line = format_line(level, now_secs(), message);

    // Without a sink (tests, early startup) diagnostics still reach stderr.
    match SINK.get() {
        Some(sink) => {
            if let Ok(mut file) = sink.lock() {
                let _ = file.write_all(line.as_bytes());
                let _ = file.flush();
            }
        }
        None => eprint!("[run1c-core] {line}"),
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn generation_path(dir: &Path, generation: usize) -> PathBuf {
    if generation == 0 {
        dir.join(format!("{LOG_STEM}.log"))
    } else {
        dir.join(format!("{LOG_STEM}.{generation}.log"))
    }
}

/// Shifts `run1c.log` down one generation when it is over the size cap.
fn shift_generations(dir: &Path) -> Result<(), std::io::Error> {
    let current = log_path(dir);
    let size = match fs::metadata(&current) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if size < MAX_LOG_BYTES {
        return Ok(());
    }

    let oldest = generation_path(dir, KEPT_GENERATIONS);
    if oldest.exists() {
        fs::remove_file(oldest)?;
    }
    for generation in (0..KEPT_GENERATIONS).rev() {
        let from = generation_path(dir, generation);
        if from.exists() {
            fs::rename(from, generation_path(dir, generation + 1))?;
        }
    }
    Ok(())
}

fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let at = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown".to_string());
            let what = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_default();
            error(&format!("panic at {at}: {what}"));
            previous(info);
        }));
    });
}
