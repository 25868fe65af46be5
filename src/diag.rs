//! Append-only diagnostics log.
//!
//! Pipeline failures are never shown to the user; the engine degrades to
//! doing nothing. Everything worth knowing about lands here instead, and on
//! stderr in debug builds.

use std::io::Write;
use std::path::{Path, PathBuf};

fn log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join(crate::BUNDLE_ID).join("quitsense.log"))
}

pub fn log(message: &str) {
    if cfg!(debug_assertions) {
        eprintln!("{message}");
    }
    let Some(path) = log_path() else {
        return;
    };
    let _ = append_line(&path, message);
}

fn append_line(path: &Path, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f%:z");
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(f, "[{ts}] {message}")
}
