//! Run log directory layout.
//!
//! Every run writes into `<log_root>/<timestamp>/`, and `<log_root>/current`
//! is a symlink to the active run directory. The link is replaced by
//! renaming a freshly created link over it, so readers never observe a
//! missing `current`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Paths of one run's log directory.
#[derive(Debug, Clone)]
pub struct LogLayout {
    run_dir: PathBuf,
    current_link: PathBuf,
}

impl LogLayout {
    /// Creates the run directory named after `started_at`.
    ///
    /// The `current` link is not touched; call [`LogLayout::point_current`].
    pub fn create(
        root: impl Into<PathBuf>,
        link_name: &str,
        timestamp_format: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        let root = root.into();
        let dir_name = started_at
            .with_timezone(&Local)
            .format(timestamp_format)
            .to_string();
        let run_dir = root.join(dir_name);

        fs::create_dir_all(&run_dir).map_err(|source| Error::LogDirCreate {
            path: run_dir.clone(),
            source,
        })?;
        debug!(run_dir = %run_dir.display(), "created run log directory");

        Ok(Self {
            current_link: root.join(link_name),
            run_dir,
        })
    }

    /// Directory the run currently writes to.
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn current_link(&self) -> &Path {
        &self.current_link
    }

    /// Path of a log file inside the run directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.run_dir.join(name)
    }

    /// Points the `current` link at the run directory.
    pub fn point_current(&self) -> Result<()> {
        swap_symlink(&self.current_link, &self.run_dir)
    }

    /// Moves the run's logs into `dest`.
    ///
    /// The run directory is copied into `dest`, `current` is pointed at
    /// `dest` and the run directory is removed. Afterwards `dest` is the run
    /// directory. Archiving into the run directory itself does nothing.
    pub fn archive_to(&mut self, dest: impl Into<PathBuf>) -> Result<()> {
        let dest = dest.into();
        if same_dir(&dest, &self.run_dir) {
            return Ok(());
        }

        let copied = copy_dir_contents(&self.run_dir, &dest)?;
        swap_symlink(&self.current_link, &dest)?;
        fs::remove_dir_all(&self.run_dir)
            .map_err(|e| Error::archive(&self.run_dir, &dest, e))?;

        debug!(
            from = %self.run_dir.display(),
            to = %dest.display(),
            files = copied,
            "archived run logs"
        );
        self.run_dir = dest;
        Ok(())
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Atomically makes `link` a symlink to `target`.
///
/// A real directory at `link` is removed first.
pub fn swap_symlink(link: &Path, target: &Path) -> Result<()> {
    let wrap = |source: io::Error| Error::LinkSwap {
        link: link.to_path_buf(),
        target: target.to_path_buf(),
        source,
    };

    if let Ok(meta) = fs::symlink_metadata(link) {
        if meta.is_dir() {
            warn!(link = %link.display(), "replacing directory with link");
            fs::remove_dir_all(link).map_err(wrap)?;
        }
    }

    let link_name = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "current".to_string());
    let tmp = link.with_file_name(format!(".{}.tmp-{}", link_name, std::process::id()));
    if fs::symlink_metadata(&tmp).is_ok() {
        fs::remove_file(&tmp).map_err(wrap)?;
    }

    make_dir_symlink(target, &tmp).map_err(wrap)?;
    if let Err(e) = fs::rename(&tmp, link) {
        let _ = fs::remove_file(&tmp);
        return Err(wrap(e));
    }
    Ok(())
}

#[cfg(unix)]
fn make_dir_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_dir_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Recursively copies the contents of `from` into `to`, overwriting files.
///
/// Returns the number of files copied.
pub fn copy_dir_contents(from: &Path, to: &Path) -> Result<u64> {
    fs::create_dir_all(to).map_err(|e| Error::archive(from, to, e))?;

    let mut copied = 0;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|e| Error::archive(from, to, e))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| Error::archive(from, to, e))?;
        let dest = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| Error::archive(from, to, e))?;
        } else {
            fs::copy(entry.path(), &dest).map_err(|e| Error::archive(from, to, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}
