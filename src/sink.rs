//! File and console output of the report plugin.
//!
//! [`ReportLogger`] fans each message out to every attached log file. The
//! debug log stays attached for the whole run; other files are attached
//! around a single write with [`ReportLogger::with_attached`].

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use colored::Colorize;
use indexmap::IndexMap;
use tracing::warn;

/// Width of console section banners.
const CONSOLE_BANNER_WIDTH: usize = 79;

/// Writes report text to log files in one directory and to the console.
pub struct ReportLogger {
    dir: PathBuf,
    sinks: IndexMap<String, BufWriter<File>>,
    console: bool,
}

impl std::fmt::Debug for ReportLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportLogger")
            .field("dir", &self.dir)
            .field("sinks", &self.sinks.keys().collect::<Vec<_>>())
            .field("console", &self.console)
            .finish()
    }
}

impl ReportLogger {
    /// Creates a logger writing into `dir` with no file attached.
    pub fn new(dir: impl Into<PathBuf>, console: bool) -> Self {
        Self {
            dir: dir.into(),
            sinks: IndexMap::new(),
            console,
        }
    }

    /// Moves output to another directory. Attached files are reopened there.
    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) {
        let names: Vec<String> = self.sinks.keys().cloned().collect();
        self.detach_all();
        self.dir = dir.into();
        for name in names {
            self.attach(&name);
        }
    }

    /// Attaches a log file. Attaching the same file twice does nothing.
    pub fn attach(&mut self, name: &str) {
        if self.sinks.contains_key(name) {
            return;
        }
        let path = self.dir.join(name);
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                self.sinks.insert(name.to_string(), BufWriter::new(file));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "cannot open log file"),
        }
    }

    /// Flushes and detaches a log file.
    pub fn detach(&mut self, name: &str) {
        if let Some(mut writer) = self.sinks.shift_remove(name) {
            if let Err(e) = writer.flush() {
                warn!(file = name, error = %e, "cannot flush log file");
            }
        }
    }

    pub fn detach_all(&mut self) {
        let names: Vec<String> = self.sinks.keys().cloned().collect();
        for name in names {
            self.detach(&name);
        }
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.sinks.contains_key(name)
    }

    /// Runs `f` with `name` attached, restoring the previous sink set after.
    pub fn with_attached<R>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_attached = self.is_attached(name);
        self.attach(name);
        let result = f(self);
        if !was_attached {
            self.detach(name);
        }
        result
    }

    /// Writes a message line to every attached file.
    pub fn emit(&mut self, msg: &str) {
        for (name, writer) in &mut self.sinks {
            let written = writeln!(writer, "{msg}").and_then(|_| writer.flush());
            if let Err(e) = written {
                warn!(file = %name, error = %e, "cannot write log file");
            }
        }
    }

    /// Appends raw text to a file regardless of the attached set.
    pub fn append_raw(&mut self, name: &str, text: &str) {
        if let Some(writer) = self.sinks.get_mut(name) {
            if let Err(e) = writer.flush() {
                warn!(file = name, error = %e, "cannot flush log file");
            }
        }
        let path = self.dir.join(name);
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(text.as_bytes()));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "cannot append to log file");
        }
    }

    /// Prints a message to the console.
    pub fn console(&self, msg: &str) {
        if self.console {
            println!("{}", msg.cyan());
        }
    }

    /// Prints a section banner to the console.
    pub fn console_banner(&self, title: &str) {
        if self.console {
            let line = format!("{title} ");
            println!(
                "\n{}",
                format!("{:*<width$}", line, width = CONSOLE_BANNER_WIDTH).bold()
            );
        }
    }
}

impl Drop for ReportLogger {
    fn drop(&mut self) {
        self.detach_all();
    }
}
