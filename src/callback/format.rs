//! Text formatting of log entries.
//!
//! Every function here is pure: the plugin decides what to print and where,
//! these only build the strings.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value as JsonValue};

use crate::callback::types::{HostStats, IncludedFileInfo, ResultInfo, TaskStatus};
use crate::report::facts::short_action;
use crate::report::os_release::to_json_indent4;

/// Total width of a banner title after padding.
pub const BANNER_WIDTH: usize = 60;

/// Keys kept in a `debug msg=...` result.
const DEBUG_ALLOWED_KEYS: &[&str] = &["msg", "exception", "warnings", "deprecations"];

/// Keys removed from a `debug var=...` result.
const DEBUG_HIDDEN_KEYS: &[&str] = &["changed", "failed", "skipped", "invocation", "skip_reason"];

/// Builds a timestamped banner.
///
/// ```text
///
/// 2024-05-01 10:00:00,123 | PLAY [deploy_vm] ***************************************
/// ```
///
/// Banners for included and imported files get no trailing newline so a
/// loop item label can follow on the same line.
pub fn banner(msg: &str, at: DateTime<Utc>) -> String {
    let timestamp = at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S,%3f");
    let title = format!("{:*<width$}", format!("{msg} "), width = BANNER_WIDTH);
    if msg.starts_with("Included") || msg.starts_with("Imported") {
        format!("\n{timestamp} | {title}")
    } else {
        format!("\n{timestamp} | {title}\n")
    }
}

/// Banner for a task or handler, with its source path when known.
pub fn task_banner(prefix: &str, name: &str, path: Option<&str>, at: DateTime<Utc>) -> String {
    let mut out = banner(&format!("{prefix} [{name}]"), at);
    if let Some(path) = path {
        out.push_str(&format!("task path: {path}\n"));
    }
    out
}

/// Banner for a play, with its source path when known.
pub fn play_banner(name: Option<&str>, path: Option<&str>, at: DateTime<Utc>) -> String {
    let mut out = match name {
        Some(name) => banner(&format!("PLAY [{name}]"), at),
        None => banner("PLAY", at),
    };
    if let Some(path) = path {
        out.push_str(&format!("play path: {path}"));
    }
    out
}

/// Removes what a result should not display.
///
/// Only debug results are touched: a `msg` result keeps the message and
/// internal keys, a `var` result drops the status keys.
pub fn clean_result(action: &str, result: &mut ResultInfo) {
    if short_action(action) != "debug" {
        return;
    }
    if result.data.contains_key("msg") {
        result
            .data
            .retain(|key, _| DEBUG_ALLOWED_KEYS.contains(&key.as_str()) || key.starts_with('_'));
    } else {
        for key in DEBUG_HIDDEN_KEYS {
            result.data.shift_remove(*key);
        }
    }
}

/// Renders a result for the log: internal `_ansible*` keys stripped, keys
/// sorted, four-space indentation.
pub fn dump_result(result: &ResultInfo) -> String {
    let visible: Map<String, JsonValue> = result
        .data
        .iter()
        .filter(|(key, _)| !key.starts_with("_ansible"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let sorted = sort_keys(JsonValue::Object(visible));
    to_json_indent4(&sorted).unwrap_or_else(|_| "{}".to_string())
}

fn sort_keys(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut entries: Vec<(String, JsonValue)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            JsonValue::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Message logged for a captured traceback.
pub fn exception_text(traceback: &str) -> String {
    format!("An exception occurred during task execution. The full traceback is:\n{traceback}")
}

/// Everything needed to print one result line.
#[derive(Debug, Clone)]
pub struct ResultLine<'a> {
    pub status: TaskStatus,
    pub host: &'a str,
    pub delegated_to: Option<&'a str>,
    pub is_loop: bool,
    pub item_label: Option<&'a str>,
    pub ignore_errors: bool,
}

impl ResultLine<'_> {
    /// Formats the line followed by the dumped result.
    pub fn render(&self, dump: &str) -> String {
        let host = match self.delegated_to {
            Some(delegate) => format!("[{} -> {}]", self.host, delegate),
            None => format!("[{}]", self.host),
        };

        let mut out = match self.status {
            TaskStatus::Ok => format!("ok: {host}"),
            TaskStatus::Changed => format!("changed: {host}"),
            TaskStatus::Skipped => format!("skipping: {host}"),
            TaskStatus::Failed if self.is_loop => format!("failed: {host}"),
            TaskStatus::Failed => format!("fatal: {host}: FAILED!"),
            TaskStatus::Unreachable => format!("fatal: {host}: UNREACHABLE!"),
        };

        if self.is_loop {
            if let Some(label) = self.item_label {
                out.push_str(&format!(" => (item={label})"));
            }
        }
        out.push_str(&format!(" => {dump}"));

        if self.ignore_errors {
            out.push_str("\n...ignoring");
        }
        out
    }
}

/// Line logged when a task is retried.
pub fn retry_line(task_name: &str, result: &ResultInfo, attempts: u32, retries: u32) -> String {
    let left = i64::from(retries) - i64::from(attempts);
    format!(
        "FAILED - RETRYING: {} ({} retries left).Result was: {}",
        task_name,
        left,
        dump_result(result)
    )
}

/// Banner for an included or imported task file.
pub fn include_banner(kind: &str, included: &IncludedFileInfo, at: DateTime<Utc>) -> String {
    let mut out = banner(
        &format!("{}: {} for {}", kind, included.filename, included.hosts.join(", ")),
        at,
    );
    if let Some(label) = included.item_label().filter(|l| !l.is_empty()) {
        out.push_str(&format!(" => (item={label})"));
    }
    out
}

/// The play recap block, one line per host in name order.
pub fn play_recap(stats: &BTreeMap<String, HostStats>, at: DateTime<Utc>) -> String {
    let lines: Vec<String> = stats
        .iter()
        .map(|(host, s)| {
            format!(
                "{:<30} :  ok={}  changed={}  unreachable={}  failed={}  skipped={}  rescued={}  ignored={}",
                host, s.ok, s.changed, s.unreachable, s.failures, s.skipped, s.rescued, s.ignored
            )
        })
        .collect();
    format!("{}{}", banner("PLAY RECAP", at), lines.join("\n"))
}
