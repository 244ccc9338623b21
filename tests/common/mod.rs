//! Shared test utilities for the gosv-log test suite.
//!
//! This module provides:
//! - A [`Harness`] owning a temporary project directory, a manual clock and
//!   a plugin instance writing into the project's `logs/`
//! - Event payload builders for the tasks the plugin reacts to
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value as JsonValue};
use tempfile::TempDir;

use gosv_log::callback::types::{PlayInfo, PlaybookInfo, ResultInfo, TaskInfo};
use gosv_log::clock::ManualClock;
use gosv_log::traits::ExecutionCallback;
use gosv_log::{GosvLogCallback, GosvLogConfig};

/// Start of every test run.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

/// Testing vars written by [`Harness::new`].
pub const DEFAULT_VARS: &str = "\
vm_name: test_vm
vcenter_hostname: 192.168.10.10
esxi_hostname: 192.168.10.11
";

// ============================================================================
// Harness
// ============================================================================

/// A plugin writing into a temporary project directory.
pub struct Harness {
    pub project: TempDir,
    pub clock: Arc<ManualClock>,
    pub callback: GosvLogCallback,
}

impl Harness {
    /// Project with the default testing vars at `vars/test.yml`.
    pub fn new() -> Self {
        Self::with_vars(Some(DEFAULT_VARS))
    }

    /// Project with the given testing vars, or none at all.
    pub fn with_vars(vars: Option<&str>) -> Self {
        let project = TempDir::new().unwrap();
        if let Some(vars) = vars {
            fs::create_dir_all(project.path().join("vars")).unwrap();
            fs::write(project.path().join("vars/test.yml"), vars).unwrap();
        }
        let config = GosvLogConfig::builder()
            .project_dir(project.path())
            .console(false)
            .build();
        Self::with_config(project, config)
    }

    pub fn with_config(project: TempDir, config: GosvLogConfig) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let callback = GosvLogCallback::with_clock(config, clock.clone()).unwrap();
        Self {
            project,
            clock,
            callback,
        }
    }

    pub fn path(&self) -> &Path {
        self.project.path()
    }

    /// Reads a log file of the run, empty if it does not exist.
    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.callback.run_dir().join(name)).unwrap_or_default()
    }

    /// Sets the clock to `secs` seconds after [`t0`].
    pub fn at(&self, secs: i64) {
        self.clock.set(t0() + Duration::seconds(secs));
    }

    pub async fn start_playbook(&self) {
        self.callback
            .on_playbook_start(&PlaybookInfo::new("main.yml").with_file_path("/gosv/main.yml"))
            .await;
    }

    /// Starts a Linux test case play.
    pub async fn start_test(&self, name: &str) {
        self.callback.on_play_start(&testcase_play(name)).await;
    }

    /// Runs a task to an ok result.
    pub async fn ok(&self, task: &TaskInfo, result: ResultInfo) {
        self.callback.on_task_start(task, false).await;
        self.callback.on_task_ok(task, &result).await;
    }

    /// Runs a task to a failed result.
    pub async fn fail(&self, task: &TaskInfo, msg: &str) {
        self.callback.on_task_start(task, false).await;
        self.callback
            .on_task_failed(task, &ResultInfo::new().with("msg", msg), false)
            .await;
    }

    pub async fn finish(&self) {
        self.callback.on_stats(&Default::default()).await;
    }
}

// ============================================================================
// Builders
// ============================================================================

/// A play loaded from `linux/<name>/<name>.yml`.
pub fn testcase_play(name: &str) -> PlayInfo {
    PlayInfo::new(name).with_path(format!("/gosv/linux/{name}/{name}.yml:1"))
}

/// A play outside any test case directory.
pub fn setup_play(name: &str) -> PlayInfo {
    PlayInfo::new(name).with_path(format!("/gosv/env_setup/{name}.yml:1"))
}

/// A plain command task.
pub fn command_task(name: &str, file: &str, line: u32) -> TaskInfo {
    TaskInfo::new(name, "ansible.builtin.command", "localhost")
        .with_uuid(format!("{file}-{line}"))
        .with_path(format!("/gosv/linux/{file}:{line}"))
}

/// A `debug var=<var>` task from a common task file.
pub fn debug_var_task(file: &str, var: &str) -> TaskInfo {
    TaskInfo::new(format!("Display {var}"), "ansible.builtin.debug", "localhost")
        .with_uuid(format!("{file}-{var}"))
        .with_path(format!("/gosv/common/{file}:12"))
        .with_arg("var", var)
}

/// Result of a `debug var=<var>` task.
pub fn debug_var_result(var: &str, value: impl Into<JsonValue>) -> ResultInfo {
    ResultInfo::new().with(var, value).with("changed", false)
}

/// A `set_fact` task from a common task file.
pub fn set_fact_task(file: &str) -> TaskInfo {
    TaskInfo::new("Set facts", "ansible.builtin.set_fact", "localhost")
        .with_uuid(format!("{file}-set_fact"))
        .with_path(format!("/gosv/common/{file}:3"))
}

/// Result of a `set_fact` task.
pub fn set_fact_result(facts: JsonValue) -> ResultInfo {
    ResultInfo::new()
        .with("ansible_facts", facts)
        .with("changed", false)
}

/// The debug task announcing that `name` will not run.
pub fn skip_task(name: &str) -> TaskInfo {
    TaskInfo::new(
        format!("Skip testcase: {name}"),
        "ansible.builtin.debug",
        "localhost",
    )
    .with_path("/gosv/common/skip_test_case.yml:8")
}

pub fn skip_result(reason: &str) -> ResultInfo {
    ResultInfo::new().with("msg", json!(reason))
}
