//! Guest OS validation log callback plugin.
//!
//! Turns the lifecycle events of a validation run into:
//!
//! - `full_debug.log`: every banner and task result of the run
//! - `failed_tasks.log`: failed tasks only, grouped by test case
//! - `test_results.yml`: one `<test>: <status>` line per finished test case
//! - `results.log`: the testbed, VM and test result tables
//!
//! all inside `<log_root>/<timestamp>/`, with `<log_root>/current` pointing
//! at the active run.
//!
//! # Test cases
//!
//! A play whose source path contains a test case marker (`linux` or
//! `windows` by default) is a test case named after the play. It passes
//! unless a task fails or a host is unreachable while it runs, or a debug
//! task named `Skip testcase: <name>` marks it as not run.
//!
//! # Example Output
//!
//! ```text
//! Test Results (Total: 3, Failed: 1, No Run: 1, Elapsed Time: 00:18:42):
//! +---------------------------------------------+
//! | Name                 |   Status | Exec Time |
//! +---------------------------------------------+
//! | deploy_vm            | * No Run | 00:00:01  |
//! +---------------------------------------------+
//! | vgauth_check_service |   Passed | 00:03:02  |
//! +---------------------------------------------+
//! | gosc_cloudinit_dhcp  | * Failed | 00:12:58  |
//! +---------------------------------------------+
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use gosv_log::prelude::*;
//!
//! let config = GosvLogConfig::builder()
//!     .project_dir("/home/tester/ansible-vsphere-gos-validation")
//!     .build();
//! let callback = GosvLogCallback::new(config)?;
//!
//! callback.on_playbook_start(&playbook).await;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::callback::config::GosvLogConfig;
use crate::callback::format::{self, ResultLine};
use crate::callback::types::{
    HostStats, IncludedFileInfo, PlayInfo, PlaybookInfo, ResultInfo, TaskInfo, TaskStatus,
};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::logdir::LogLayout;
use crate::report::facts::short_action;
use crate::report::os_release::update_release_info;
use crate::report::{
    ReportAccumulator, ReportFacts, SummaryReport, TestCase, TestingVars, Transition,
};
use crate::sink::ReportLogger;
use crate::traits::ExecutionCallback;

/// Debug task announcing that a test case will not run.
static SKIP_TESTCASE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*skip\s+testcase:").expect("valid skip marker regex"));

/// Extra var naming the testing vars file.
pub const TESTING_VARS_EXTRA_VAR: &str = "testing_vars_file";

/// Fact renaming a running deploy test case.
pub const DEPLOY_CASENAME_FACT: &str = "deploy_casename";

/// Actions that include other task files; their results are not reported.
const INCLUDE_ACTIONS: &[&str] = &[
    "include",
    "include_tasks",
    "include_role",
    "import_tasks",
    "import_role",
];

// ============================================================================
// Internal State
// ============================================================================

#[derive(Debug)]
struct GosvLogState {
    logger: ReportLogger,
    layout: LogLayout,
    report: ReportAccumulator,
    play: Option<PlayInfo>,
    testing_vars_file: Option<PathBuf>,
    /// Task uuid whose banner was printed last
    last_task_uuid: Option<String>,
    /// Name of the task that started last; unset for free strategies
    last_task_name: Option<String>,
    /// Banner prefix per task uuid
    task_prefixes: HashMap<String, &'static str>,
}

impl GosvLogState {
    fn play_name(&self) -> Option<&str> {
        self.play
            .as_ref()
            .map(|p| p.name.trim())
            .filter(|n| !n.is_empty())
    }

    fn play_path(&self) -> Option<&str> {
        self.play
            .as_ref()
            .and_then(|p| p.path.as_deref())
            .filter(|p| !p.is_empty())
    }
}

// ============================================================================
// GosvLogCallback Implementation
// ============================================================================

/// Callback plugin writing the guest OS validation logs and reports.
///
/// # Thread Safety
///
/// All state sits behind one `Mutex`. The host is expected to deliver
/// events one at a time in order; the lock only makes the plugin `Sync`.
#[derive(Debug)]
pub struct GosvLogCallback {
    config: GosvLogConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<GosvLogState>,
}

impl GosvLogCallback {
    /// Creates the plugin and its run log directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the run directory cannot be created. A failure
    /// to update the `current` link is reported and tolerated.
    pub fn new(config: GosvLogConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates the plugin reading time from `clock`.
    pub fn with_clock(config: GosvLogConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let now = clock.now();
        let layout = LogLayout::create(
            config.log_root(),
            &config.current_link_name,
            &config.run_dir_format,
            now,
        )?;
        let logger = ReportLogger::new(layout.run_dir(), config.console);

        if let Err(e) = layout.point_current() {
            error!(error = %e, "cannot update current log link");
            logger.console(&format!("Error: {e}"));
        }

        let mut msg = format::banner(
            &format!("PLUGIN [{}]", env!("CARGO_PKG_NAME")),
            now,
        );
        msg.push_str(&format!(
            "Project directory: {}\nCurrent log directory: {}",
            config.project_dir.display(),
            layout.current_link().display()
        ));
        logger.console(&msg);

        Ok(Self {
            config,
            clock,
            state: Mutex::new(GosvLogState {
                logger,
                layout,
                report: ReportAccumulator::new(),
                play: None,
                testing_vars_file: None,
                last_task_uuid: None,
                last_task_name: None,
                task_prefixes: HashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &GosvLogConfig {
        &self.config
    }

    /// Directory the run currently writes to.
    pub fn run_dir(&self) -> PathBuf {
        self.state.lock().layout.run_dir().to_path_buf()
    }

    /// Path of the `current` link.
    pub fn current_link(&self) -> PathBuf {
        self.state.lock().layout.current_link().to_path_buf()
    }

    /// Testing vars file the run resolved.
    pub fn testing_vars_file(&self) -> Option<PathBuf> {
        self.state.lock().testing_vars_file.clone()
    }

    /// Snapshot of the test cases in order.
    pub fn test_cases(&self) -> Vec<TestCase> {
        self.state.lock().report.tests.iter().cloned().collect()
    }

    /// Snapshot of the collected facts.
    pub fn facts(&self) -> ReportFacts {
        self.state.lock().report.facts.clone()
    }

    /// Renders the summary blocks from the current state.
    pub fn summary(&self) -> SummaryReport {
        self.state.lock().report.render_summary(self.config.wrap_width)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn record_transition(&self, state: &mut GosvLogState, transition: Option<Transition>) {
        if let Some(transition) = transition {
            debug!(test = %transition.name, status = %transition.status, "test case finished");
            state
                .logger
                .append_raw(&self.config.results_yml, &transition.results_line());
        }
    }

    fn fail_running_test(&self, state: &mut GosvLogState, now: DateTime<Utc>) {
        let transition = state.report.tests.fail_running(now);
        self.record_transition(state, transition);
    }

    /// Logs the banner (for a new task) and result line of one result.
    fn print_task_details(
        &self,
        state: &mut GosvLogState,
        task: &TaskInfo,
        result: &mut ResultInfo,
        status: TaskStatus,
        item_label: Option<&str>,
        ignore_errors: bool,
    ) {
        let now = self.clock.now();
        let prefix = state
            .task_prefixes
            .get(&task.task_uuid)
            .copied()
            .unwrap_or("TASK");
        let task_name = state
            .last_task_name
            .clone()
            .unwrap_or_else(|| task.name.trim().to_string());
        let task_path = task.task_path.as_deref().filter(|p| !p.is_empty());
        let task_banner = format::task_banner(prefix, &task_name, task_path, now);

        let mut msg = String::new();
        if state.last_task_uuid.as_deref() != Some(task.task_uuid.as_str()) {
            msg.push_str(&task_banner);
            state.last_task_uuid = Some(task.task_uuid.clone());
        }

        if status == TaskStatus::Failed {
            if let Some(traceback) = result.take_exception() {
                msg.push_str(&format::exception_text(&traceback));
                msg.push('\n');
            }
        }

        let delegated_to = result.delegated_host();
        let line = ResultLine {
            status,
            host: &task.host,
            delegated_to: delegated_to.as_deref(),
            is_loop: task.is_loop,
            item_label,
            ignore_errors,
        };
        msg.push_str(&line.render(&format::dump_result(result)));

        let log_failure =
            matches!(status, TaskStatus::Failed | TaskStatus::Unreachable) && !ignore_errors;
        if !log_failure {
            state.logger.emit(&msg);
            return;
        }

        let owner = state
            .report
            .tests
            .current()
            .map(str::to_string)
            .or_else(|| state.play_name().map(str::to_string))
            .or_else(|| state.play_path().map(str::to_string))
            .unwrap_or_default();
        let novelty = state.report.failed_tasks.record(&owner, task_path);

        let mut failed_at = String::new();
        if novelty.first_in_play {
            failed_at.push_str(&format::banner(&format!("Failed at Play [{owner}]"), now));
        }
        if novelty.new_task_path && !msg.contains(&task_banner) {
            failed_at.push_str(&task_banner);
        }
        if !failed_at.is_empty() {
            state
                .logger
                .append_raw(&self.config.failed_tasks_log, &failed_at);
        }

        let failed_log = self.config.failed_tasks_log.clone();
        state.logger.with_attached(&failed_log, |logger| logger.emit(&msg));
    }

    /// Resolves and loads the testing vars for a run.
    fn load_testing_vars(&self, state: &mut GosvLogState, playbook: &PlaybookInfo) -> TestingVars {
        let path = playbook
            .extra_var_str(TESTING_VARS_EXTRA_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.default_testing_vars_file());
        state.testing_vars_file = Some(path.clone());

        match TestingVars::load(&path) {
            Ok(vars) => vars,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to get testing vars file");
                state
                    .logger
                    .emit(&format!("Failed to get testing vars file: {e}"));
                TestingVars::default()
            }
        }
    }

    /// Handles the skip marker, the deploy rename and fact collection of an
    /// ok result.
    fn collect_from_ok_result(&self, state: &mut GosvLogState, task: &TaskInfo, result: &ResultInfo) {
        let now = self.clock.now();
        match short_action(&task.action) {
            "debug" => {
                if let Some(test_name) = skipped_testcase(task, result) {
                    let transition = state.report.tests.mark_no_run(&test_name, now);
                    self.record_transition(state, transition);
                    return;
                }
            }
            "set_fact" => {
                let renames_deploy = state
                    .report
                    .tests
                    .running()
                    .is_some_and(|name| name.starts_with("deploy"));
                if renames_deploy {
                    if let Some(new_name) = result
                        .fact(DEPLOY_CASENAME_FACT)
                        .filter(|n| !n.trim().is_empty())
                    {
                        state.report.tests.rename_running(new_name.trim());
                    }
                }
            }
            _ => return,
        }

        let written = state.report.facts.apply_task_result(task, result);
        if !written.is_empty() {
            debug!(task = %task.name, fields = ?written, "collected facts");
        }
    }

    fn update_os_release_info(&self, state: &GosvLogState) {
        let os = &state.report.facts.os;
        if os.release_info_file.is_empty() {
            return;
        }
        let path = Path::new(&os.release_info_file);
        if !path.is_file() {
            warn!(path = %path.display(), "OS release info file not found");
            return;
        }

        let non_empty = |v: &str| -> Option<String> { (!v.is_empty()).then(|| v.to_string()) };
        match update_release_info(
            path,
            non_empty(&os.cloudinit_version).as_deref(),
            non_empty(&os.ovt_version).as_deref(),
        ) {
            Ok(true) => debug!(path = %path.display(), "updated OS release info"),
            Ok(false) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "skipping OS release info update"),
        }
    }

    fn write_summary(&self, state: &mut GosvLogState, now: DateTime<Utc>) {
        state.logger.console_banner("TEST SUMMARY");
        state.logger.emit(&format::banner("TEST SUMMARY", now));

        let summary = state.report.render_summary(self.config.wrap_width);
        let results_log = self.config.results_log.clone();
        state.logger.with_attached(&results_log, |logger| {
            for block in [&summary.testbed, &summary.vm_info, &summary.results] {
                logger.emit(block);
                logger.console(block);
            }
        });
    }

    fn archive_logs(&self, state: &mut GosvLogState) {
        let archive_dir = state.report.facts.os.testrun_log_dir.clone();
        if archive_dir.is_empty() || Path::new(&archive_dir) == state.layout.run_dir() {
            return;
        }

        state.logger.detach_all();
        match state.layout.archive_to(&archive_dir) {
            Ok(()) => {
                let run_dir = state.layout.run_dir().to_path_buf();
                state.logger.set_dir(run_dir);
            }
            Err(e) => {
                error!(error = %e, "failed to archive run logs");
                state.logger.console(&format!("Error: {e}"));
            }
        }
    }
}

/// Name of the test case a skip marker task announces, if it is one.
fn skipped_testcase(task: &TaskInfo, result: &ResultInfo) -> Option<String> {
    let marker = [Some(task.name.as_str()), result.msg()]
        .into_iter()
        .flatten()
        .find(|text| SKIP_TESTCASE_REGEX.is_match(text))?;
    let name = marker.rsplit(':').next().unwrap_or_default().trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn is_include_action(action: &str) -> bool {
    INCLUDE_ACTIONS.contains(&short_action(action))
}

// ============================================================================
// ExecutionCallback Implementation
// ============================================================================

#[async_trait]
impl ExecutionCallback for GosvLogCallback {
    async fn on_playbook_start(&self, playbook: &PlaybookInfo) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        state.logger.attach(&self.config.full_debug_log);
        let vars = self.load_testing_vars(&mut state, playbook);
        state.report.start_run(vars, now);

        let playbook_path = playbook
            .file_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| playbook.name.clone());
        let mut msg = format::banner(&format!("PLAYBOOK: {playbook_path}"), now);
        msg.push_str(&format!(
            "Positional arguments: {}\nTesting vars file: {}\nPlaybook dir: {}\nLog dir: {}",
            playbook.args.join(" "),
            state
                .testing_vars_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            self.config.project_dir.display(),
            state.layout.run_dir().display()
        ));
        state.logger.emit(&msg);
    }

    async fn on_play_start(&self, play: &PlayInfo) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let closed = state.report.tests.pass_running(now);
        self.record_transition(&mut state, closed);

        state.play = Some(play.clone());
        let msg = format::play_banner(state.play_name(), state.play_path(), now);
        state.logger.emit(&msg);

        state.report.failed_tasks.clear();
        state.report.tests.clear_current();

        let testcase = match (state.play_name(), state.play_path()) {
            (Some(name), Some(path)) if self.config.is_testcase_path(path) => {
                Some(name.to_string())
            }
            _ => None,
        };
        if let Some(name) = testcase {
            debug!(test = %name, "test case started");
            let closed = state.report.tests.open(&name, now);
            self.record_transition(&mut state, closed);
        }
    }

    async fn on_task_start(&self, task: &TaskInfo, is_handler: bool) {
        let mut state = self.state.lock();
        let prefix = if is_handler { "HANDLER" } else { "TASK" };
        state.task_prefixes.insert(task.task_uuid.clone(), prefix);

        let free_strategy = state.play.as_ref().is_some_and(PlayInfo::has_free_strategy);
        state.last_task_name = if free_strategy {
            None
        } else {
            Some(task.name.trim().to_string())
        };
    }

    async fn on_task_ok(&self, task: &TaskInfo, result: &ResultInfo) {
        if is_include_action(&task.action) || (task.is_loop && result.has_loop_results()) {
            return;
        }

        let mut state = self.state.lock();
        let mut result = result.clone();
        format::clean_result(&task.action, &mut result);

        let status = if result.changed() {
            TaskStatus::Changed
        } else {
            TaskStatus::Ok
        };
        self.print_task_details(&mut state, task, &mut result, status, None, false);
        self.collect_from_ok_result(&mut state, task, &result);
    }

    async fn on_task_failed(&self, task: &TaskInfo, result: &ResultInfo, ignore_errors: bool) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let mut result = result.clone();
        format::clean_result(&task.action, &mut result);

        if task.is_loop && result.has_loop_results() {
            if ignore_errors {
                state
                    .logger
                    .append_raw(&self.config.failed_tasks_log, "...ignoring\n");
            }
        } else {
            self.print_task_details(
                &mut state,
                task,
                &mut result,
                TaskStatus::Failed,
                None,
                ignore_errors,
            );
        }

        if !ignore_errors {
            self.fail_running_test(&mut state, now);
        }
    }

    async fn on_task_skipped(&self, task: &TaskInfo, result: &ResultInfo) {
        if task.is_loop && result.has_loop_results() {
            return;
        }
        let mut state = self.state.lock();
        let mut result = result.clone();
        format::clean_result(&task.action, &mut result);
        self.print_task_details(&mut state, task, &mut result, TaskStatus::Skipped, None, false);
    }

    async fn on_task_unreachable(&self, task: &TaskInfo, result: &ResultInfo) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let mut result = result.clone();
        self.print_task_details(&mut state, task, &mut result, TaskStatus::Unreachable, None, false);
        self.fail_running_test(&mut state, now);
    }

    async fn on_item_ok(&self, task: &TaskInfo, result: &ResultInfo) {
        if is_include_action(&task.action) {
            return;
        }
        let mut state = self.state.lock();
        let mut result = result.clone();
        format::clean_result(&task.action, &mut result);
        let label = result.item_label();
        let status = if result.changed() {
            TaskStatus::Changed
        } else {
            TaskStatus::Ok
        };
        self.print_task_details(&mut state, task, &mut result, status, label.as_deref(), false);
    }

    async fn on_item_failed(&self, task: &TaskInfo, result: &ResultInfo) {
        let mut state = self.state.lock();
        let mut result = result.clone();
        format::clean_result(&task.action, &mut result);
        let label = result.item_label();
        self.print_task_details(
            &mut state,
            task,
            &mut result,
            TaskStatus::Failed,
            label.as_deref(),
            false,
        );
    }

    async fn on_item_skipped(&self, task: &TaskInfo, result: &ResultInfo) {
        let mut state = self.state.lock();
        let mut result = result.clone();
        format::clean_result(&task.action, &mut result);
        let label = result.item_label();
        self.print_task_details(
            &mut state,
            task,
            &mut result,
            TaskStatus::Skipped,
            label.as_deref(),
            false,
        );
    }

    async fn on_retry(&self, task: &TaskInfo, result: &ResultInfo, attempts: u32, retries: u32) {
        let mut state = self.state.lock();
        let task_name = state
            .last_task_name
            .clone()
            .unwrap_or_else(|| task.name.trim().to_string());
        let msg = format::retry_line(&task_name, result, attempts, retries);
        state.logger.emit(&msg);
    }

    async fn on_include(&self, included: &IncludedFileInfo) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let msg = format::include_banner("Included", included, now);
        state.logger.emit(&msg);
    }

    async fn on_import(&self, imported: &IncludedFileInfo) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let msg = format::include_banner("Imported", imported, now);
        state.logger.emit(&msg);
    }

    async fn on_stats(&self, stats: &BTreeMap<String, HostStats>) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let closed = state.report.tests.pass_running(now);
        self.record_transition(&mut state, closed);
        state.report.finish_run(now);

        let recap = format::play_recap(stats, now);
        state.logger.emit(&recap);

        self.update_os_release_info(&state);
        self.write_summary(&mut state, now);
        self.archive_logs(&mut state);
    }
}
