//! Test run report state and rendering.
//!
//! [`ReportAccumulator`] owns everything the plugin learns during a run:
//! the test cases, the collected facts, the testing vars and the cache of
//! failed task paths. The summary tables are rendered from it at the end.

pub mod facts;
pub mod os_release;
pub mod render;
pub mod table;
pub mod testcase;
pub mod vars;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::clock::elapsed_secs;

pub use facts::{FactTarget, ReportFacts, ServerInfo, VmField, VmInfo, FACT_RULES};
pub use table::{Column, TextTable};
pub use testcase::{TestCase, TestCaseTracker, TestStatus, Transition};
pub use vars::TestingVars;

/// Task paths already reported as failed, per test case or play.
///
/// Cleared at every play start. Only used to avoid repeating banners in the
/// failed tasks log.
#[derive(Debug, Clone, Default)]
pub struct FailedTasksCache {
    entries: IndexMap<String, Vec<String>>,
}

/// What a new failure adds to the failed tasks log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureNovelty {
    /// First failure reported under this test case or play
    pub first_in_play: bool,
    /// First failure reported for this task path
    pub new_task_path: bool,
}

impl FailedTasksCache {
    /// Records a failure of `task_path` under `owner`.
    pub fn record(&mut self, owner: &str, task_path: Option<&str>) -> FailureNovelty {
        let first_in_play = !self.entries.contains_key(owner);
        let paths = self.entries.entry(owner.to_string()).or_default();

        let new_task_path = match task_path {
            Some(path) if !paths.iter().any(|p| p == path) => {
                paths.push(path.to_string());
                true
            }
            _ => false,
        };

        FailureNovelty {
            first_in_play,
            new_task_path,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The three summary blocks printed at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryReport {
    pub testbed: String,
    pub vm_info: String,
    pub results: String,
}

/// Everything collected about one run.
#[derive(Debug, Default)]
pub struct ReportAccumulator {
    pub tests: TestCaseTracker,
    pub facts: ReportFacts,
    pub failed_tasks: FailedTasksCache,
    pub vars: TestingVars,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ReportAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the run start and the testing vars it uses.
    pub fn start_run(&mut self, vars: TestingVars, now: DateTime<Utc>) {
        if let Some(vm_name) = vars.get_str("vm_name") {
            self.facts.track_vm(vm_name);
        }
        self.vars = vars;
        self.started_at = Some(now);
    }

    /// Records the run end and fills server hostnames from the testing vars.
    pub fn finish_run(&mut self, now: DateTime<Utc>) {
        self.finished_at = Some(now);
        self.facts.settle_guest_os_type();
        self.facts.fill_from_testing_vars(&self.vars);
    }

    /// Whole seconds between run start and end, zero if either is unknown.
    pub fn elapsed_secs(&self) -> u64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => elapsed_secs(start, end),
            _ => 0,
        }
    }

    /// Renders the testbed, VM and results blocks.
    pub fn render_summary(&self, wrap_width: usize) -> SummaryReport {
        SummaryReport {
            testbed: render::render_testbed(&self.facts),
            vm_info: render::render_vm_info(self.facts.vm.as_ref(), wrap_width),
            results: render::render_results(&self.tests, self.elapsed_secs()),
        }
    }
}
