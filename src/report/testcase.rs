//! Test case lifecycle tracking.
//!
//! A test case opens as `Running` when its play starts and ends in exactly
//! one of `Passed`, `Failed` or `No Run`. At most one test case is running
//! at a time: opening a new one closes the previous one as passed.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::clock::elapsed_secs;

/// Status of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestStatus {
    Running,
    Passed,
    Failed,
    #[serde(rename = "No Run")]
    NoRun,
}

impl TestStatus {
    /// Whether the status is final.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TestStatus::Running)
    }

    /// Display form.
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Running => "Running",
            TestStatus::Passed => "Passed",
            TestStatus::Failed => "Failed",
            TestStatus::NoRun => "No Run",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One test case of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub status: TestStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Whole seconds between start and finish
    pub duration: u64,
}

impl TestCase {
    fn new(name: String, started_at: DateTime<Utc>) -> Self {
        Self {
            name,
            status: TestStatus::Running,
            started_at,
            finished_at: None,
            duration: 0,
        }
    }

    fn finish(&mut self, status: TestStatus, at: DateTime<Utc>) {
        let at = at.max(self.started_at);
        self.status = status;
        self.finished_at = Some(at);
        self.duration = elapsed_secs(self.started_at, at);
    }
}

/// A test case reaching a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub name: String,
    pub status: TestStatus,
}

impl Transition {
    /// The line recorded in the results file.
    pub fn results_line(&self) -> String {
        format!("{}: {}\n", self.name, self.status)
    }
}

/// Ordered collection of test cases with a pointer to the running one.
///
/// The current test case is the one opened last in the active play. It
/// outlives the running pointer so that failures after the test case
/// finished are still grouped under its name.
#[derive(Debug, Clone, Default)]
pub struct TestCaseTracker {
    cases: IndexMap<String, TestCase>,
    running: Option<String>,
    current: Option<String>,
}

impl TestCaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a test case as running.
    ///
    /// A test case still running is closed as passed first and its
    /// transition returned. Reopening an existing name restarts it in place.
    pub fn open(&mut self, name: &str, now: DateTime<Utc>) -> Option<Transition> {
        let closed = self.finish_running(TestStatus::Passed, now);
        self.cases
            .insert(name.to_string(), TestCase::new(name.to_string(), now));
        self.running = Some(name.to_string());
        self.current = Some(name.to_string());
        closed
    }

    /// Closes the running test case as passed.
    pub fn pass_running(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        self.finish_running(TestStatus::Passed, now)
    }

    /// Closes the running test case as failed.
    pub fn fail_running(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        self.finish_running(TestStatus::Failed, now)
    }

    /// Marks a named test case as not run.
    ///
    /// Unknown names and test cases already marked are left alone.
    pub fn mark_no_run(&mut self, name: &str, now: DateTime<Utc>) -> Option<Transition> {
        let case = self.cases.get_mut(name)?;
        if case.status == TestStatus::NoRun {
            return None;
        }
        case.finish(TestStatus::NoRun, now);
        if self.running.as_deref() == Some(name) {
            self.running = None;
        }
        Some(Transition {
            name: name.to_string(),
            status: TestStatus::NoRun,
        })
    }

    /// Renames the running test case, keeping its position.
    ///
    /// Returns `false` when nothing is running or the name is unchanged.
    pub fn rename_running(&mut self, new_name: &str) -> bool {
        let Some(old_name) = self.running.clone() else {
            return false;
        };
        if old_name == new_name || new_name.is_empty() {
            return false;
        }

        let cases = std::mem::take(&mut self.cases);
        self.cases = cases
            .into_iter()
            .filter(|(name, _)| name != new_name)
            .map(|(name, mut case)| {
                if name == old_name {
                    case.name = new_name.to_string();
                    (new_name.to_string(), case)
                } else {
                    (name, case)
                }
            })
            .collect();
        self.running = Some(new_name.to_string());
        self.current = Some(new_name.to_string());
        true
    }

    /// Forgets the current test case, e.g. when a play without one starts.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    fn finish_running(&mut self, status: TestStatus, now: DateTime<Utc>) -> Option<Transition> {
        let name = self.running.take()?;
        let case = self.cases.get_mut(&name)?;
        if case.status != TestStatus::Running {
            return None;
        }
        case.finish(status, now);
        Some(Transition { name, status })
    }

    /// Name of the running test case.
    pub fn running(&self) -> Option<&str> {
        self.running.as_deref()
    }

    /// Name of the test case opened last in the active play, running or not.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Looks up a test case by name.
    pub fn get(&self, name: &str) -> Option<&TestCase> {
        self.cases.get(name)
    }

    /// Test cases in the order they were opened.
    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.values()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Number of test cases with the given status.
    pub fn count(&self, status: TestStatus) -> usize {
        self.cases.values().filter(|c| c.status == status).count()
    }
}
