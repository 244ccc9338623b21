//! Callback event types for the gosv-log plugin
//!
//! These are the narrow payload shapes the plugin needs from the host
//! runtime. A host either calls the [`ExecutionCallback`] hooks directly with
//! them or records [`CallbackEvent`] values for later replay.
//!
//! ## Event Categories
//!
//! - **Playbook Events**: start of the whole run
//! - **Play Events**: start of each play (test case boundary)
//! - **Task Events**: task lifecycle (start, ok, failed, skipped, unreachable)
//! - **Runner Events**: loop items and retries
//! - **Include Events**: included and imported task files
//! - **Stats Events**: final per-host statistics
//!
//! [`ExecutionCallback`]: crate::traits::ExecutionCallback

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Result key holding the delegated host variables.
pub const DELEGATED_VARS_KEY: &str = "_ansible_delegated_vars";
/// Result key holding an explicit loop item label.
pub const ITEM_LABEL_KEY: &str = "_ansible_item_label";
/// Result key holding the raw loop item.
pub const ITEM_KEY: &str = "item";
/// Result key holding per-item results of a looped task.
pub const LOOP_RESULTS_KEY: &str = "results";
/// Result key holding a captured traceback.
pub const EXCEPTION_KEY: &str = "exception";
/// Result key holding facts registered by `set_fact`.
pub const FACTS_KEY: &str = "ansible_facts";

// ============================================================================
// Core Event Enum
// ============================================================================

/// All lifecycle events the plugin reacts to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum CallbackEvent {
    /// The playbook run started. First event of any run.
    PlaybookStart {
        /// Information about the playbook being executed
        playbook: PlaybookInfo,
    },

    /// A play started.
    PlayStart {
        /// Information about the play
        play: PlayInfo,
    },

    /// A task started.
    TaskStart {
        /// Information about the task
        task: TaskInfo,
        /// Whether this is a handler task
        #[serde(default)]
        is_handler: bool,
    },

    /// A task completed successfully on a host.
    TaskOk {
        /// Information about the task
        task: TaskInfo,
        /// Result of the task
        result: ResultInfo,
    },

    /// A task failed on a host.
    TaskFailed {
        /// Information about the task
        task: TaskInfo,
        /// Result of the task
        result: ResultInfo,
        /// Whether errors were ignored for this task
        #[serde(default)]
        ignore_errors: bool,
    },

    /// A task was skipped on a host.
    TaskSkipped {
        /// Information about the task
        task: TaskInfo,
        /// Result of the task
        result: ResultInfo,
    },

    /// A host was unreachable for a task.
    TaskUnreachable {
        /// Information about the task
        task: TaskInfo,
        /// Result of the task
        result: ResultInfo,
    },

    /// A loop item completed successfully.
    RunnerItemOk {
        /// Information about the looped task
        task: TaskInfo,
        /// Result for this item
        result: ResultInfo,
    },

    /// A loop item failed.
    RunnerItemFailed {
        /// Information about the looped task
        task: TaskInfo,
        /// Result for this item
        result: ResultInfo,
    },

    /// A loop item was skipped.
    RunnerItemSkipped {
        /// Information about the looped task
        task: TaskInfo,
        /// Result for this item
        result: ResultInfo,
    },

    /// A task is being retried.
    RunnerRetry {
        /// Information about the task
        task: TaskInfo,
        /// Result from the failed attempt
        result: ResultInfo,
        /// Attempts made so far
        attempts: u32,
        /// Total retries allowed
        retries: u32,
    },

    /// A task file was included for a set of hosts.
    Include {
        /// The included file
        included: IncludedFileInfo,
    },

    /// A task file was imported for a host.
    Import {
        /// The imported file
        included: IncludedFileInfo,
    },

    /// Final statistics. Last event of any run.
    Stats {
        /// Per-host statistics
        stats: BTreeMap<String, HostStats>,
    },
}

impl CallbackEvent {
    /// Returns the event type name as a string.
    pub fn event_type(&self) -> &'static str {
        match self {
            CallbackEvent::PlaybookStart { .. } => "playbook_start",
            CallbackEvent::PlayStart { .. } => "play_start",
            CallbackEvent::TaskStart { .. } => "task_start",
            CallbackEvent::TaskOk { .. } => "task_ok",
            CallbackEvent::TaskFailed { .. } => "task_failed",
            CallbackEvent::TaskSkipped { .. } => "task_skipped",
            CallbackEvent::TaskUnreachable { .. } => "task_unreachable",
            CallbackEvent::RunnerItemOk { .. } => "runner_item_ok",
            CallbackEvent::RunnerItemFailed { .. } => "runner_item_failed",
            CallbackEvent::RunnerItemSkipped { .. } => "runner_item_skipped",
            CallbackEvent::RunnerRetry { .. } => "runner_retry",
            CallbackEvent::Include { .. } => "include",
            CallbackEvent::Import { .. } => "import",
            CallbackEvent::Stats { .. } => "stats",
        }
    }
}

/// An event as stored in a recorded stream, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// When the host emitted the event, if it was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// The event itself
    pub event: CallbackEvent,
}

/// Parses a recorded event stream. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`Error::EventDecode`] with the 1-based number of the first line
/// that is not a valid event.
///
/// [`Error::EventDecode`]: crate::error::Error::EventDecode
pub fn parse_event_stream(text: &str) -> crate::error::Result<Vec<RecordedEvent>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| crate::error::Error::EventDecode {
                line: index + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

// ============================================================================
// Context Structs
// ============================================================================

/// Information about the playbook run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybookInfo {
    /// Name of the playbook
    pub name: String,
    /// Path to the playbook file
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    /// Positional command line arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra variables provided on the command line
    #[serde(default)]
    pub extra_vars: HashMap<String, JsonValue>,
}

impl PlaybookInfo {
    /// Create a new PlaybookInfo.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the file path.
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Set the positional arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an extra variable.
    pub fn with_extra_var(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.extra_vars.insert(key.into(), value.into());
        self
    }

    /// Returns an extra variable rendered as a plain string.
    pub fn extra_var_str(&self, key: &str) -> Option<String> {
        self.extra_vars
            .get(key)
            .map(value_to_plain_string)
            .filter(|s| !s.is_empty())
    }
}

/// Information about a play.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayInfo {
    /// Name of the play
    pub name: String,
    /// Source file the play was loaded from
    #[serde(default)]
    pub path: Option<String>,
    /// Strategy for this play
    #[serde(default)]
    pub strategy: Option<String>,
}

impl PlayInfo {
    /// Create a new PlayInfo.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the source path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the strategy.
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Whether task names cannot be cached across hosts for this play.
    pub fn has_free_strategy(&self) -> bool {
        matches!(self.strategy.as_deref(), Some("free" | "host_pinned"))
    }
}

/// Information about a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Task name
    pub name: String,
    /// Unique task identifier
    pub task_uuid: String,
    /// Source location of the task, `file:line`
    #[serde(default)]
    pub task_path: Option<String>,
    /// Action (module) being executed
    pub action: String,
    /// Task arguments
    #[serde(default)]
    pub args: IndexMap<String, JsonValue>,
    /// Host on which the task ran
    pub host: String,
    /// Whether the task has loop items
    #[serde(default)]
    pub is_loop: bool,
}

impl TaskInfo {
    /// Create a new TaskInfo. The uuid defaults to the task name.
    pub fn new(
        name: impl Into<String>,
        action: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            task_uuid: name.clone(),
            name,
            task_path: None,
            action: action.into(),
            args: IndexMap::new(),
            host: host.into(),
            is_loop: false,
        }
    }

    /// Set the task UUID.
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.task_uuid = uuid.into();
        self
    }

    /// Set the task path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.task_path = Some(path.into());
        self
    }

    /// Add a task argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Mark the task as looped.
    pub fn with_loop(mut self) -> Self {
        self.is_loop = true;
        self
    }

    /// Base name of the file the task comes from, without the `:line` suffix.
    pub fn file_name(&self) -> Option<&str> {
        let path = self.task_path.as_deref()?;
        let base = Path::new(path).file_name()?.to_str()?;
        let base = base.split(':').next().unwrap_or(base).trim();
        (!base.is_empty()).then_some(base)
    }

    /// The variable printed by a `debug var=<name>` task.
    pub fn debug_var(&self) -> Option<String> {
        self.args
            .get("var")
            .map(value_to_plain_string)
            .filter(|s| !s.is_empty())
    }
}

/// Task status reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Completed without changes
    Ok,
    /// Completed with changes
    Changed,
    /// Failed
    Failed,
    /// Skipped by condition
    Skipped,
    /// Host unreachable
    Unreachable,
}

/// Result dictionary of a task on one host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultInfo {
    /// Raw result data as returned by the module
    #[serde(default)]
    pub data: IndexMap<String, JsonValue>,
}

impl ResultInfo {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a result from a JSON object. Non-objects give an empty result.
    pub fn from_json(value: JsonValue) -> Self {
        let data = match value {
            JsonValue::Object(map) => map.into_iter().collect(),
            _ => IndexMap::new(),
        };
        Self { data }
    }

    /// Set a key in the result.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Whether the task reported a change.
    pub fn changed(&self) -> bool {
        self.data
            .get("changed")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }

    /// Whether this is the aggregate result of a looped task.
    pub fn has_loop_results(&self) -> bool {
        self.data.contains_key(LOOP_RESULTS_KEY)
    }

    /// Host the task was delegated to, if any.
    pub fn delegated_host(&self) -> Option<String> {
        self.data
            .get(DELEGATED_VARS_KEY)?
            .get("ansible_host")
            .map(value_to_plain_string)
    }

    /// Label of the loop item this result belongs to.
    pub fn item_label(&self) -> Option<String> {
        self.data
            .get(ITEM_LABEL_KEY)
            .or_else(|| self.data.get(ITEM_KEY))
            .map(value_to_plain_string)
    }

    /// Removes and returns the captured traceback, if any.
    pub fn take_exception(&mut self) -> Option<String> {
        self.data
            .shift_remove(EXCEPTION_KEY)
            .map(|v| value_to_plain_string(&v))
    }

    /// A value printed by a `debug var=<name>` task.
    pub fn debug_value(&self, var: &str) -> Option<String> {
        self.data.get(var).map(value_to_plain_string)
    }

    /// A fact registered by `set_fact`.
    pub fn fact(&self, name: &str) -> Option<String> {
        self.data
            .get(FACTS_KEY)?
            .get(name)
            .map(value_to_plain_string)
    }

    /// Message of the result, if it is a string.
    pub fn msg(&self) -> Option<&str> {
        self.data.get("msg").and_then(JsonValue::as_str)
    }
}

/// An included or imported task file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludedFileInfo {
    /// Path of the included file
    pub filename: String,
    /// Hosts the file was included for
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Variables of the include, carrying the loop item if any
    #[serde(default)]
    pub vars: IndexMap<String, JsonValue>,
}

impl IncludedFileInfo {
    /// Create a new IncludedFileInfo.
    pub fn new(filename: impl Into<String>, hosts: Vec<String>) -> Self {
        Self {
            filename: filename.into(),
            hosts,
            vars: IndexMap::new(),
        }
    }

    /// Label of the loop item, if the include was looped.
    pub fn item_label(&self) -> Option<String> {
        self.vars
            .get(ITEM_LABEL_KEY)
            .or_else(|| self.vars.get(ITEM_KEY))
            .map(value_to_plain_string)
    }
}

/// Final statistics for one host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostStats {
    pub ok: u32,
    pub changed: u32,
    pub unreachable: u32,
    pub failures: u32,
    pub skipped: u32,
    pub rescued: u32,
    pub ignored: u32,
}

/// Renders a JSON value the way it reads in a log line: strings unquoted,
/// null as empty, everything else as compact JSON.
pub fn value_to_plain_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_callback_event_type() {
        let event = CallbackEvent::PlaybookStart {
            playbook: PlaybookInfo::new("main.yml"),
        };
        assert_eq!(event.event_type(), "playbook_start");
    }

    #[test]
    fn test_task_file_name_strips_line() {
        let task = TaskInfo::new("Print version", "debug", "localhost")
            .with_path("/work/common/vcenter_get_version_build.yml:42");
        assert_eq!(task.file_name(), Some("vcenter_get_version_build.yml"));

        let no_path = TaskInfo::new("Print version", "debug", "localhost");
        assert_eq!(no_path.file_name(), None);
    }

    #[test]
    fn test_debug_var_and_value() {
        let task = TaskInfo::new("Show IP", "debug", "localhost").with_arg("var", "vm_guest_ip");
        let result = ResultInfo::new().with("vm_guest_ip", "192.168.10.125");
        let var = task.debug_var().unwrap();
        assert_eq!(var, "vm_guest_ip");
        assert_eq!(result.debug_value(&var).as_deref(), Some("192.168.10.125"));
    }

    #[test]
    fn test_item_label_prefers_explicit_label() {
        let result = ResultInfo::new()
            .with("item", json!({"name": "eth0"}))
            .with("_ansible_item_label", "eth0");
        assert_eq!(result.item_label().as_deref(), Some("eth0"));

        let result = ResultInfo::new().with("item", json!({"name": "eth1"}));
        assert_eq!(result.item_label().as_deref(), Some(r#"{"name":"eth1"}"#));
    }

    #[test]
    fn test_take_exception_removes_key() {
        let mut result = ResultInfo::new()
            .with("exception", "Traceback ...")
            .with("msg", "boom");
        assert_eq!(result.take_exception().as_deref(), Some("Traceback ..."));
        assert!(!result.data.contains_key("exception"));
        assert_eq!(result.take_exception(), None);
    }

    #[test]
    fn test_delegated_host() {
        let result = ResultInfo::new().with(
            "_ansible_delegated_vars",
            json!({"ansible_host": "10.0.0.5", "ansible_port": 22}),
        );
        assert_eq!(result.delegated_host().as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_fact_lookup() {
        let result = ResultInfo::new().with(
            "ansible_facts",
            json!({"vm_hardware_version": "vmx-19", "vm_guest_id": "vmwarePhoton64Guest"}),
        );
        assert_eq!(result.fact("vm_hardware_version").as_deref(), Some("vmx-19"));
        assert_eq!(result.fact("missing"), None);
    }

    #[test]
    fn test_recorded_event_roundtrip() {
        let line = r#"{"timestamp":"2024-05-01T10:00:00Z","event":{"event_type":"play_start","play":{"name":"deploy_vm","path":"linux/deploy_vm/deploy_vm.yml"}}}"#;
        let recorded: RecordedEvent = serde_json::from_str(line).unwrap();
        assert!(recorded.timestamp.is_some());
        match recorded.event {
            CallbackEvent::PlayStart { play } => {
                assert_eq!(play.name, "deploy_vm");
                assert_eq!(play.path.as_deref(), Some("linux/deploy_vm/deploy_vm.yml"));
            }
            other => panic!("unexpected event {}", other.event_type()),
        }
    }

    #[test]
    fn test_parse_event_stream_reports_line() {
        let text = concat!(
            r#"{"event":{"event_type":"playbook_start","playbook":{"name":"main.yml"}}}"#,
            "\n\n",
            r#"{"event":{"event_type":"stats","stats":{}}}"#,
            "\n"
        );
        let events = parse_event_stream(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event.event_type(), "stats");

        let err = parse_event_stream("\n{\"event\":{}}\n").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::EventDecode { line: 2, .. }
        ));
    }

    #[test]
    fn test_play_strategy() {
        assert!(PlayInfo::new("p").with_strategy("free").has_free_strategy());
        assert!(!PlayInfo::new("p").with_strategy("linear").has_free_strategy());
        assert!(!PlayInfo::new("p").has_free_strategy());
    }
}
