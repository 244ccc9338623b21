//! The hook interface between a host runtime and gosv-log.
//!
//! A host calls one method per lifecycle event, one at a time, in event
//! order. Every method has a no-op default so a plugin only implements the
//! hooks it cares about.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::callback::types::{
    CallbackEvent, HostStats, IncludedFileInfo, PlayInfo, PlaybookInfo, ResultInfo, TaskInfo,
};

/// Callback for receiving execution events.
///
/// Hooks never fail: a plugin recovers from its own errors so that the run
/// it observes is never aborted by reporting.
#[async_trait]
pub trait ExecutionCallback: Send + Sync {
    /// Called when a playbook starts.
    async fn on_playbook_start(&self, playbook: &PlaybookInfo) {
        let _ = playbook;
    }

    /// Called when a play starts.
    async fn on_play_start(&self, play: &PlayInfo) {
        let _ = play;
    }

    /// Called when a task (or handler) starts.
    async fn on_task_start(&self, task: &TaskInfo, is_handler: bool) {
        let _ = (task, is_handler);
    }

    /// Called when a task completes successfully on a host.
    async fn on_task_ok(&self, task: &TaskInfo, result: &ResultInfo) {
        let _ = (task, result);
    }

    /// Called when a task fails on a host.
    async fn on_task_failed(&self, task: &TaskInfo, result: &ResultInfo, ignore_errors: bool) {
        let _ = (task, result, ignore_errors);
    }

    /// Called when a task is skipped on a host.
    async fn on_task_skipped(&self, task: &TaskInfo, result: &ResultInfo) {
        let _ = (task, result);
    }

    /// Called when a host is unreachable.
    async fn on_task_unreachable(&self, task: &TaskInfo, result: &ResultInfo) {
        let _ = (task, result);
    }

    /// Called when a loop item succeeds.
    async fn on_item_ok(&self, task: &TaskInfo, result: &ResultInfo) {
        let _ = (task, result);
    }

    /// Called when a loop item fails.
    async fn on_item_failed(&self, task: &TaskInfo, result: &ResultInfo) {
        let _ = (task, result);
    }

    /// Called when a loop item is skipped.
    async fn on_item_skipped(&self, task: &TaskInfo, result: &ResultInfo) {
        let _ = (task, result);
    }

    /// Called when a task is retried.
    async fn on_retry(&self, task: &TaskInfo, result: &ResultInfo, attempts: u32, retries: u32) {
        let _ = (task, result, attempts, retries);
    }

    /// Called when a task file is included.
    async fn on_include(&self, included: &IncludedFileInfo) {
        let _ = included;
    }

    /// Called when a task file is imported for a host.
    async fn on_import(&self, imported: &IncludedFileInfo) {
        let _ = imported;
    }

    /// Called with the final statistics at the end of the run.
    async fn on_stats(&self, stats: &BTreeMap<String, HostStats>) {
        let _ = stats;
    }

    /// Routes a recorded event to the matching hook.
    async fn dispatch(&self, event: &CallbackEvent) {
        match event {
            CallbackEvent::PlaybookStart { playbook } => self.on_playbook_start(playbook).await,
            CallbackEvent::PlayStart { play } => self.on_play_start(play).await,
            CallbackEvent::TaskStart { task, is_handler } => {
                self.on_task_start(task, *is_handler).await;
            }
            CallbackEvent::TaskOk { task, result } => self.on_task_ok(task, result).await,
            CallbackEvent::TaskFailed {
                task,
                result,
                ignore_errors,
            } => self.on_task_failed(task, result, *ignore_errors).await,
            CallbackEvent::TaskSkipped { task, result } => {
                self.on_task_skipped(task, result).await;
            }
            CallbackEvent::TaskUnreachable { task, result } => {
                self.on_task_unreachable(task, result).await;
            }
            CallbackEvent::RunnerItemOk { task, result } => self.on_item_ok(task, result).await,
            CallbackEvent::RunnerItemFailed { task, result } => {
                self.on_item_failed(task, result).await;
            }
            CallbackEvent::RunnerItemSkipped { task, result } => {
                self.on_item_skipped(task, result).await;
            }
            CallbackEvent::RunnerRetry {
                task,
                result,
                attempts,
                retries,
            } => self.on_retry(task, result, *attempts, *retries).await,
            CallbackEvent::Include { included } => self.on_include(included).await,
            CallbackEvent::Import { included } => self.on_import(included).await,
            CallbackEvent::Stats { stats } => self.on_stats(stats).await,
        }
    }
}
