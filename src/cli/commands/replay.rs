//! Replay command - feed a recorded event stream through the plugin
//!
//! Each line of the input is one [`RecordedEvent`]. Recorded timestamps
//! drive the plugin clock so banners, durations and the run directory name
//! match the original run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use gosv_log::callback::types::{parse_event_stream, RecordedEvent};
use gosv_log::prelude::*;
use tracing::{debug, info};

use super::CommandContext;

/// Arguments for the replay command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// Recorded event stream, one JSON event per line
    #[arg(required = true)]
    pub events: PathBuf,

    /// Testing vars file, used when the stream does not name one
    #[arg(long)]
    pub testing_vars_file: Option<PathBuf>,
}

impl ReplayArgs {
    /// Execute the replay command.
    ///
    /// Exits with 1 when any test case failed, 0 otherwise.
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let text = tokio::fs::read_to_string(&self.events)
            .await
            .with_context(|| format!("cannot read event stream {}", self.events.display()))?;
        let mut events = parse_event_stream(&text)?;
        self.apply_testing_vars_file(&mut events);

        let start = events
            .iter()
            .find_map(|e| e.timestamp)
            .unwrap_or_else(Utc::now);
        let clock = Arc::new(ManualClock::new(start));
        let callback = GosvLogCallback::with_clock(ctx.config.clone(), clock.clone())?;

        info!(events = events.len(), run_dir = %callback.run_dir().display(), "replaying events");
        for recorded in &events {
            if let Some(at) = recorded.timestamp {
                clock.set(at);
            }
            debug!(event = recorded.event.event_type(), "dispatch");
            callback.dispatch(&recorded.event).await;
        }

        let failed = callback
            .test_cases()
            .iter()
            .any(|case| case.status == TestStatus::Failed);
        Ok(i32::from(failed))
    }

    fn apply_testing_vars_file(&self, events: &mut [RecordedEvent]) {
        let Some(path) = &self.testing_vars_file else {
            return;
        };
        for recorded in events {
            if let CallbackEvent::PlaybookStart { playbook } = &mut recorded.event {
                playbook
                    .extra_vars
                    .entry(gosv_log::callback::plugins::TESTING_VARS_EXTRA_VAR.to_string())
                    .or_insert_with(|| path.display().to_string().into());
            }
        }
    }
}
