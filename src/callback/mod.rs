//! Callback plugin for guest OS validation runs
//!
//! This module receives the execution events of a validation run and turns
//! them into the run's log files and reports.
//!
//! # Architecture
//!
//! 1. **[`ExecutionCallback`]** trait: hooks a host runtime calls per event
//! 2. **[`types`]**: event payloads and the recorded event stream format
//! 3. **[`format`]**: banners, result lines and the play recap as text
//! 4. **[`GosvLogCallback`]**: the plugin tying the report state, log
//!    files and run directory together
//!
//! # Quick Start with Prelude
//!
//! ```rust,ignore
//! use gosv_log::callback::prelude::*;
//!
//! let callback = GosvLogCallback::new(GosvLogConfig::load(None)?)?;
//! for event in events {
//!     callback.dispatch(&event).await;
//! }
//! ```
//!
//! [`ExecutionCallback`]: crate::traits::ExecutionCallback

pub mod config;
pub mod format;
pub mod plugins;
pub mod types;

pub use config::{GosvLogConfig, GosvLogConfigBuilder};
pub use plugins::GosvLogCallback;
pub use types::{
    CallbackEvent, HostStats, IncludedFileInfo, PlayInfo, PlaybookInfo, RecordedEvent,
    ResultInfo, TaskInfo, TaskStatus,
};

/// Convenient re-exports for driving the plugin.
pub mod prelude {
    pub use crate::traits::ExecutionCallback;

    pub use super::{
        CallbackEvent, GosvLogCallback, GosvLogConfig, HostStats, IncludedFileInfo, PlayInfo,
        PlaybookInfo, RecordedEvent, ResultInfo, TaskInfo, TaskStatus,
    };

    pub use async_trait::async_trait;
}
