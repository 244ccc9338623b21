//! # gosv-log - Guest OS validation run logging
//!
//! gosv-log observes the lifecycle events of a guest OS validation run
//! (playbook, play, task, loop item, retry, include and final stats events)
//! and turns them into a self-contained log directory per run:
//!
//! ```text
//! logs/
//! ├── current -> 2024-05-01-10-00-00
//! └── 2024-05-01-10-00-00/
//!     ├── full_debug.log      every banner and task result
//!     ├── failed_tasks.log    failed tasks, grouped by test case
//!     ├── test_results.yml    "<test case>: <status>" per finished test
//!     └── results.log         testbed, VM and test result tables
//! ```
//!
//! ## Core Concepts
//!
//! - **Test case**: a play loaded from a test case directory. It is
//!   `Passed`, `Failed` or `No Run` once finished.
//! - **Facts**: testbed and guest details picked out of debug and
//!   `set_fact` results of known tasks, first value wins.
//! - **Summary**: the tables printed and logged at the end of the run.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use gosv_log::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let callback = GosvLogCallback::new(GosvLogConfig::load(None)?)?;
//!
//!     callback.on_playbook_start(&PlaybookInfo::new("main.yml")).await;
//!     callback
//!         .on_play_start(&PlayInfo::new("check_ip").with_path("linux/check_ip/check_ip.yml"))
//!         .await;
//!     callback.on_stats(&Default::default()).await;
//!
//!     println!("{}", callback.summary().results);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::callback::prelude::*;
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::{Error, Result};
    pub use crate::report::{SummaryReport, TestCase, TestStatus};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
pub mod error;

/// The hook interface a host runtime drives.
pub mod traits;

/// Time source of the plugin, replaceable in tests and replays.
pub mod clock;

// ============================================================================
// Plugin
// ============================================================================

/// Event types, text formatting and the gosv-log callback plugin.
pub mod callback;

/// Test case tracking, fact collection and summary rendering.
pub mod report;

// ============================================================================
// Output
// ============================================================================

/// Run log directories and the `current` link.
pub mod logdir;

/// Log file fan-out and console output.
pub mod sink;

pub use callback::{GosvLogCallback, GosvLogConfig};
pub use error::{Error, Result};

/// Version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
