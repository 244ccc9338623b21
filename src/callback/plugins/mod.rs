//! Callback plugins.
//!
//! - [`GosvLogCallback`] - Guest OS validation logs, test results and
//!   summary tables

pub mod gosv_log;

pub use gosv_log::{GosvLogCallback, DEPLOY_CASENAME_FACT, TESTING_VARS_EXTRA_VAR};
