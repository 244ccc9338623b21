//! Subcommands module for gosv-log CLI

pub mod replay;

use anyhow::Result;
use gosv_log::GosvLogConfig;

use crate::cli::{Cli, ConfigFormat};

/// Common context shared between commands
pub struct CommandContext {
    /// Effective configuration
    pub config: GosvLogConfig,
}

impl CommandContext {
    /// Loads the configuration and applies the command line overrides.
    pub fn new(cli: &Cli) -> Result<Self> {
        let mut config = GosvLogConfig::load(cli.config.as_deref())?;
        if let Some(dir) = &cli.project_dir {
            config.project_dir = dir.clone();
        }
        if let Some(root) = &cli.log_root {
            config.log_root = Some(root.clone());
        }
        if cli.no_console {
            config.console = false;
        }
        config.validate()?;

        Ok(Self { config })
    }
}

/// Prints the effective configuration.
pub fn show_config(format: ConfigFormat, ctx: &CommandContext) -> Result<i32> {
    let text = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&ctx.config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&ctx.config)?,
    };
    print!("{text}");
    Ok(0)
}
