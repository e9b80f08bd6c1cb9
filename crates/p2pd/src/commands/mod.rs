//! Command handlers and the settings they share.

pub mod config_cmd;
pub mod run;

use std::path::PathBuf;

use clap::ValueEnum;

use p2pd_config::{Config, ConfigError};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

/// Config file plus CLI overrides, resolved once per invocation.
pub struct Context {
    pub path: PathBuf,
    pub config: Config,
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
}

impl Context {
    pub fn resolve(global: &GlobalOpts) -> Result<Self, CliError> {
        let path = global
            .config
            .clone()
            .unwrap_or_else(p2pd_config::config_path);
        let config =
            p2pd_config::load_config_from(&path).map_err(|e| CliError::config(&path, e))?;

        let format = match global.output {
            Some(format) => format,
            None => parse_setting(&path, "defaults.output", &config.defaults.output)?,
        };
        let color = match global.color {
            Some(mode) => mode,
            None => parse_setting::<ColorMode>(&path, "defaults.color", &config.defaults.color)?,
        };

        Ok(Self {
            path,
            config,
            format,
            color: output::should_color(color),
            quiet: global.quiet,
        })
    }
}

fn parse_setting<T: ValueEnum>(
    path: &std::path::Path,
    field: &str,
    value: &str,
) -> Result<T, CliError> {
    T::from_str(value, true).map_err(|reason| {
        CliError::config(
            path,
            ConfigError::Validation {
                field: field.into(),
                reason,
            },
        )
    })
}
