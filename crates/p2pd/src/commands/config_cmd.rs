//! Config subcommand handlers.

use p2pd_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::commands::Context;
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, ctx: &Context) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            // Validate too, so `show` doubles as a config check.
            ctx.config
                .to_supervisor_config()
                .map_err(|e| CliError::config(&ctx.path, e))?;
            let rendered = match output::render_structured(ctx.format, &ctx.config) {
                Some(rendered) => rendered,
                None => toml::to_string_pretty(&ctx.config)
                    .map_err(|e| CliError::config(&ctx.path, e.into()))?,
            };
            output::print_output(rendered.trim_end(), ctx.quiet);
            Ok(())
        }
        ConfigCommand::Path => {
            output::print_output(&ctx.path.display().to_string(), ctx.quiet);
            Ok(())
        }
        ConfigCommand::Init { force } => {
            if ctx.path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: ctx.path.display().to_string(),
                });
            }
            p2pd_config::save_config_to(&Config::default(), &ctx.path)
                .map_err(|e| CliError::config(&ctx.path, e))?;
            if !ctx.quiet {
                eprintln!("Wrote default configuration to {}", ctx.path.display());
            }
            Ok(())
        }
    }
}
