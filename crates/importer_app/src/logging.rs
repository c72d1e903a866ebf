//! Logger setup for the importer binary.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Install the global logger: the terminal, plus `log_file` when given.
///
/// Verbose runs log at debug level, but only for the importer's own crates
/// so HTTP client chatter stays out of the output.
pub fn initialize(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = build_config(verbose);

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        loggers.push(WriteLogger::new(level, config, file));
    }

    // Already initialized only happens when embedding; keep the first logger.
    let _ = CombinedLogger::init(loggers);
    Ok(())
}

fn build_config(verbose: bool) -> Config {
    let mut builder = ConfigBuilder::new();
    builder
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error);
    if verbose {
        builder.add_filter_allow_str("importer");
    }
    builder.build()
}
