use crate::config::LoggingConfig;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Level implied by `-v` flags, falling back to the configured level.
pub fn effective_level(config: &LoggingConfig, cli_verbose: u8) -> &str {
    match cli_verbose {
        0 => &config.level,
        1 => "debug",
        _ => "trace",
    }
}

/// Builds the filter: `RUST_LOG` wins, otherwise `arca=<level>` plus the
/// configured per-module directives.
pub fn build_filter(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<EnvFilter> {
    let level = effective_level(config, cli_verbose);
    let mut filter =
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| format!("arca={}", level)));

    for (module, level) in &config.module_filters {
        filter = filter.add_directive(format!("{}={}", module, level).parse()?);
    }
    Ok(filter)
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Initialize the logging system based on configuration
pub fn init_logging(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<()> {
    let filter = build_filter(config, cli_verbose)?;
    let subscriber = tracing_subscriber::registry().with(filter);
    let file = config
        .file_output
        .as_deref()
        .map(open_log_file)
        .transpose()?;

    match config.format.as_str() {
        "json" => {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_line_number(true)
                .with_file(true);
            let file_layer =
                file.map(|file| fmt::layer().json().with_writer(file).with_ansi(false));
            subscriber.with(json_layer).with(file_layer).try_init()?;
        }
        "compact" => {
            let compact_layer = fmt::layer()
                .compact()
                .with_target(false)
                .with_line_number(false)
                .with_file(false);
            let file_layer =
                file.map(|file| fmt::layer().compact().with_writer(file).with_ansi(false));
            subscriber.with(compact_layer).with(file_layer).try_init()?;
        }
        _ => {
            // Source locations only help at debug and below.
            let show_location = matches!(effective_level(config, cli_verbose), "debug" | "trace");
            let pretty_layer = fmt::layer()
                .with_target(show_location)
                .with_line_number(show_location)
                .with_file(show_location);
            let file_layer = file.map(|file| fmt::layer().with_writer(file).with_ansi(false));
            subscriber.with(pretty_layer).with(file_layer).try_init()?;
        }
    }

    Ok(())
}
