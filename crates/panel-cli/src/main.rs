//! Survey panel CLI.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use panel_cli::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use panel_cli::commands::{
    run_all, run_dict, run_extract, run_filter_grid, run_grid, run_merge_grid,
};
use panel_cli::logging::{LogConfig, LogFormat, init_logging};
use panel_cli::summary::{
    print_dict_summary, print_extract_summary, print_filter_summary, print_grid_summary,
    print_merge_summary,
};
use tracing::level_filters::LevelFilter;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let result = match &cli.command {
        Command::Grid(args) => run_grid(args).map(|outcome| {
            print_grid_summary(&outcome);
            0
        }),
        Command::MergeGrid(args) => run_merge_grid(args).map(|outcome| {
            print_merge_summary(&outcome);
            0
        }),
        Command::FilterGrid(args) => run_filter_grid(args).map(|outcome| {
            print_filter_summary(&outcome);
            0
        }),
        Command::Dict(args) => run_dict(args).map(|outcome| {
            print_dict_summary(&outcome);
            0
        }),
        Command::Extract(args) => run_extract(args).map(|outcome| {
            print_extract_summary(&outcome);
            0
        }),
        Command::All(args) => run_all(args).map(|(dict, extract)| {
            print_dict_summary(&dict);
            print_extract_summary(&extract);
            0
        }),
    };
    let exit_code = result.unwrap_or_else(|error| {
        eprintln!("error: {error:#}");
        1
    });
    std::process::exit(exit_code);
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
