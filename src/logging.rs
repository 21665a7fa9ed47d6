//! Structured logging setup: colored level tags on stdout, plus a rotating
//! pair of plain-text files (one filtered to this crate's own target, one
//! unfiltered) under `log/<app_name>/`.

use colored::*;
use log::{Level, LevelFilter};
use std::fs;

pub fn init_logger(app_name: impl AsRef<str>, verbosity: u64) -> Result<(), fern::InitError> {
    let log_root = format!("log/{}", app_name.as_ref());
    fs::create_dir_all(&log_root).expect("failed to create log directory");

    let stdout_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                match record.level() {
                    Level::Error => format!("{}", record.level()).red(),
                    Level::Warn => format!("{}", record.level()).yellow(),
                    Level::Info => format!("{}", record.level()).cyan(),
                    Level::Debug => format!("{}", record.level()).purple(),
                    Level::Trace => format!("{}", record.level()).normal(),
                },
                record.target(),
                message
            ))
        })
        .level(match verbosity {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _4_or_more => LevelFilter::Trace,
        })
        .level_for(app_name.as_ref().to_string(), LevelFilter::Trace)
        .chain(std::io::stdout());

    let log_file_root = format!(
        "{}/{}.{}",
        log_root,
        app_name.as_ref(),
        chrono::Utc::now().format("%Y_%m_%d")
    );

    let own_target_dispatch = fern::Dispatch::new()
        .level(LevelFilter::Off)
        .level_for(app_name.as_ref().to_string(), LevelFilter::Trace)
        .chain(fern::log_file(format!("{log_file_root}.log"))?);

    let full_dispatch = fern::Dispatch::new().chain(fern::log_file(format!("{log_file_root}.full.log"))?);

    let files_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(own_target_dispatch)
        .chain(full_dispatch);

    fern::Dispatch::new()
        .chain(stdout_dispatch)
        .chain(files_dispatch)
        .apply()?;

    Ok(())
}
