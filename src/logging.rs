
//! Logging setup for the command-line tool.
//!
//! Log records go to stderr and to `mixrank.log` in the output directory through `log4rs`, so the
//! log of a search stays next to its ranked results.

use std::path::Path;

use log::LevelFilter;
use log4rs::{
    append::{
        Append,
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};

pub const LOG_FILE: &str = "mixrank.log";
const LOG_PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S)}] {h({l})}: {m}{n}";

/// Level of records shown to the user.
pub fn log_level(verbose: bool) -> LevelFilter {
    if verbose { LevelFilter::Debug } else { LevelFilter::Info }
}

fn filtered(name: &str, append: Box<dyn Append>, level: LevelFilter) -> Appender {
    Appender::builder()
        .filter(Box::new(ThresholdFilter::new(level)))
        .build(name, append)
}

/// Build the stderr and log-file configuration without installing it.
pub fn logger_config(out_dir: &Path, verbose: bool) -> anyhow::Result<Config> {
    let level = log_level(verbose);

    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(out_dir.join(LOG_FILE))?;

    let names = ["console", "file"];
    let config = Config::builder()
        .appender(filtered(names[0], Box::new(console), level))
        .appender(filtered(names[1], Box::new(file), level))
        .build(Root::builder().appenders(names).build(LevelFilter::Trace))?;

    Ok(config)
}

/// Install the logger for the rest of the process.
pub fn setup_logger(out_dir: &Path, verbose: bool) -> anyhow::Result<()> {
    log4rs::init_config(logger_config(out_dir, verbose)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_config() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = logger_config(dir.path(), false)?;

        assert_eq!(config.appenders().len(), 2);
        assert!(dir.path().join(LOG_FILE).exists());
        assert_eq!(log_level(true), LevelFilter::Debug);
        assert_eq!(log_level(false), LevelFilter::Info);
        Ok(())
    }
}
