use crate::config::Config;
use anyhow::Context;
use env_logger::Target;
use std::fs::OpenOptions;
use std::io::Write;

/// Install the global logger. The level comes from the configuration; the
/// destination is stdout when forced, else the configured log file, else
/// stderr.
pub fn init(config: &Config, to_stdout: bool) -> anyhow::Result<()> {
    let target = open_target(config, to_stdout)?;

    env_logger::Builder::from_default_env()
        .filter_level(config.log_level.to_level_filter())
        .target(target)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        })
        .try_init()
        .context("logger already initialized")?;
    Ok(())
}

fn open_target(config: &Config, to_stdout: bool) -> anyhow::Result<Target> {
    if to_stdout {
        return Ok(Target::Stdout);
    }
    if config.log_file.trim().is_empty() {
        return Ok(Target::Stderr);
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("cannot open log file {}", config.log_file))?;
    Ok(Target::Pipe(Box::new(file)))
}
