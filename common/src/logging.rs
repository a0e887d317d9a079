// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Root logger construction shared by the workspace daemons.

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::str::FromStr;

use slog::Drain;

/// How log records are rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Terminal-friendly output for interactive use
    Human,
    /// Newline-delimited JSON for log collection
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("invalid log format: {s}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogFormat::Human => write!(f, "human"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Build the root logger for a daemon.  Records go to `log_file` when one is
/// given and to stdout otherwise, rendered per `format`.
pub fn init(
    name: &str,
    log_file: &Option<String>,
    format: LogFormat,
) -> io::Result<slog::Logger> {
    let name = name.to_string();
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            match format {
                LogFormat::Human => {
                    let decorator = slog_term::PlainDecorator::new(file);
                    let drain =
                        slog_term::FullFormat::new(decorator).build().fuse();
                    let drain = slog_async::Async::new(drain).build().fuse();
                    Ok(slog::Logger::root(drain, slog::o!("daemon" => name)))
                }
                LogFormat::Json => {
                    let drain = slog_json::Json::new(file)
                        .add_default_keys()
                        .build()
                        .fuse();
                    let drain = slog_async::Async::new(drain).build().fuse();
                    Ok(slog::Logger::root(drain, slog::o!("daemon" => name)))
                }
            }
        }
        None => match format {
            LogFormat::Human => {
                let decorator = slog_term::TermDecorator::new().build();
                let drain =
                    slog_term::FullFormat::new(decorator).build().fuse();
                let drain = slog_async::Async::new(drain).build().fuse();
                Ok(slog::Logger::root(drain, slog::o!("daemon" => name)))
            }
            LogFormat::Json => {
                let drain = slog_json::Json::new(io::stdout())
                    .add_default_keys()
                    .build()
                    .fuse();
                let drain = slog_async::Async::new(drain).build().fuse();
                Ok(slog::Logger::root(drain, slog::o!("daemon" => name)))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::LogFormat;

    #[test]
    fn test_format_parsing() {
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("bunyan".parse::<LogFormat>().is_err());
    }
}
