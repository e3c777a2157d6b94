use anyhow::Result;
use anyhow::anyhow;
use chrono::{Local, SecondsFormat};
use env_logger::Env;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::config::Config;

const ACTIVITY_PREFIX: &str = "MailSender: ";

/// Console diagnostics. `RUST_LOG` wins over the `-v` count.
pub fn init_logger(verbosity: u8) -> Result<()> {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .try_init()
        .map_err(|e| anyhow!("Could not initialize logger: {}", e))
}

/// Append-only activity log, one line per pipeline event.
pub struct ActivityLog {
    file: File,
}

impl ActivityLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        Ok(ActivityLog {
            file: options.open(path)?,
        })
    }

    /// Writes `line` behind the `MailSender: YYYY/MM/DD HH:MM:SS ` prefix.
    pub fn print(&mut self, line: &str) -> io::Result<()> {
        let stamp = Local::now().format("%Y/%m/%d %H:%M:%S");
        let newline = if line.ends_with('\n') { "" } else { "\n" };
        write!(self.file, "{ACTIVITY_PREFIX}{stamp} {line}{newline}")?;
        self.file.flush()
    }
}

impl Config {
    /// `{RFC 3339 time} {server} - {app} - {parts...}` plus a newline.
    pub fn log_line(&self, parts: &[&str]) -> String {
        format!(
            "{} {} - {} - {}\n",
            Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            self.server_name,
            self.app_name,
            parts.join(" ")
        )
    }
}
