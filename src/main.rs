mod app;
mod config;
mod email;
mod logger;
mod message;
mod utils;

use anyhow::Result;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::{Config, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "mailsender")]
#[command(about = "Send a notification email over SMTP")]
struct Cli {
    /// JSON config file; flags take priority over its values
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    configs: PathBuf,

    /// Server name reported in the subject, body and log
    #[arg(long = "server", default_value = "")]
    server_name: String,

    /// Application name reported in the subject, body and log
    #[arg(long = "app", default_value = "")]
    app_name: String,

    /// Require STARTTLS (default true)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    secure: Option<bool>,

    /// SMTP host
    #[arg(long = "host", default_value = "")]
    smtp_host: String,

    /// SMTP port (default 25)
    #[arg(long = "port")]
    smtp_port: Option<u16>,

    /// Sender email address
    #[arg(long = "from", default_value = "")]
    smtp_email: String,

    /// SMTP username
    #[arg(long = "user", default_value = "")]
    smtp_username: String,

    /// SMTP password
    #[arg(long = "pass", default_value = "")]
    smtp_password: String,

    /// Destination email address
    #[arg(long = "to", default_value = "")]
    email_address: String,

    /// Email subject
    #[arg(long, default_value = "")]
    subject: String,

    /// Email body template; the first %s is replaced with --message
    #[arg(long, default_value = "")]
    body: String,

    /// Message passed to the body template
    #[arg(long, default_value = "")]
    message: String,

    /// Append to the activity log file (default true)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    log: Option<bool>,

    /// Activity log path (default ./mailsender.log)
    #[arg(long = "logfile")]
    log_file: Option<PathBuf>,

    /// More console output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            configs: cli.configs,
            server_name: cli.server_name,
            app_name: cli.app_name,
            secure: cli.secure,
            smtp_host: cli.smtp_host,
            smtp_port: cli.smtp_port,
            smtp_email: cli.smtp_email,
            smtp_username: cli.smtp_username,
            smtp_password: cli.smtp_password,
            email_address: cli.email_address,
            subject: cli.subject,
            body: cli.body,
            message: cli.message,
            log: cli.log,
            log_file: cli.log_file.unwrap_or_default(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose)?;
    app::run(Config::from(cli)).await
}
