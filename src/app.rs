use anyhow::{Context, Result};
use log::{debug, error, info};

use crate::config::Config;
use crate::email::{EmailSender, Mailer, SmtpMailer};
use crate::logger::ActivityLog;

const HELP_HINT: &str = "Please check mailsender --help, there was an error";

pub async fn run(mut cfg: Config) -> Result<()> {
    // 1) Merge the JSON file under the flags
    let config_path = cfg.configs.clone();
    cfg.load(&config_path)
        .with_context(|| format!("{HELP_HINT} loading JSON data"))?;
    debug!("Config loaded from {}", config_path.display());

    // 2) Validate
    cfg.validate().context(HELP_HINT)?;
    debug!("Config validated");

    // 3) Activity log
    let mut activity = if cfg.log_enabled() {
        let mut log = ActivityLog::open(&cfg.log_file)
            .with_context(|| format!("{HELP_HINT} creating log file {}", cfg.log_file.display()))?;
        log.print(&cfg.log_line(&["started"]))
            .with_context(|| format!("{HELP_HINT} writing log file {}", cfg.log_file.display()))?;
        Some(log)
    } else {
        debug!("Activity log disabled");
        None
    };

    // 4) Build and send
    let result = match SmtpMailer::new(&cfg) {
        Ok(mailer) => deliver(&cfg, mailer).await,
        Err(e) => Err(e),
    };

    // 5) Record the outcome
    record_outcome(&cfg, activity.as_mut(), result)
}

async fn deliver<M: Mailer>(cfg: &Config, mailer: M) -> Result<()> {
    let msg = cfg.prepare()?;
    info!("Sending notification to {}", cfg.email_address);
    EmailSender::new(cfg, mailer).send_it(&msg).await
}

fn record_outcome(cfg: &Config, activity: Option<&mut ActivityLog>, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => {
            info!("Email sent.");
            if let Some(log) = activity {
                log.print(&cfg.log_line(&["Send OK"]))?;
            }
            Ok(())
        }
        Err(e) => {
            error!("Email failed: {e:#}");
            if let Some(log) = activity {
                if let Err(le) = log.print(&cfg.log_line(&["Error sending email", &format!("{e:#}")])) {
                    error!("Could not write {}: {le}", cfg.log_file.display());
                }
            }
            Err(e.context("Mail send error"))
        }
    }
}
