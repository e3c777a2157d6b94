use std::{
    fs, io,
    path::{Path, PathBuf},
};

use lettre::message::Mailbox;
use serde::Deserialize;
use thiserror::Error;

use crate::utils::fill_template;

pub const DEFAULT_CONFIG_FILE: &str = "./mailsender.json";
pub const DEFAULT_LOG_FILE: &str = "./mailsender.log";
pub const DEFAULT_SMTP_PORT: u16 = 25;

pub const MAX_CONFIG_FILE_SIZE: u64 = 2000;
pub const MAX_NAME_LEN: usize = 254;
pub const MAX_TEXT_LEN: usize = 499;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File {} not found", .0.display())]
    FileNotFound(PathBuf),
    #[error("File {} is too large", .0.display())]
    FileTooLarge(PathBuf),
    #[error("{} is a directory", .0.display())]
    FileIsDir(PathBuf),
    #[error("Failed to read {}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Error parsing JSON config at `{path}`")]
    FileParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Subject is too large")]
    SubjectTooLarge,
    #[error("Body is too large")]
    BodyTooLarge,
    #[error("Message is too large")]
    MessageTooLarge,
    #[error("Server name is too large")]
    ServerNameTooLarge,
    #[error("App name is too large")]
    AppNameTooLarge,
    #[error("Invalid SMTP email address")]
    InvalidSmtpEmail,
    #[error("Invalid email address")]
    InvalidEmailAddress,
}

/// The merged run configuration. Flag values are copied in first, then the
/// JSON file fills whatever is still empty.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub configs: PathBuf,
    pub server_name: String,
    pub app_name: String,
    pub secure: Option<bool>,
    pub smtp_host: String,
    pub smtp_port: Option<u16>,
    pub smtp_email: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_address: String,
    pub subject: String,
    pub body: String,
    pub message: String,
    pub log: Option<bool>,
    pub log_file: PathBuf,
}

/// On-disk shape of `mailsender.json`. Unknown keys are ignored and `null`
/// reads the same as a missing key.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server_name: Option<String>,
    pub app_name: Option<String>,
    pub secure: Option<bool>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_email: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub email_address: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub message: Option<String>,
    pub log: Option<bool>,
    pub log_file: Option<PathBuf>,
}

fn fill(field: &mut String, value: Option<String>) {
    if field.is_empty() {
        *field = value.unwrap_or_default();
    }
}

fn fill_path(field: &mut PathBuf, value: Option<PathBuf>) {
    if field.as_os_str().is_empty() {
        if let Some(value) = value {
            *field = value;
        }
    }
}

/// Stats the config file and rejects anything that is missing, a directory,
/// or over `MAX_CONFIG_FILE_SIZE`.
fn check_config_file(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(ConfigError::FileRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if meta.is_dir() {
        return Err(ConfigError::FileIsDir(path.to_path_buf()));
    }
    if meta.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::FileTooLarge(path.to_path_buf()));
    }

    Ok(())
}

impl Config {
    pub fn port(&self) -> u16 {
        match self.smtp_port {
            Some(port) if port != 0 => port,
            _ => DEFAULT_SMTP_PORT,
        }
    }

    pub fn secure(&self) -> bool {
        self.secure.unwrap_or(true)
    }

    pub fn log_enabled(&self) -> bool {
        self.log.unwrap_or(true)
    }

    /// Reads the JSON config file at `path` and merges it under the current values.
    pub fn load(&mut self, path: &Path) -> Result<(), ConfigError> {
        check_config_file(path)?;
        let data = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.from_json(&data)
    }

    pub fn from_json(&mut self, data: &str) -> Result<(), ConfigError> {
        let mut de = serde_json::Deserializer::from_str(data);
        let file: FileConfig =
            serde_path_to_error::deserialize(&mut de).map_err(|e| ConfigError::FileParse {
                path: e.path().to_string(),
                source: e.into_inner(),
            })?;
        de.end().map_err(|source| ConfigError::FileParse {
            path: ".".to_string(),
            source,
        })?;

        self.merge(file);
        Ok(())
    }

    /// Fills empty fields from `file`, then synthesizes subject, body and log
    /// file defaults from whatever ended up set.
    pub fn merge(&mut self, file: FileConfig) {
        fill(&mut self.server_name, file.server_name);
        fill(&mut self.app_name, file.app_name);
        fill(&mut self.smtp_host, file.smtp_host);
        fill(&mut self.smtp_email, file.smtp_email);
        fill(&mut self.smtp_username, file.smtp_username);
        fill(&mut self.smtp_password, file.smtp_password);
        fill(&mut self.email_address, file.email_address);
        fill(&mut self.message, file.message);
        fill(&mut self.subject, file.subject);
        fill(&mut self.body, file.body);
        fill_path(&mut self.log_file, file.log_file);

        if matches!(self.smtp_port, None | Some(0)) {
            self.smtp_port = file.smtp_port;
        }
        if self.secure.is_none() {
            self.secure = file.secure;
        }
        if self.log.is_none() {
            self.log = file.log;
        }

        if self.subject.is_empty() {
            self.subject = format!("Notification from {} - {}", self.server_name, self.app_name);
        }

        self.body = match (self.body.is_empty(), self.message.is_empty()) {
            (true, true) => format!("Server: {}\nApplication: {}", self.server_name, self.app_name),
            (true, false) => format!(
                "Server: {}\nApplication: {}\n\nMessage: {}",
                self.server_name, self.app_name, self.message
            ),
            (false, false) => fill_template(&self.body, &self.message),
            (false, true) => std::mem::take(&mut self.body),
        };

        if self.log_file.as_os_str().is_empty() {
            self.log_file = PathBuf::from(DEFAULT_LOG_FILE);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_config_file(&self.configs)?;

        if self.smtp_email.parse::<Mailbox>().is_err() {
            return Err(ConfigError::InvalidSmtpEmail);
        }
        if self.email_address.parse::<Mailbox>().is_err() {
            return Err(ConfigError::InvalidEmailAddress);
        }

        if self.server_name.len() > MAX_NAME_LEN {
            return Err(ConfigError::ServerNameTooLarge);
        }
        if self.app_name.len() > MAX_NAME_LEN {
            return Err(ConfigError::AppNameTooLarge);
        }
        if self.subject.len() > MAX_NAME_LEN {
            return Err(ConfigError::SubjectTooLarge);
        }
        if self.body.len() > MAX_TEXT_LEN {
            return Err(ConfigError::BodyTooLarge);
        }
        if self.message.len() > MAX_TEXT_LEN {
            return Err(ConfigError::MessageTooLarge);
        }

        Ok(())
    }
}
