use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use lettre::{
    message::{
        header::{ContentTransferEncoding, ContentType, MIME_VERSION_1_0},
        Mailbox,
    },
    Message,
};
use rand::Rng;
use std::time::SystemTime;

use crate::config::Config;
use crate::utils::header_value;

const MESSAGE_ID_MAX: u32 = 999_999_999;

impl Config {
    /// Builds the plain-text notification with a base64 body and a fresh Message-Id.
    pub fn prepare(&self) -> Result<Message> {
        let nonce = rand::rng().random_range(0..MESSAGE_ID_MAX);
        self.prepare_at(Utc::now(), nonce)
    }

    fn prepare_at(&self, now: DateTime<Utc>, nonce: u32) -> Result<Message> {
        let from: Mailbox = self
            .smtp_email
            .parse()
            .context("Invalid SMTP email address")?;
        let to: Mailbox = self
            .email_address
            .parse()
            .context("Invalid recipient email")?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(header_value(&self.subject))
            .date(SystemTime::from(now))
            .message_id(Some(self.message_id(now, nonce)))
            .header(MIME_VERSION_1_0)
            .header(ContentType::TEXT_PLAIN)
            .header(ContentTransferEncoding::Base64)
            .body(self.body.clone())
            .context("Failed to build email message")
    }

    fn message_id(&self, now: DateTime<Utc>, nonce: u32) -> String {
        format!(
            "<{}__{}==@{}>",
            nonce,
            now.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            header_value(&self.smtp_host)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Config {
        Config {
            smtp_host: "smtp.example.com".into(),
            smtp_email: "me@example.com".into(),
            email_address: "you@example.com".into(),
            server_name: "LinuxBox".into(),
            app_name: "App".into(),
            subject: "subject line".into(),
            body: "body text".into(),
            ..Default::default()
        }
    }

    fn raw(msg: &Message) -> String {
        String::from_utf8(msg.formatted()).unwrap()
    }

    #[test]
    fn test_prepare_headers() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let msg = raw(&sample().prepare_at(now, 42).unwrap());

        for line in [
            "From: me@example.com\r\n",
            "To: you@example.com\r\n",
            "Subject: subject line\r\n",
            "Date: Sat, 09 Mar 2024 14:05:07 +0000\r\n",
            "Message-ID: <42__2024-03-09T14:05:07Z==@smtp.example.com>\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "Content-Transfer-Encoding: base64\r\n",
        ] {
            assert_eq!(msg.matches(line).count(), 1, "{line:?} in {msg}");
        }
        assert!(msg.contains("\r\n\r\nYm9keSB0ZXh0"), "{msg}");
    }

    #[test]
    fn test_prepare_envelope() {
        let cfg = Config {
            smtp_email: "Backup Bot <me@example.com>".into(),
            ..sample()
        };
        let msg = cfg.prepare().unwrap();
        let envelope = msg.envelope();
        assert_eq!(envelope.from().map(|a| a.to_string()), Some("me@example.com".to_string()));
        assert_eq!(
            envelope.to().iter().map(|a| a.to_string()).collect::<Vec<_>>(),
            vec!["you@example.com".to_string()]
        );
    }

    #[test]
    fn test_prepare_rejects_bad_addresses() {
        let bad_to = Config {
            email_address: "bad email".into(),
            ..sample()
        };
        assert!(bad_to.prepare().is_err());

        let bad_from = Config {
            smtp_email: String::new(),
            ..sample()
        };
        assert!(bad_from.prepare().is_err());
    }

    #[test]
    fn test_message_ids_differ() {
        let cfg = sample();
        let now = Utc::now();
        assert_ne!(cfg.message_id(now, 1), cfg.message_id(now, 2));
        assert!(cfg.message_id(now, 7).ends_with("==@smtp.example.com>"));
    }

    #[test]
    fn test_prepare_strips_header_injection() {
        let cfg = Config {
            subject: "hello\r\nBcc: evil@example.com".into(),
            ..sample()
        };
        let msg = raw(&cfg.prepare().unwrap());
        assert!(!msg.contains("\r\nBcc:"));
    }

    #[test]
    fn test_prepare_encodes_non_ascii_headers() {
        let cfg = Config {
            subject: "é".repeat(60),
            smtp_email: "José Núñez <me@example.com>".into(),
            ..sample()
        };
        let msg = raw(&cfg.prepare().unwrap());

        assert!(msg.is_ascii());
        assert!(msg.split("\r\n").all(|l| l.len() <= 76), "{msg}");
        assert!(msg.contains("<me@example.com>"));
    }

    #[test]
    fn test_prepare_wraps_long_body() {
        let cfg = Config {
            body: "x".repeat(300),
            ..sample()
        };
        let msg = raw(&cfg.prepare().unwrap());
        let (_, body) = msg.split_once("\r\n\r\n").unwrap();
        assert!(body.lines().count() > 1);
        assert!(body.split("\r\n").all(|l| l.len() <= 76));
    }
}
