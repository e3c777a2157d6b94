use anyhow::{Context, Result};
use lettre::{
    address::Envelope,
    transport::smtp::authentication::Credentials,
    transport::smtp::client::{Tls, TlsParameters},
    transport::smtp::SUBMISSIONS_PORT,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use log::debug;
use std::time::Duration;

use crate::config::Config;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Hands a fully built message to whatever delivers it.
pub trait Mailer {
    async fn send_raw(&self, envelope: &Envelope, raw: &[u8]) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Port 465 gets implicit TLS. Otherwise `secure` decides between required
    /// and opportunistic STARTTLS.
    pub fn new(cfg: &Config) -> Result<Self> {
        let port = cfg.port();
        let tls_params = TlsParameters::new(cfg.smtp_host.clone())
            .with_context(|| format!("Invalid TLS parameters for {}", cfg.smtp_host))?;

        let tls = if port == SUBMISSIONS_PORT {
            Tls::Wrapper(tls_params)
        } else if cfg.secure() {
            Tls::Required(tls_params)
        } else {
            Tls::Opportunistic(tls_params)
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(cfg.smtp_host.as_str())
            .port(port)
            .tls(tls)
            .timeout(Some(SMTP_TIMEOUT));

        if !cfg.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                cfg.smtp_username.clone(),
                cfg.smtp_password.clone(),
            ));
        }

        debug!("SMTP transport for {}:{} (secure: {})", cfg.smtp_host, port, cfg.secure());
        Ok(SmtpMailer {
            transport: builder.build(),
        })
    }
}

impl Mailer for SmtpMailer {
    async fn send_raw(&self, envelope: &Envelope, raw: &[u8]) -> Result<()> {
        self.transport.send_raw(envelope, raw).await?;
        Ok(())
    }
}

pub struct EmailSender<'a, M: Mailer> {
    cfg: &'a Config,
    mailer: M,
}

impl<'a, M: Mailer> EmailSender<'a, M> {
    pub fn new(cfg: &'a Config, mailer: M) -> Self {
        EmailSender { cfg, mailer }
    }

    /// Sends `msg` to the envelope recipients taken from its `From`/`To` headers.
    pub async fn send_it(&self, msg: &Message) -> Result<()> {
        let raw = msg.formatted();
        debug!(
            "Sending {} bytes via {}:{}",
            raw.len(),
            self.cfg.smtp_host,
            self.cfg.port()
        );
        self.mailer.send_raw(msg.envelope(), &raw).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Records every delivery instead of talking to a server.
    #[derive(Default)]
    pub(crate) struct FakeMailer {
        pub(crate) sent: Mutex<Vec<(Envelope, Vec<u8>)>>,
        pub(crate) fail: bool,
    }

    impl Mailer for FakeMailer {
        async fn send_raw(&self, envelope: &Envelope, raw: &[u8]) -> Result<()> {
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            self.sent.lock().unwrap().push((envelope.clone(), raw.to_vec()));
            Ok(())
        }
    }

    fn sample() -> Config {
        Config {
            smtp_host: "localhost".into(),
            smtp_port: Some(25),
            smtp_email: "Backup Bot <me@example.com>".into(),
            smtp_username: "me".into(),
            smtp_password: "pass".into(),
            email_address: "you@example.com".into(),
            server_name: "LinuxBox".into(),
            app_name: "App".into(),
            subject: "subject line".into(),
            body: "body text".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_it_builds_envelope() {
        let cfg = sample();
        let sender = EmailSender::new(&cfg, FakeMailer::default());
        let msg = cfg.prepare().unwrap();

        sender.send_it(&msg).await.unwrap();

        let sent = sender.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (envelope, raw) = &sent[0];
        assert_eq!(envelope.from().map(|a| a.to_string()), Some("me@example.com".to_string()));
        assert_eq!(
            envelope.to().iter().map(|a| a.to_string()).collect::<Vec<_>>(),
            vec!["you@example.com".to_string()]
        );
        assert_eq!(raw, &msg.formatted());
    }

    #[tokio::test]
    async fn test_send_it_propagates_mailer_error() {
        let cfg = sample();
        let mailer = FakeMailer {
            fail: true,
            ..Default::default()
        };
        let msg = cfg.prepare().unwrap();
        let err = EmailSender::new(&cfg, mailer).send_it(&msg).await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn test_smtp_mailer_builds() {
        assert!(SmtpMailer::new(&sample()).is_ok());

        let implicit_tls = Config {
            smtp_port: Some(465),
            secure: Some(false),
            ..sample()
        };
        assert!(SmtpMailer::new(&implicit_tls).is_ok());
    }
}
