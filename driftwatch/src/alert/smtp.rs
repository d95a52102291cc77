//! SMTPによるアラート送信

use async_trait::async_trait;
use driftwatch_common::config::SmtpConfig;
use driftwatch_common::error::{CommonError, WatchError, WatchResult};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::info;

use super::AlertTransport;

/// SMTPトランスポート
///
/// 資格情報があり宛先がテスト用リレーでない場合は STARTTLS + 認証、
/// それ以外は平文・認証なしで送信する。
pub struct SmtpAlertTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpAlertTransport {
    /// 設定からトランスポートを作成
    pub fn new(config: &SmtpConfig) -> WatchResult<Self> {
        let timeout = Some(Duration::from_secs(config.timeout_secs));

        let transport = match (&config.username, &config.password) {
            (Some(user), Some(pass)) if config.use_authenticated_tls() => {
                info!(host = %config.host, port = config.port, "Using authenticated SMTP with TLS");
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| WatchError::Alert(format!("Invalid SMTP relay: {e}")))?
                    .port(config.port)
                    .credentials(Credentials::new(user.clone(), pass.clone()))
                    .timeout(timeout)
                    .build()
            }
            _ => {
                info!(host = %config.host, port = config.port, "Using plain SMTP relay");
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                    .port(config.port)
                    .timeout(timeout)
                    .build()
            }
        };

        Ok(Self {
            transport,
            from: parse_mailbox(&config.from)?,
            to: parse_mailbox(&config.to)?,
        })
    }
}

fn parse_mailbox(address: &str) -> WatchResult<Mailbox> {
    address.parse::<Mailbox>().map_err(|e| {
        WatchError::Common(CommonError::Config(format!(
            "invalid mail address '{address}': {e}"
        )))
    })
}

#[async_trait]
impl AlertTransport for SmtpAlertTransport {
    async fn deliver(&self, subject: &str, body: &str) -> WatchResult<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| WatchError::Alert(format!("Failed to build message: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| WatchError::Alert(e.to_string()))?;
        Ok(())
    }
}
