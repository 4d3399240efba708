use askama::Template;
use async_trait::async_trait;
use tracing::info;
use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), AppError>;
}

/// Writes outgoing mail to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError> {
        info!(to = %message.to, subject = %message.subject, "mail queued:\n{}", message.body);
        Ok(())
    }
}

/// Writes outgoing text messages to the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogSms;

#[async_trait]
impl SmsSender for LogSms {
    async fn send(&self, to: &str, body: &str) -> Result<(), AppError> {
        info!(%to, "sms queued: {body}");
        Ok(())
    }
}

#[derive(Template)]
#[template(path = "mail/password_reset.txt")]
struct PasswordResetMail<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "sms/otp.txt")]
struct OtpSms<'a> {
    code: &'a str,
    minutes: u64,
}

pub fn password_reset_link(
    client_url: &str,
    user_id: &str,
    email: &str,
) -> Result<String, AppError> {
    let base = format!("{}/change-password", client_url.trim_end_matches('/'));
    let url = Url::parse_with_params(&base, &[("id", user_id), ("email", email)])
        .map_err(|err| AppError::Config(format!("invalid CLIENT_URL: {err}")))?;
    Ok(url.to_string())
}

pub fn password_reset_mail(
    from: &str,
    to: &str,
    name: &str,
    link: &str,
) -> Result<MailMessage, AppError> {
    let body = PasswordResetMail { name, link }
        .render()
        .map_err(|err| AppError::Other(err.into()))?;
    Ok(MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Password Change link".to_string(),
        body,
    })
}

pub fn otp_text(code: &str, minutes: u64) -> Result<String, AppError> {
    OtpSms { code, minutes }
        .render()
        .map_err(|err| AppError::Other(err.into()))
}
