use anyhow::Result;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{info, warn};
use wpr::config::EmailConfig;

/// Send a plain-text operator alert through the configured relay. Failures
/// are logged and swallowed; alerting must never take a stage down.
pub fn send(config: &EmailConfig, subject: &str, body: &str) {
    match try_send(config, subject, body) {
        Ok(()) => info!("alert mail sent to {}", config.receive_address),
        Err(err) => warn!("failed to send alert mail: {err}"),
    }
}

fn try_send(config: &EmailConfig, subject: &str, body: &str) -> Result<()> {
    let message = Message::builder()
        .from(config.account.parse::<Mailbox>()?)
        .to(config.receive_address.parse::<Mailbox>()?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())?;

    let mailer = SmtpTransport::builder_dangerous(config.send_host.as_str())
        .port(25)
        .credentials(Credentials::new(
            config.account.clone(),
            config.password.clone(),
        ))
        .build();
    mailer.send(&message)?;
    Ok(())
}
