use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

type MailResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Deliver a registration code. With SMTP disabled the code only goes to the log.
pub async fn send_verification_code(
    smtp_config: &SmtpConfig,
    to_email: &str,
    code: &str,
    expires_minutes: i64,
) -> MailResult {
    if !smtp_config.enabled {
        tracing::warn!("SMTP disabled, verification code for {}: {}", to_email, code);
        return Ok(());
    }

    let email = Message::builder()
        .from(format!("{} <{}>", smtp_config.from_name, smtp_config.from_email).parse()?)
        .to(to_email.parse()?)
        .subject("7chalo - Your verification code")
        .header(ContentType::TEXT_PLAIN)
        .body(format!(
            "Your 7chalo verification code is {}.\n\nIt expires in {} minutes. If you didn't sign up, you can ignore this email.\n",
            code, expires_minutes
        ))?;

    if smtp_config.use_sendmail {
        AsyncSendmailTransport::<Tokio1Executor>::new()
            .send(email)
            .await?;
    } else {
        let creds = Credentials::new(
            smtp_config.username.clone(),
            smtp_config.password.clone(),
        );
        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_config.host)?
                .credentials(creds)
                .port(smtp_config.port)
                .build();
        mailer.send(email).await?;
    }

    tracing::info!("Verification code sent to {}", to_email);
    Ok(())
}
