use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::Config;

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Returns None if SMTP is not fully configured.
    pub fn new(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let username = config.smtp_username.clone()?;
        let password = config.smtp_password.clone()?;
        let from_addr = config.smtp_from.as_deref()?;

        let port = config.smtp_port.unwrap_or(587);
        let creds = Credentials::new(username, password);

        let transport = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .ok()?
                .port(port)
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .port(port)
                .credentials(creds)
                .build()
        };

        let from: Mailbox = from_addr.parse().ok()?;

        Some(Self { transport, from })
    }

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    async fn send_email(&self, to: Mailbox, subject: &str, text: &str, html: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }

    pub async fn send_password_reset(&self, to_email: &str, to_name: &str, reset_url: &str) -> anyhow::Result<()> {
        let to: Mailbox = match format!("{to_name} <{to_email}>").parse() {
            Ok(mb) => mb,
            Err(_) => to_email.parse().context("Invalid recipient address")?,
        };

        let subject = "Password reset: adoption case management";

        let text = format!(
            "Hello {to_name},\n\n\
            A password reset was requested for your account.\n\n\
            Use this link to choose a new password (valid for 1 hour):\n\
            {reset_url}\n\n\
            If you did not request this, you can ignore this email."
        );

        let html = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<body style="margin:0;padding:24px;background-color:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif">
  <div style="max-width:520px;margin:0 auto;background:#ffffff;border-radius:12px;padding:40px">
    <h1 style="margin:0 0 8px 0;font-size:22px;color:#0f172a">Password reset</h1>
    <p style="margin:0 0 28px 0;font-size:15px;color:#64748b;line-height:1.6">Hello <strong>{to_name}</strong>,<br><br>A password reset was requested for your account.</p>
    <a href="{reset_url}" style="display:inline-block;padding:13px 28px;background:#2563eb;color:#ffffff;text-decoration:none;font-weight:600;border-radius:8px">Choose a new password</a>
    <p style="margin:28px 0 0 0;font-size:13px;color:#94a3b8">This link expires in 1 hour. If you did not request this, ignore this email.</p>
  </div>
</body>
</html>"#
        );

        self.send_email(to, subject, &text, &html).await
    }
}
