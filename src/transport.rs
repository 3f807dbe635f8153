//! Outbound delivery boundary. The workflow builds an [`OutboundMessage`] and
//! hands it to a [`MailTransport`]; the SMTP details live here only.

use chrono::Utc;
use lettre::{
    message::{header::ContentType, Attachment as MailAttachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

use crate::config::SmtpConfig;
use crate::error::{Error, Result};
use crate::model::Attachment;
use crate::sanitize::strip_html;

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub subject: String,
    pub body_html: String,
    pub from: String,
    pub to: Vec<String>,
    pub attachments: Vec<Attachment>,
}

pub trait MailTransport {
    /// Delivers one message. On success returns the transport's reference for
    /// the message (its Message-ID), if it has one.
    fn deliver(&self, message: &OutboundMessage) -> Result<Option<String>>;
}

pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        SmtpMailer { config }
    }
}

impl MailTransport for SmtpMailer {
    fn deliver(&self, message: &OutboundMessage) -> Result<Option<String>> {
        let (message, message_id) = build_message(message)?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());
        let mailer = SmtpTransport::starttls_relay(&self.config.host)
            .map_err(|e| Error::Transport(e.to_string()))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        mailer
            .send(&message)
            .map_err(|e| Error::Transport(e.to_string()))?;
        tracing::info!(%message_id, "email delivered over smtp");
        Ok(Some(message_id))
    }
}

/// RFC 822 construction: multipart/alternative with a stripped-text part next
/// to the HTML body, attachments wrapped in multipart/mixed. Returns the
/// message together with the Message-ID assigned to it.
pub(crate) fn build_message(out: &OutboundMessage) -> Result<(Message, String)> {
    let from: Mailbox = out
        .from
        .parse()
        .map_err(|_| Error::Transport(format!("invalid from address: {}", out.from)))?;

    let domain = out.from.rsplit('@').next().unwrap_or("localhost");
    let message_id = format!(
        "<{}.{}@{}>",
        Utc::now().timestamp_micros(),
        std::process::id(),
        domain
    );

    let mut builder = Message::builder()
        .from(from)
        .subject(out.subject.clone())
        .message_id(Some(message_id.clone()));

    for to in &out.to {
        let mailbox: Mailbox = to
            .parse()
            .map_err(|_| Error::Transport(format!("invalid recipient address: {}", to)))?;
        builder = builder.to(mailbox);
    }

    let body_part = MultiPart::alternative()
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(strip_html(&out.body_html)),
        )
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(out.body_html.clone()),
        );

    let built = if out.attachments.is_empty() {
        builder
            .multipart(body_part)
            .map_err(|e| Error::Transport(e.to_string()))?
    } else {
        let mut mixed = MultiPart::mixed().multipart(body_part);
        for att in &out.attachments {
            let content = std::fs::read(&att.path)?;
            let content_type: ContentType = att
                .content_type
                .parse()
                .unwrap_or(ContentType::parse("application/octet-stream").unwrap());
            mixed = mixed.singlepart(MailAttachment::new(att.filename.clone()).body(content, content_type));
        }
        builder
            .multipart(mixed)
            .map_err(|e| Error::Transport(e.to_string()))?
    };

    Ok((built, message_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound(to: Vec<String>) -> OutboundMessage {
        OutboundMessage {
            subject: "Status update".into(),
            body_html: "<p>All&nbsp;good.</p>".into(),
            from: "alice@example.com".into(),
            to,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn builds_alternative_message_with_text_part() {
        let (message, message_id) =
            build_message(&outbound(vec!["bob@example.com".into()])).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Status update"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("All good."));
        assert!(raw.contains("<p>All&nbsp;good.</p>"));
        assert!(message_id.ends_with("@example.com>"));
        assert!(raw.contains(&message_id));
    }

    #[test]
    fn rejects_malformed_addresses() {
        let mut out = outbound(vec!["bob@example.com".into()]);
        out.from = "not an address".into();
        assert!(matches!(build_message(&out), Err(Error::Transport(_))));

        let out = outbound(vec!["also not one".into()]);
        assert!(matches!(build_message(&out), Err(Error::Transport(_))));
    }
}
