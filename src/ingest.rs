//! Inbound ingestion: turns one fetched message into an email record,
//! resolving or creating the sender contact along the way.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{codes, Contact, Email, NewEmail, Priority, Status};
use crate::store::Store;

static ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.\-]+@[\w.\-]+").expect("address pattern"));
static DISPLAY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"?([^"<]+)"?\s*<"#).expect("display name pattern"));

/// One fetched message, as handed over by a mail source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub subject: Option<String>,
    pub from: String,
    pub to: String,
    pub body: String,
    pub message_id: Option<String>,
    pub date: DateTime<Utc>,
}

/// Caller-supplied values that win over every computed default. The doubled
/// `Option` fields distinguish "not overridden" (outer `None`) from
/// "overridden to empty" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct IngestOverrides {
    pub subject: Option<String>,
    pub sender_id: Option<Option<i64>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub folder_id: Option<i64>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub label_ids: Option<Vec<i64>>,
    pub is_inbound: Option<bool>,
    pub message_id: Option<Option<String>>,
}

/// Extracts the first address-shaped substring from a raw "from" header and
/// resolves it to a contact, creating one when no case-insensitive match
/// exists. A header with no embedded address yields no contact.
pub fn find_or_create_contact(store: &Store, raw: &str) -> Result<Option<Contact>> {
    let Some(found) = ADDRESS.find(raw) else {
        return Ok(None);
    };
    let address = found.as_str().to_lowercase();

    if let Some(existing) = store.find_contact_by_email(&address)? {
        return Ok(Some(existing));
    }

    let name = DISPLAY_NAME
        .captures(raw)
        .map(|c| c[1].trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| address.clone());

    Ok(Some(store.create_contact(&name, &address)?))
}

/// Creates the email record for one inbound message. Duplicate message ids
/// are not deduplicated here; callers refetching a source get a second record.
pub fn ingest(store: &Store, msg: &InboundMessage, overrides: IngestOverrides) -> Result<Email> {
    let sender_id = match overrides.sender_id {
        Some(id) => id,
        None => find_or_create_contact(store, &msg.from)?.map(|c| c.id),
    };
    let inbox = store.folder_by_code(codes::INBOX)?;

    let subject = overrides.subject.unwrap_or_else(|| match &msg.subject {
        Some(s) if !s.trim().is_empty() => s.clone(),
        _ => "no subject".to_string(),
    });

    let new = NewEmail {
        subject,
        sender_id,
        sender_email: Some(msg.from.clone()),
        recipient_email: Some(msg.to.clone()),
        body_html: msg.body.clone(),
        sent_at: Some(overrides.sent_at.unwrap_or(msg.date)),
        received_at: Some(overrides.received_at.unwrap_or(msg.date)),
        status: overrides.status.unwrap_or(Status::Sent),
        priority: overrides.priority.unwrap_or_default(),
        folder_id: overrides.folder_id.or(inbox.map(|f| f.id)),
        label_ids: overrides.label_ids.unwrap_or_default(),
        is_inbound: overrides.is_inbound.unwrap_or(true),
        message_id: overrides
            .message_id
            .unwrap_or_else(|| msg.message_id.clone()),
        ..Default::default()
    };

    let email = store.create_email(&new)?;
    tracing::info!(email_id = email.id, "ingested inbound message");
    Ok(email)
}

/// RFC 2822 date header to a UTC timestamp, for sources handing over raw
/// headers.
pub fn parse_message_date(raw: &str) -> Option<DateTime<Utc>> {
    let epoch = mailparse::dateparse(raw).ok()?;
    Utc.timestamp_opt(epoch, 0).single()
}

/// One configured inbound mail source. The actual IMAP/POP plumbing lives
/// behind this trait.
pub trait MailSource {
    fn name(&self) -> &str;
    fn fetch(&mut self) -> Result<Vec<InboundMessage>>;
}

/// Scheduled fetch entry point. Sources are polled sequentially; a failing
/// source is logged and skipped so the remaining sources still run.
pub fn fetch_incoming(store: &Store, sources: &mut [Box<dyn MailSource>]) -> Result<Vec<Email>> {
    let mut ingested = Vec::new();
    for source in sources.iter_mut() {
        let messages = match source.fetch() {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(source = source.name(), error = %e, "fetch failed, skipping source");
                continue;
            }
        };
        for msg in &messages {
            ingested.push(ingest(store, msg, IngestOverrides::default())?);
        }
    }
    Ok(ingested)
}
