//! Email record lifecycle. Every action applies to each selected record
//! independently; folder moves go through the [`SystemFolders`] registry and
//! are skipped when the target folder is missing.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ai::AiClient;
use crate::error::{Error, Result};
use crate::model::{codes, Email, NewEmail, Status};
use crate::store::Store;
use crate::transport::{MailTransport, OutboundMessage};

/// Resolved ids of the well-known system folders. `None` marks a missing
/// folder; dependent moves become no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFolders {
    pub inbox: Option<i64>,
    pub sent: Option<i64>,
    pub draft: Option<i64>,
    pub archive: Option<i64>,
    pub spam: Option<i64>,
}

impl SystemFolders {
    pub fn load(store: &Store) -> Result<Self> {
        Ok(SystemFolders {
            inbox: store.folder_by_code(codes::INBOX)?.map(|f| f.id),
            sent: store.folder_by_code(codes::SENT)?.map(|f| f.id),
            draft: store.folder_by_code(codes::DRAFT)?.map(|f| f.id),
            archive: store.folder_by_code(codes::ARCHIVE)?.map(|f| f.id),
            spam: store.folder_by_code(codes::SPAM)?.map(|f| f.id),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

/// Short payload for UI display after an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub kind: Severity,
    pub sticky: bool,
}

/// Outcome of one record in a batch send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReport {
    pub email_id: i64,
    pub status: Status,
    pub error: Option<String>,
}

pub struct Workflow<'a> {
    store: &'a Store,
    transport: &'a dyn MailTransport,
    folders: SystemFolders,
    default_from: String,
}

impl<'a> Workflow<'a> {
    /// The caller resolves the well-known folders once (typically
    /// [`SystemFolders::load`]) and hands the registry in, together with the
    /// sender address used when a record has no sender contact (configured,
    /// not resolved from ambient user state).
    pub fn new(
        store: &'a Store,
        transport: &'a dyn MailTransport,
        folders: SystemFolders,
        default_from: impl Into<String>,
    ) -> Self {
        Workflow {
            store,
            transport,
            folders,
            default_from: default_from.into(),
        }
    }

    /// User-created email: status draft, folder draft unless the caller chose
    /// one.
    pub fn create_draft(&self, mut new: NewEmail) -> Result<Email> {
        new.status = Status::Draft;
        if new.folder_id.is_none() {
            new.folder_id = self.folders.draft;
        }
        self.store.create_email(&new)
    }

    /// Synchronous delivery of one record. Zero recipient contacts is a
    /// validation error and mutates nothing. A transport failure is recorded
    /// on the record (status failed, error text) and returned as the mutated
    /// record, not as an `Err`. Every call attempts a fresh delivery.
    pub fn send_one(&self, email_id: i64) -> Result<Email> {
        let email = self.store.get_email(email_id)?;
        if email.recipient_ids.is_empty() {
            return Err(Error::NoRecipients);
        }

        let from = match email.sender_id {
            Some(id) => self.store.contact_by_id(id)?.map(|c| c.email),
            None => None,
        }
        .unwrap_or_else(|| self.default_from.clone());

        let mut to = Vec::with_capacity(email.recipient_ids.len());
        for contact_id in &email.recipient_ids {
            if let Some(contact) = self.store.contact_by_id(*contact_id)? {
                to.push(contact.email);
            }
        }

        self.store.set_status(email_id, Status::ToSend)?;

        let outbound = OutboundMessage {
            subject: email.subject.clone(),
            body_html: email.body_html.clone(),
            from,
            to,
            attachments: email.attachments.clone(),
        };

        match self.transport.deliver(&outbound) {
            Ok(reference) => {
                self.store.set_status(email_id, Status::Sent)?;
                self.store.set_sent_at(email_id, Utc::now())?;
                self.store.set_error(email_id, None)?;
                self.store
                    .set_transport_message_id(email_id, reference.as_deref())?;
                if let Some(sent) = self.folders.sent {
                    self.store.set_folder(email_id, Some(sent))?;
                }
            }
            Err(e) => {
                tracing::warn!(email_id, error = %e, "delivery failed");
                self.store.set_status(email_id, Status::Failed)?;
                self.store.set_error(email_id, Some(&e.to_string()))?;
            }
        }

        self.store.get_email(email_id)
    }

    /// Batch send. Each record is attempted independently; one record's
    /// failure never prevents the others.
    pub fn send(&self, email_ids: &[i64]) -> Result<Vec<SendReport>> {
        let mut reports = Vec::with_capacity(email_ids.len());
        for &id in email_ids {
            match self.send_one(id) {
                Ok(email) => reports.push(SendReport {
                    email_id: id,
                    status: email.status,
                    error: email.error_message,
                }),
                Err(e) => {
                    let status = self
                        .store
                        .get_email(id)
                        .map(|email| email.status)
                        .unwrap_or_default();
                    reports.push(SendReport {
                        email_id: id,
                        status,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(reports)
    }

    pub fn archive(&self, email_ids: &[i64]) -> Result<()> {
        for &id in email_ids {
            self.store.set_status(id, Status::Archived)?;
            if let Some(archive) = self.folders.archive {
                self.store.set_folder(id, Some(archive))?;
            }
        }
        Ok(())
    }

    /// Only sent or draft records become read; anything else is left alone.
    pub fn mark_read(&self, email_ids: &[i64]) -> Result<()> {
        for &id in email_ids {
            let email = self.store.get_email(id)?;
            if matches!(email.status, Status::Sent | Status::Draft) {
                self.store.set_status(id, Status::Read)?;
            }
        }
        Ok(())
    }

    /// Only read records go back to sent.
    pub fn mark_unread(&self, email_ids: &[i64]) -> Result<()> {
        for &id in email_ids {
            let email = self.store.get_email(id)?;
            if email.status == Status::Read {
                self.store.set_status(id, Status::Sent)?;
            }
        }
        Ok(())
    }

    /// Moves to the spam folder; status is left untouched.
    pub fn spam(&self, email_ids: &[i64]) -> Result<()> {
        for &id in email_ids {
            if let Some(spam) = self.folders.spam {
                self.store.set_folder(id, Some(spam))?;
            }
        }
        Ok(())
    }

    /// Back to the inbox from archive or spam. Inbound records come back read,
    /// outbound ones sent.
    pub fn restore(&self, email_ids: &[i64]) -> Result<()> {
        for &id in email_ids {
            let email = self.store.get_email(id)?;
            let status = if email.is_inbound {
                Status::Read
            } else {
                Status::Sent
            };
            self.store.set_status(id, status)?;
            if let Some(inbox) = self.folders.inbox {
                self.store.set_folder(id, Some(inbox))?;
            }
        }
        Ok(())
    }

    /// Summarizes the record's body, stores the result on the record and
    /// returns a sticky notification carrying the summary.
    pub fn ai_summarize(&self, ai: &AiClient, email_id: i64) -> Result<Notification> {
        let email = self.store.get_email(email_id)?;
        let summary = ai.summarize(&email.subject, &email.body_html)?;
        self.store.set_ai_summary(email_id, &summary)?;
        Ok(Notification {
            title: "AI summary".into(),
            message: summary,
            kind: Severity::Success,
            sticky: true,
        })
    }

    /// Generates a reply suggestion, stores it as paragraph-wrapped HTML on
    /// the record.
    pub fn ai_suggest_reply(&self, ai: &AiClient, email_id: i64) -> Result<Notification> {
        let email = self.store.get_email(email_id)?;

        let sender_name = match email.sender_id {
            Some(id) => self.store.contact_by_id(id)?.map(|c| c.name),
            None => None,
        }
        .or_else(|| email.sender_email.clone())
        .unwrap_or_default();

        let reply = ai.suggest_reply(&email.subject, &email.body_html, &sender_name)?;
        let html = format!("<p>{}</p>", reply.replace('\n', "</p><p>"));
        self.store.set_ai_suggested_reply(email_id, &html)?;

        Ok(Notification {
            title: "Suggested reply".into(),
            message: "A reply was generated, check the suggested reply field.".into(),
            kind: Severity::Success,
            sticky: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{codes, NewEmail};
    use std::cell::RefCell;

    struct FakeTransport {
        fail_with: Option<String>,
        delivered: RefCell<Vec<OutboundMessage>>,
    }

    impl FakeTransport {
        fn working() -> Self {
            FakeTransport {
                fail_with: None,
                delivered: RefCell::new(Vec::new()),
            }
        }

        fn broken(reason: &str) -> Self {
            FakeTransport {
                fail_with: Some(reason.to_string()),
                delivered: RefCell::new(Vec::new()),
            }
        }
    }

    impl MailTransport for FakeTransport {
        fn deliver(&self, message: &OutboundMessage) -> Result<Option<String>> {
            if let Some(reason) = &self.fail_with {
                return Err(Error::Transport(reason.clone()));
            }
            self.delivered.borrow_mut().push(message.clone());
            Ok(Some("<fake-1@example.com>".to_string()))
        }
    }

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn draft_with_recipient(store: &Store) -> Email {
        let bob = store.create_contact("Bob", "bob@example.com").unwrap();
        store
            .create_email(&NewEmail {
                subject: "Hello".into(),
                recipient_ids: vec![bob.id],
                body_html: "<p>Hi Bob</p>".into(),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn create_draft_defaults_to_draft_folder() {
        let store = store();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );

        let email = workflow
            .create_draft(NewEmail {
                subject: "wip".into(),
                ..Default::default()
            })
            .unwrap();

        let draft = store.folder_by_code(codes::DRAFT).unwrap().unwrap();
        assert_eq!(email.status, Status::Draft);
        assert_eq!(email.folder_id, Some(draft.id));
    }

    #[test]
    fn send_without_recipients_is_a_validation_error() {
        let store = store();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );
        let email = store
            .create_email(&NewEmail {
                subject: "no one".into(),
                ..Default::default()
            })
            .unwrap();

        assert!(matches!(
            workflow.send_one(email.id),
            Err(Error::NoRecipients)
        ));
        // nothing mutated, nothing delivered
        assert_eq!(store.get_email(email.id).unwrap().status, Status::Draft);
        assert!(transport.delivered.borrow().is_empty());
    }

    #[test]
    fn successful_send_moves_to_sent() {
        let store = store();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );
        let email = draft_with_recipient(&store);

        let sent = workflow.send_one(email.id).unwrap();

        let sent_folder = store.folder_by_code(codes::SENT).unwrap().unwrap();
        assert_eq!(sent.status, Status::Sent);
        assert_eq!(sent.folder_id, Some(sent_folder.id));
        assert!(sent.sent_at.is_some());
        assert_eq!(sent.error_message, None);
        assert_eq!(
            sent.transport_message_id.as_deref(),
            Some("<fake-1@example.com>")
        );

        let delivered = transport.delivered.borrow();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].to, vec!["bob@example.com".to_string()]);
        // no sender contact on the record, configured default applies
        assert_eq!(delivered[0].from, "me@example.com");
    }

    #[test]
    fn sender_contact_wins_over_default_from() {
        let store = store();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );
        let alice = store.create_contact("Alice", "alice@example.com").unwrap();
        let bob = store.create_contact("Bob", "bob@example.com").unwrap();
        let email = store
            .create_email(&NewEmail {
                subject: "from alice".into(),
                sender_id: Some(alice.id),
                recipient_ids: vec![bob.id],
                ..Default::default()
            })
            .unwrap();

        workflow.send_one(email.id).unwrap();
        assert_eq!(transport.delivered.borrow()[0].from, "alice@example.com");
    }

    #[test]
    fn failed_send_records_the_reason() {
        let store = store();
        let transport = FakeTransport::broken("connection refused");
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );
        let email = draft_with_recipient(&store);

        let failed = workflow.send_one(email.id).unwrap();
        assert_eq!(failed.status, Status::Failed);
        assert!(failed
            .error_message
            .as_deref()
            .unwrap()
            .contains("connection refused"));
    }

    #[test]
    fn batch_send_continues_past_failures() {
        let store = store();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );

        let no_recipients = store
            .create_email(&NewEmail {
                subject: "empty".into(),
                ..Default::default()
            })
            .unwrap();
        let ok = draft_with_recipient(&store);

        let reports = workflow.send(&[no_recipients.id, ok.id]).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].error.is_some());
        assert_eq!(reports[0].status, Status::Draft);
        assert_eq!(reports[1].status, Status::Sent);
        assert_eq!(reports[1].error, None);
    }

    #[test]
    fn archive_applies_regardless_of_prior_status() {
        let store = store();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );
        let archive_folder = store.folder_by_code(codes::ARCHIVE).unwrap().unwrap();

        for status in [Status::Draft, Status::Sent, Status::Failed, Status::Read] {
            let email = store
                .create_email(&NewEmail {
                    subject: "x".into(),
                    status,
                    ..Default::default()
                })
                .unwrap();
            workflow.archive(&[email.id]).unwrap();
            let archived = store.get_email(email.id).unwrap();
            assert_eq!(archived.status, Status::Archived);
            assert_eq!(archived.folder_id, Some(archive_folder.id));
        }
    }

    #[test]
    fn mark_read_only_touches_sent_and_draft() {
        let store = store();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );

        for (status, expected) in [
            (Status::Sent, Status::Read),
            (Status::Draft, Status::Read),
            (Status::Archived, Status::Archived),
            (Status::Failed, Status::Failed),
        ] {
            let email = store
                .create_email(&NewEmail {
                    subject: "x".into(),
                    status,
                    ..Default::default()
                })
                .unwrap();
            workflow.mark_read(&[email.id]).unwrap();
            assert_eq!(store.get_email(email.id).unwrap().status, expected);
        }
    }

    #[test]
    fn read_unread_round_trip_restores_sent_only() {
        let store = store();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );

        // sent -> read -> sent: round trip restores the original
        let sent = store
            .create_email(&NewEmail {
                subject: "x".into(),
                status: Status::Sent,
                ..Default::default()
            })
            .unwrap();
        workflow.mark_read(&[sent.id]).unwrap();
        workflow.mark_unread(&[sent.id]).unwrap();
        assert_eq!(store.get_email(sent.id).unwrap().status, Status::Sent);

        // draft -> read -> sent: round trip does not restore a draft
        let draft = store
            .create_email(&NewEmail {
                subject: "y".into(),
                ..Default::default()
            })
            .unwrap();
        workflow.mark_read(&[draft.id]).unwrap();
        workflow.mark_unread(&[draft.id]).unwrap();
        assert_eq!(store.get_email(draft.id).unwrap().status, Status::Sent);
    }

    #[test]
    fn spam_moves_folder_but_keeps_status() {
        let store = store();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );
        let spam_folder = store.folder_by_code(codes::SPAM).unwrap().unwrap();

        let email = store
            .create_email(&NewEmail {
                subject: "x".into(),
                status: Status::Read,
                ..Default::default()
            })
            .unwrap();
        workflow.spam(&[email.id]).unwrap();

        let spammed = store.get_email(email.id).unwrap();
        assert_eq!(spammed.folder_id, Some(spam_folder.id));
        assert_eq!(spammed.status, Status::Read);
    }

    #[test]
    fn restore_distinguishes_inbound_from_outbound() {
        let store = store();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );
        let inbox = store.folder_by_code(codes::INBOX).unwrap().unwrap();

        let inbound = store
            .create_email(&NewEmail {
                subject: "in".into(),
                status: Status::Archived,
                is_inbound: true,
                ..Default::default()
            })
            .unwrap();
        let outbound = store
            .create_email(&NewEmail {
                subject: "out".into(),
                status: Status::Archived,
                ..Default::default()
            })
            .unwrap();

        workflow.restore(&[inbound.id, outbound.id]).unwrap();

        let inbound = store.get_email(inbound.id).unwrap();
        let outbound = store.get_email(outbound.id).unwrap();
        assert_eq!(inbound.status, Status::Read);
        assert_eq!(outbound.status, Status::Sent);
        assert_eq!(inbound.folder_id, Some(inbox.id));
        assert_eq!(outbound.folder_id, Some(inbox.id));
    }

    #[test]
    fn missing_well_known_folder_skips_the_move() {
        let store = store();
        store
            .raw()
            .execute("DELETE FROM folders WHERE code = 'spam'", [])
            .unwrap();
        let transport = FakeTransport::working();
        let workflow = Workflow::new(
            &store,
            &transport,
            SystemFolders::load(&store).unwrap(),
            "me@example.com",
        );

        let inbox = store.folder_by_code(codes::INBOX).unwrap().unwrap();
        let email = store
            .create_email(&NewEmail {
                subject: "x".into(),
                status: Status::Read,
                folder_id: Some(inbox.id),
                ..Default::default()
            })
            .unwrap();

        workflow.spam(&[email.id]).unwrap();
        let unchanged = store.get_email(email.id).unwrap();
        assert_eq!(unchanged.folder_id, Some(inbox.id));
        assert_eq!(unchanged.status, Status::Read);
    }
}
