use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::model::{
    codes, Attachment, Contact, Email, Folder, FolderCounts, Label, NewEmail, NewFolder, NewLabel,
    Status,
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS folders (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        icon TEXT NOT NULL DEFAULT 'fa-folder',
        sequence INTEGER NOT NULL DEFAULT 10,
        color INTEGER NOT NULL DEFAULT 0,
        description TEXT,
        is_system INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS labels (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        color INTEGER NOT NULL DEFAULT 0,
        sequence INTEGER NOT NULL DEFAULT 10,
        description TEXT,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS contacts (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS emails (
        id INTEGER PRIMARY KEY,
        subject TEXT NOT NULL,
        sender_id INTEGER REFERENCES contacts(id),
        sender_email TEXT,
        recipient_email TEXT,
        body_html TEXT NOT NULL DEFAULT '',
        sent_at TEXT,
        received_at TEXT,
        status TEXT NOT NULL DEFAULT 'draft',
        priority TEXT NOT NULL DEFAULT 'normal',
        folder_id INTEGER REFERENCES folders(id),
        is_inbound INTEGER NOT NULL DEFAULT 0,
        message_id TEXT,
        transport_message_id TEXT,
        error_message TEXT,
        ai_summary TEXT,
        ai_suggested_reply TEXT
    );

    CREATE TABLE IF NOT EXISTS email_recipients (
        email_id INTEGER NOT NULL REFERENCES emails(id),
        contact_id INTEGER NOT NULL REFERENCES contacts(id),
        PRIMARY KEY (email_id, contact_id)
    );

    CREATE TABLE IF NOT EXISTS email_cc (
        email_id INTEGER NOT NULL REFERENCES emails(id),
        contact_id INTEGER NOT NULL REFERENCES contacts(id),
        PRIMARY KEY (email_id, contact_id)
    );

    CREATE TABLE IF NOT EXISTS email_labels (
        email_id INTEGER NOT NULL REFERENCES emails(id),
        label_id INTEGER NOT NULL REFERENCES labels(id),
        PRIMARY KEY (email_id, label_id)
    );

    CREATE TABLE IF NOT EXISTS email_attachments (
        id INTEGER PRIMARY KEY,
        email_id INTEGER NOT NULL REFERENCES emails(id),
        filename TEXT NOT NULL,
        content_type TEXT NOT NULL,
        path TEXT NOT NULL
    );
"#;

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let store = Store { conn };
        store.seed_system_folders()?;
        Ok(store)
    }

    /// Ensures exactly one folder per well-known code exists. Safe to call
    /// again on an already-seeded database.
    pub(crate) fn seed_system_folders(&self) -> Result<()> {
        const SYSTEM: [(&str, &str, &str, i64); 5] = [
            ("Inbox", codes::INBOX, "fa-inbox", 1),
            ("Sent", codes::SENT, "fa-paper-plane", 2),
            ("Drafts", codes::DRAFT, "fa-pencil", 3),
            ("Archive", codes::ARCHIVE, "fa-archive", 4),
            ("Spam", codes::SPAM, "fa-ban", 5),
        ];

        for (name, code, icon, sequence) in SYSTEM {
            self.conn.execute(
                "INSERT OR IGNORE INTO folders (name, code, icon, sequence, is_system)
                 VALUES (?1, ?2, ?3, ?4, 1)",
                params![name, code, icon, sequence],
            )?;
        }
        Ok(())
    }

    // -- Folders --

    pub fn create_folder(&self, new: &NewFolder) -> Result<Folder> {
        let result = self.conn.execute(
            "INSERT INTO folders (name, code, icon, sequence, color, description, is_system)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.name,
                new.code,
                new.icon,
                new.sequence,
                new.color,
                new.description,
                new.is_system
            ],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(Error::DuplicateFolderCode(new.code.clone()));
            }
            Err(e) => return Err(e.into()),
        }
        let id = self.conn.last_insert_rowid();
        self.folder_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("folder {}", id)))
    }

    pub fn folder_by_id(&self, id: i64) -> Result<Option<Folder>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, code, icon, sequence, color, description, is_system
                 FROM folders WHERE id = ?1",
                params![id],
                folder_from_row,
            )
            .optional()?)
    }

    pub fn folder_by_code(&self, code: &str) -> Result<Option<Folder>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, code, icon, sequence, color, description, is_system
                 FROM folders WHERE code = ?1",
                params![code],
                folder_from_row,
            )
            .optional()?)
    }

    pub fn list_folders(&self) -> Result<Vec<Folder>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, code, icon, sequence, color, description, is_system
             FROM folders ORDER BY sequence, id",
        )?;
        let rows = stmt.query_map([], folder_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// System folders refuse deletion. Emails in a deleted folder are left
    /// without a folder, not removed.
    pub fn delete_folder(&self, id: i64) -> Result<()> {
        let folder = self
            .folder_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("folder {}", id)))?;
        if folder.is_system {
            return Err(Error::SystemFolder(folder.name));
        }
        self.conn.execute(
            "UPDATE emails SET folder_id = NULL WHERE folder_id = ?1",
            params![id],
        )?;
        self.conn
            .execute("DELETE FROM folders WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn folder_counts(&self, folder_id: i64) -> Result<FolderCounts> {
        let total = self.conn.query_row(
            "SELECT COUNT(*) FROM emails WHERE folder_id = ?1",
            params![folder_id],
            |r| r.get(0),
        )?;
        let unread = self.conn.query_row(
            "SELECT COUNT(*) FROM emails WHERE folder_id = ?1 AND status NOT IN ('read', 'archived')",
            params![folder_id],
            |r| r.get(0),
        )?;
        Ok(FolderCounts { total, unread })
    }

    // -- Labels --

    pub fn create_label(&self, new: &NewLabel) -> Result<Label> {
        self.conn.execute(
            "INSERT INTO labels (name, color, sequence, description) VALUES (?1, ?2, ?3, ?4)",
            params![new.name, new.color, new.sequence, new.description],
        )?;
        let id = self.conn.last_insert_rowid();
        self.label_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("label {}", id)))
    }

    pub fn label_by_id(&self, id: i64) -> Result<Option<Label>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, color, sequence, description, active FROM labels WHERE id = ?1",
                params![id],
                label_from_row,
            )
            .optional()?)
    }

    pub fn list_labels(&self, include_inactive: bool) -> Result<Vec<Label>> {
        let sql = if include_inactive {
            "SELECT id, name, color, sequence, description, active
             FROM labels ORDER BY sequence, name"
        } else {
            "SELECT id, name, color, sequence, description, active
             FROM labels WHERE active = 1 ORDER BY sequence, name"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], label_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn set_label_active(&self, id: i64, active: bool) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE labels SET active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        touched(n, "label", id)
    }

    pub fn add_label(&self, email_id: i64, label_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO email_labels (email_id, label_id) VALUES (?1, ?2)",
            params![email_id, label_id],
        )?;
        Ok(())
    }

    pub fn remove_label(&self, email_id: i64, label_id: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM email_labels WHERE email_id = ?1 AND label_id = ?2",
            params![email_id, label_id],
        )?;
        Ok(())
    }

    pub fn label_email_count(&self, label_id: i64) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM email_labels WHERE label_id = ?1",
            params![label_id],
            |r| r.get(0),
        )?)
    }

    // -- Contacts --

    pub fn create_contact(&self, name: &str, email: &str) -> Result<Contact> {
        self.conn.execute(
            "INSERT INTO contacts (name, email) VALUES (?1, ?2)",
            params![name, email],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Contact {
            id,
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    pub fn contact_by_id(&self, id: i64) -> Result<Option<Contact>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, email FROM contacts WHERE id = ?1",
                params![id],
                contact_from_row,
            )
            .optional()?)
    }

    pub fn find_contact_by_email(&self, email: &str) -> Result<Option<Contact>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, email FROM contacts WHERE LOWER(email) = LOWER(?1) LIMIT 1",
                params![email],
                contact_from_row,
            )
            .optional()?)
    }

    // -- Emails --

    pub fn create_email(&self, new: &NewEmail) -> Result<Email> {
        self.conn.execute(
            "INSERT INTO emails (subject, sender_id, sender_email, recipient_email, body_html,
                                 sent_at, received_at, status, priority, folder_id, is_inbound,
                                 message_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                new.subject,
                new.sender_id,
                new.sender_email,
                new.recipient_email,
                new.body_html,
                new.sent_at.map(|d| d.to_rfc3339()),
                new.received_at.map(|d| d.to_rfc3339()),
                new.status,
                new.priority,
                new.folder_id,
                new.is_inbound,
                new.message_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        for contact_id in &new.recipient_ids {
            self.conn.execute(
                "INSERT OR IGNORE INTO email_recipients (email_id, contact_id) VALUES (?1, ?2)",
                params![id, contact_id],
            )?;
        }
        for contact_id in &new.cc_ids {
            self.conn.execute(
                "INSERT OR IGNORE INTO email_cc (email_id, contact_id) VALUES (?1, ?2)",
                params![id, contact_id],
            )?;
        }
        for label_id in &new.label_ids {
            self.add_label(id, *label_id)?;
        }
        for att in &new.attachments {
            self.conn.execute(
                "INSERT INTO email_attachments (email_id, filename, content_type, path)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, att.filename, att.content_type, att.path],
            )?;
        }

        self.get_email(id)
    }

    pub fn get_email(&self, id: i64) -> Result<Email> {
        let mut email = self
            .conn
            .query_row(
                "SELECT id, subject, sender_id, sender_email, recipient_email, body_html,
                        sent_at, received_at, status, priority, folder_id, is_inbound,
                        message_id, transport_message_id, error_message, ai_summary,
                        ai_suggested_reply
                 FROM emails WHERE id = ?1",
                params![id],
                email_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("email {}", id)))?;

        email.recipient_ids = self.linked_ids("email_recipients", "contact_id", id)?;
        email.cc_ids = self.linked_ids("email_cc", "contact_id", id)?;
        email.label_ids = self.linked_ids("email_labels", "label_id", id)?;

        let mut stmt = self.conn.prepare(
            "SELECT filename, content_type, path FROM email_attachments
             WHERE email_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![id], |r| {
            Ok(Attachment {
                filename: r.get(0)?,
                content_type: r.get(1)?,
                path: r.get(2)?,
            })
        })?;
        email.attachments = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(email)
    }

    /// Folder listing order: most recently sent first.
    pub fn list_emails_in_folder(&self, folder_id: i64) -> Result<Vec<Email>> {
        let ids = {
            let mut stmt = self.conn.prepare(
                "SELECT id FROM emails WHERE folder_id = ?1 ORDER BY sent_at DESC, id DESC",
            )?;
            let rows = stmt.query_map(params![folder_id], |r| r.get::<_, i64>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        ids.into_iter().map(|id| self.get_email(id)).collect()
    }

    pub fn list_emails_with_label(&self, label_id: i64) -> Result<Vec<Email>> {
        let ids = {
            let mut stmt = self.conn.prepare(
                "SELECT e.id FROM emails e
                 JOIN email_labels el ON el.email_id = e.id
                 WHERE el.label_id = ?1
                 ORDER BY e.sent_at DESC, e.id DESC",
            )?;
            let rows = stmt.query_map(params![label_id], |r| r.get::<_, i64>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        ids.into_iter().map(|id| self.get_email(id)).collect()
    }

    pub fn set_status(&self, id: i64, status: Status) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE emails SET status = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        touched(n, "email", id)
    }

    pub fn set_folder(&self, id: i64, folder_id: Option<i64>) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE emails SET folder_id = ?1 WHERE id = ?2",
            params![folder_id, id],
        )?;
        touched(n, "email", id)
    }

    pub fn set_sent_at(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE emails SET sent_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), id],
        )?;
        touched(n, "email", id)
    }

    pub fn set_transport_message_id(&self, id: i64, reference: Option<&str>) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE emails SET transport_message_id = ?1 WHERE id = ?2",
            params![reference, id],
        )?;
        touched(n, "email", id)
    }

    pub fn set_error(&self, id: i64, message: Option<&str>) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE emails SET error_message = ?1 WHERE id = ?2",
            params![message, id],
        )?;
        touched(n, "email", id)
    }

    pub fn set_ai_summary(&self, id: i64, summary: &str) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE emails SET ai_summary = ?1 WHERE id = ?2",
            params![summary, id],
        )?;
        touched(n, "email", id)
    }

    pub fn set_ai_suggested_reply(&self, id: i64, reply_html: &str) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE emails SET ai_suggested_reply = ?1 WHERE id = ?2",
            params![reply_html, id],
        )?;
        touched(n, "email", id)
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> &Connection {
        &self.conn
    }

    fn linked_ids(&self, table: &str, column: &str, email_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column} FROM {table} WHERE email_id = ?1 ORDER BY {column}"
        ))?;
        let rows = stmt.query_map(params![email_id], |r| r.get::<_, i64>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn touched(rows: usize, entity: &str, id: i64) -> Result<()> {
    if rows == 0 {
        return Err(Error::NotFound(format!("{} {}", entity, id)));
    }
    Ok(())
}

fn folder_from_row(row: &Row) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        icon: row.get(3)?,
        sequence: row.get(4)?,
        color: row.get(5)?,
        description: row.get(6)?,
        is_system: row.get(7)?,
    })
}

fn label_from_row(row: &Row) -> rusqlite::Result<Label> {
    Ok(Label {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        sequence: row.get(3)?,
        description: row.get(4)?,
        active: row.get(5)?,
    })
}

fn contact_from_row(row: &Row) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
    })
}

fn email_from_row(row: &Row) -> rusqlite::Result<Email> {
    Ok(Email {
        id: row.get(0)?,
        subject: row.get(1)?,
        sender_id: row.get(2)?,
        sender_email: row.get(3)?,
        recipient_email: row.get(4)?,
        body_html: row.get(5)?,
        sent_at: parse_timestamp(row.get::<_, Option<String>>(6)?),
        received_at: parse_timestamp(row.get::<_, Option<String>>(7)?),
        status: row.get(8)?,
        priority: row.get(9)?,
        folder_id: row.get(10)?,
        is_inbound: row.get(11)?,
        message_id: row.get(12)?,
        transport_message_id: row.get(13)?,
        error_message: row.get(14)?,
        ai_summary: row.get(15)?,
        ai_suggested_reply: row.get(16)?,
        recipient_ids: Vec::new(),
        cc_ids: Vec::new(),
        label_ids: Vec::new(),
        attachments: Vec::new(),
    })
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}
