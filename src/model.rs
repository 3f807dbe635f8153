use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Technical codes of the well-known system folders. Default routing resolves
/// folders by these codes; everything else is a user folder.
pub mod codes {
    pub const INBOX: &str = "inbox";
    pub const SENT: &str = "sent";
    pub const DRAFT: &str = "draft";
    pub const ARCHIVE: &str = "archive";
    pub const SPAM: &str = "spam";

    pub const ALL: [&str; 5] = [INBOX, SENT, DRAFT, ARCHIVE, SPAM];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Draft,
    ToSend,
    Sent,
    Read,
    Archived,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::ToSend => "to_send",
            Status::Sent => "sent",
            Status::Read => "read",
            Status::Archived => "archived",
            Status::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "draft" => Some(Status::Draft),
            "to_send" => Some(Status::ToSend),
            "sent" => Some(Status::Sent),
            "read" => Some(Status::Read),
            "archived" => Some(Status::Archived),
            "failed" => Some(Status::Failed),
            _ => None,
        }
    }

    /// Counts toward a folder's unread badge.
    pub fn is_unread(&self) -> bool {
        !matches!(self, Status::Read | Status::Archived)
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| Status::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Priority> {
        match s {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| Priority::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub icon: String,
    pub sequence: i64,
    pub color: i64,
    pub description: Option<String>,
    pub is_system: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFolder {
    pub name: String,
    pub code: String,
    pub icon: String,
    pub sequence: i64,
    pub color: i64,
    pub description: Option<String>,
    pub is_system: bool,
}

impl Default for NewFolder {
    fn default() -> Self {
        NewFolder {
            name: String::new(),
            code: String::new(),
            icon: "fa-folder".to_string(),
            sequence: 10,
            color: 0,
            description: None,
            is_system: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FolderCounts {
    pub total: i64,
    pub unread: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    pub name: String,
    pub color: i64,
    pub sequence: i64,
    pub description: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLabel {
    pub name: String,
    pub color: i64,
    pub sequence: i64,
    pub description: Option<String>,
}

impl Default for NewLabel {
    fn default() -> Self {
        NewLabel {
            name: String::new(),
            color: 0,
            sequence: 10,
            description: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    pub id: i64,
    pub subject: String,
    pub sender_id: Option<i64>,
    pub sender_email: Option<String>,
    pub recipient_ids: Vec<i64>,
    pub recipient_email: Option<String>,
    pub cc_ids: Vec<i64>,
    pub body_html: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub status: Status,
    pub priority: Priority,
    pub folder_id: Option<i64>,
    pub label_ids: Vec<i64>,
    pub attachments: Vec<Attachment>,
    pub is_inbound: bool,
    pub message_id: Option<String>,
    /// Message-ID of the RFC 822 message handed to the transport, set on
    /// successful send.
    pub transport_message_id: Option<String>,
    pub error_message: Option<String>,
    pub ai_summary: Option<String>,
    pub ai_suggested_reply: Option<String>,
}

/// Values for a record about to be created. Status and folder default to a
/// fresh draft; ingestion and callers override as needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEmail {
    pub subject: String,
    pub sender_id: Option<i64>,
    pub sender_email: Option<String>,
    pub recipient_ids: Vec<i64>,
    pub recipient_email: Option<String>,
    pub cc_ids: Vec<i64>,
    pub body_html: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub status: Status,
    pub priority: Priority,
    pub folder_id: Option<i64>,
    pub label_ids: Vec<i64>,
    pub attachments: Vec<Attachment>,
    pub is_inbound: bool,
    pub message_id: Option<String>,
}
