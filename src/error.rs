use serde::{Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("select at least one recipient")]
    NoRecipients,

    #[error("folder code '{0}' is already taken")]
    DuplicateFolderCode(String),

    #[error("system folder '{0}' cannot be deleted")]
    SystemFolder(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("delivery failed: {0}")]
    Transport(String),

    #[error("cannot reach the AI service, check that the model server is running")]
    AiUnreachable,

    #[error("the AI model is taking too long to respond, try again")]
    AiTimeout,

    #[error("AI request failed: {0}")]
    Ai(String),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
