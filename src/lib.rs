//! Email client core: folders, labels, the email record lifecycle, inbound
//! ingestion and AI-assisted composition.
//!
//! The UI, authentication and the actual IMAP plumbing live elsewhere; this
//! crate owns the records, their status transitions, the SMTP handoff and the
//! calls to a local inference service.

pub mod ai;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod sanitize;
pub mod store;
pub mod transport;
pub mod workflow;

pub use error::{Error, Result};
