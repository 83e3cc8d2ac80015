use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use resolve_db::{Database, queries};
use resolve_types::models::{ComplaintStatus, TimelineEntry};

/// One event about to be written to a complaint's timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub label: String,
    pub comment: String,
    pub actor: Option<Uuid>,
    pub is_public: bool,
}

impl TimelineEvent {
    pub fn new(label: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            comment: comment.into(),
            actor: None,
            is_public: true,
        }
    }

    pub fn status(status: ComplaintStatus, comment: impl Into<String>) -> Self {
        Self::new(status.as_str(), comment)
    }

    pub fn by(mut self, actor: Option<Uuid>) -> Self {
        self.actor = actor;
        self
    }

    pub fn visible(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }
}

/// Append an entry. Meant to run inside the same transaction as the complaint
/// write it describes.
pub fn append(
    conn: &Connection,
    complaint_id: Uuid,
    event: TimelineEvent,
    at: DateTime<Utc>,
) -> Result<TimelineEntry> {
    let entry = TimelineEntry {
        id: Uuid::new_v4(),
        complaint_id,
        status: event.label,
        comment: event.comment,
        is_public: event.is_public,
        updated_by: event.actor,
        timestamp: at,
    };
    queries::insert_timeline_entry(conn, &entry)?;
    Ok(entry)
}

/// Entries newest-first; private entries only when `include_private`.
pub fn entries(db: &Database, complaint_id: Uuid, include_private: bool) -> Result<Vec<TimelineEntry>> {
    db.get_timeline(complaint_id, !include_private)
}
