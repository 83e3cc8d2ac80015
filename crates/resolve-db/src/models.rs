//! Database row types. These map directly to SQLite rows.
//! Converted into resolve-types models on the way out so callers never see
//! raw column strings.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use uuid::Uuid;

use resolve_types::models::{
    Attachment, Complaint, Notification, TimelineEntry, User,
};

/// Fixed-width RFC 3339 so that lexical order in SQL equals time order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through the sqlite shell use datetime('now').
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("Corrupt timestamp '{}'", raw))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt id '{}'", raw))
}

fn parse_opt_id(raw: Option<&str>) -> Result<Option<Uuid>> {
    raw.map(parse_id).transpose()
}

pub struct UserRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            full_name: self.full_name,
            email: self.email,
            role: self.role.parse()?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

pub struct ComplaintRow {
    pub id: String,
    pub user_id: Option<String>,
    pub category: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub is_anonymous: bool,
    pub anonymous_email: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub resolved_at: Option<String>,
}

impl ComplaintRow {
    pub fn into_model(self) -> Result<Complaint> {
        Ok(Complaint {
            id: parse_id(&self.id)?,
            user_id: parse_opt_id(self.user_id.as_deref())?,
            category: self.category,
            title: self.title,
            description: self.description,
            priority: self.priority.parse()?,
            status: self.status.parse()?,
            is_anonymous: self.is_anonymous,
            anonymous_email: self.anonymous_email,
            assigned_to: parse_opt_id(self.assigned_to.as_deref())?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            resolved_at: self.resolved_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

pub struct TimelineRow {
    pub id: String,
    pub complaint_id: String,
    pub status: String,
    pub comment: String,
    pub is_public: bool,
    pub updated_by: Option<String>,
    pub timestamp: String,
}

impl TimelineRow {
    pub fn into_model(self) -> Result<TimelineEntry> {
        Ok(TimelineEntry {
            id: parse_id(&self.id)?,
            complaint_id: parse_id(&self.complaint_id)?,
            status: self.status,
            comment: self.comment,
            is_public: self.is_public,
            updated_by: parse_opt_id(self.updated_by.as_deref())?,
            timestamp: parse_ts(&self.timestamp)?,
        })
    }
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub complaint_id: Option<String>,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub is_read: bool,
    pub created_at: String,
}

impl NotificationRow {
    pub fn into_model(self) -> Result<Notification> {
        Ok(Notification {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            complaint_id: parse_opt_id(self.complaint_id.as_deref())?,
            title: self.title,
            message: self.message,
            notification_type: self.notification_type.parse()?,
            is_read: self.is_read,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

pub struct AttachmentRow {
    pub id: String,
    pub complaint_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_type: Option<String>,
    pub file_size: i64,
    pub sha256: String,
    pub uploaded_at: String,
}

impl AttachmentRow {
    pub fn into_model(self) -> Result<Attachment> {
        Ok(Attachment {
            id: parse_id(&self.id)?,
            complaint_id: parse_id(&self.complaint_id)?,
            file_name: self.file_name,
            file_path: self.file_path,
            file_type: self.file_type,
            file_size: self.file_size.max(0) as u64,
            sha256: self.sha256,
            uploaded_at: parse_ts(&self.uploaded_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_ts_sorts_lexically() {
        let a = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        let c = a + chrono::Duration::hours(5);
        assert!(format_ts(a) < format_ts(b));
        assert!(format_ts(b) < format_ts(c));
        assert_eq!(format_ts(a).len(), format_ts(c).len());
    }

    #[test]
    fn test_parse_ts_accepts_sqlite_datetime() {
        let ts = parse_ts("2026-03-04 05:06:07").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap());
        assert_eq!(parse_ts(&format_ts(ts)).unwrap(), ts);
        assert!(parse_ts("yesterday").is_err());
    }
}
