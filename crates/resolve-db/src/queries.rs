use crate::Database;
use crate::models::{
    AttachmentRow, ComplaintRow, NotificationRow, TimelineRow, UserRow, format_ts,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use resolve_types::api::ComplaintQuery;
use resolve_types::models::{
    Attachment, Complaint, ComplaintStatus, Notification, TimelineEntry, User,
};

const USER_COLUMNS: &str = "id, full_name, email, password, role, created_at";

const COMPLAINT_COLUMNS: &str = "id, user_id, category, title, description, priority, status, \
     is_anonymous, anonymous_email, assigned_to, created_at, updated_at, resolved_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &User, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, full_name, email, password, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id.to_string(),
                    &user.full_name,
                    &user.email,
                    password_hash,
                    user.role.as_str(),
                    format_ts(user.created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Raw row including the password hash. Only the login path needs this.
    pub fn get_credentials_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_row_by_email(conn, email))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| find_user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| find_user_by_id(conn, id))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY created_at",
                USER_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(UserRow::into_model).collect()
        })
    }

    // -- Complaints --

    pub fn get_complaint(&self, id: Uuid) -> Result<Option<Complaint>> {
        self.with_conn(|conn| find_complaint(conn, id))
    }

    pub fn list_complaints(&self, filter: &ComplaintQuery) -> Result<Vec<Complaint>> {
        self.with_conn(|conn| query_complaints(conn, filter))
    }

    pub fn list_complaints_for_user(&self, user_id: Uuid) -> Result<Vec<Complaint>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM complaints WHERE user_id = ?1 ORDER BY created_at DESC",
                COMPLAINT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], complaint_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ComplaintRow::into_model).collect()
        })
    }

    /// Complaints in any of `statuses` created strictly before `threshold`.
    pub fn list_complaints_created_before(
        &self,
        statuses: &[ComplaintStatus],
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Complaint>> {
        if statuses.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (2..statuses.len() + 2).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {} FROM complaints
                 WHERE created_at < ?1 AND status IN ({})
                 ORDER BY created_at",
                COMPLAINT_COLUMNS,
                placeholders.join(", ")
            );

            let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(format_ts(threshold))];
            params.extend(statuses.iter().map(|s| Box::new(s.as_str()) as Box<dyn ToSql>));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), complaint_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ComplaintRow::into_model).collect()
        })
    }

    pub fn count_complaints(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM complaints", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    pub fn count_complaints_by_status(&self, status: ComplaintStatus) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM complaints WHERE status = ?1",
                [status.as_str()],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
    }

    pub fn count_complaints_by_category(&self) -> Result<Vec<(String, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT category, COUNT(*) FROM complaints GROUP BY category ORDER BY category",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns `true` if a row was removed.
    pub fn delete_complaint(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM complaints WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    // -- Timeline --

    /// Entries newest-first. Ties on timestamp fall back to insertion order.
    pub fn get_timeline(&self, complaint_id: Uuid, public_only: bool) -> Result<Vec<TimelineEntry>> {
        self.with_conn(|conn| {
            let sql = if public_only {
                "SELECT id, complaint_id, status, comment, is_public, updated_by, timestamp
                 FROM complaint_timeline
                 WHERE complaint_id = ?1 AND is_public = 1
                 ORDER BY timestamp DESC, rowid DESC"
            } else {
                "SELECT id, complaint_id, status, comment, is_public, updated_by, timestamp
                 FROM complaint_timeline
                 WHERE complaint_id = ?1
                 ORDER BY timestamp DESC, rowid DESC"
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([complaint_id.to_string()], |row| {
                    Ok(TimelineRow {
                        id: row.get(0)?,
                        complaint_id: row.get(1)?,
                        status: row.get(2)?,
                        comment: row.get(3)?,
                        is_public: row.get(4)?,
                        updated_by: row.get(5)?,
                        timestamp: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(TimelineRow::into_model).collect()
        })
    }

    // -- Notifications --

    pub fn insert_notification(&self, n: &Notification) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications
                    (id, user_id, complaint_id, title, message, notification_type, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    n.id.to_string(),
                    n.user_id.to_string(),
                    n.complaint_id.map(|id| id.to_string()),
                    &n.title,
                    &n.message,
                    n.notification_type.as_str(),
                    n.is_read,
                    format_ts(n.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let sql = if unread_only {
                "SELECT id, user_id, complaint_id, title, message, notification_type, is_read, created_at
                 FROM notifications WHERE user_id = ?1 AND is_read = 0
                 ORDER BY created_at DESC, rowid DESC"
            } else {
                "SELECT id, user_id, complaint_id, title, message, notification_type, is_read, created_at
                 FROM notifications WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        complaint_id: row.get(2)?,
                        title: row.get(3)?,
                        message: row.get(4)?,
                        notification_type: row.get(5)?,
                        is_read: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(NotificationRow::into_model).collect()
        })
    }

    /// Returns `true` if the notification exists and belongs to `user_id`.
    pub fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                [id.to_string(), user_id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    // -- Attachments --

    pub fn list_attachments(&self, complaint_id: Uuid) -> Result<Vec<Attachment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, complaint_id, file_name, file_path, file_type, file_size, sha256, uploaded_at
                 FROM attachments WHERE complaint_id = ?1 ORDER BY uploaded_at",
            )?;
            let rows = stmt
                .query_map([complaint_id.to_string()], |row| {
                    Ok(AttachmentRow {
                        id: row.get(0)?,
                        complaint_id: row.get(1)?,
                        file_name: row.get(2)?,
                        file_path: row.get(3)?,
                        file_type: row.get(4)?,
                        file_size: row.get(5)?,
                        sha256: row.get(6)?,
                        uploaded_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(AttachmentRow::into_model).collect()
        })
    }
}

// -- Statement helpers usable inside `Database::with_tx` --

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    query_user_row_by_email(conn, email)?
        .map(UserRow::into_model)
        .transpose()
}

pub fn find_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))?;
    stmt.query_row([id.to_string()], user_row)
        .optional()?
        .map(UserRow::into_model)
        .transpose()
}

pub fn find_complaint(conn: &Connection, id: Uuid) -> Result<Option<Complaint>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM complaints WHERE id = ?1",
        COMPLAINT_COLUMNS
    ))?;
    stmt.query_row([id.to_string()], complaint_row)
        .optional()?
        .map(ComplaintRow::into_model)
        .transpose()
}

pub fn insert_complaint(conn: &Connection, c: &Complaint) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO complaints ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            COMPLAINT_COLUMNS
        ),
        rusqlite::params![
            c.id.to_string(),
            c.user_id.map(|id| id.to_string()),
            &c.category,
            &c.title,
            &c.description,
            c.priority.as_str(),
            c.status.as_str(),
            c.is_anonymous,
            &c.anonymous_email,
            c.assigned_to.map(|id| id.to_string()),
            format_ts(c.created_at),
            format_ts(c.updated_at),
            c.resolved_at.map(format_ts),
        ],
    )?;
    Ok(())
}

/// Overwrite every mutable column of an existing complaint.
pub fn update_complaint(conn: &Connection, c: &Complaint) -> Result<()> {
    conn.execute(
        "UPDATE complaints SET
            user_id = ?2, category = ?3, title = ?4, description = ?5, priority = ?6,
            status = ?7, is_anonymous = ?8, anonymous_email = ?9, assigned_to = ?10,
            updated_at = ?11, resolved_at = ?12
         WHERE id = ?1",
        rusqlite::params![
            c.id.to_string(),
            c.user_id.map(|id| id.to_string()),
            &c.category,
            &c.title,
            &c.description,
            c.priority.as_str(),
            c.status.as_str(),
            c.is_anonymous,
            &c.anonymous_email,
            c.assigned_to.map(|id| id.to_string()),
            format_ts(c.updated_at),
            c.resolved_at.map(format_ts),
        ],
    )?;
    Ok(())
}

pub fn insert_timeline_entry(conn: &Connection, e: &TimelineEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO complaint_timeline (id, complaint_id, status, comment, is_public, updated_by, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            e.id.to_string(),
            e.complaint_id.to_string(),
            &e.status,
            &e.comment,
            e.is_public,
            e.updated_by.map(|id| id.to_string()),
            format_ts(e.timestamp),
        ],
    )?;
    Ok(())
}

pub fn insert_attachment(conn: &Connection, a: &Attachment) -> Result<()> {
    conn.execute(
        "INSERT INTO attachments (id, complaint_id, file_name, file_path, file_type, file_size, sha256, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            a.id.to_string(),
            a.complaint_id.to_string(),
            &a.file_name,
            &a.file_path,
            &a.file_type,
            a.file_size as i64,
            &a.sha256,
            format_ts(a.uploaded_at),
        ],
    )?;
    Ok(())
}

fn query_user_row_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE email = ?1 COLLATE NOCASE",
        USER_COLUMNS
    ))?;
    Ok(stmt.query_row([email], user_row).optional()?)
}

fn query_complaints(conn: &Connection, filter: &ComplaintQuery) -> Result<Vec<Complaint>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("status = ?");
        params.push(Box::new(status.as_str()));
    }
    if let Some(category) = &filter.category {
        clauses.push("category = ?");
        params.push(Box::new(category.clone()));
    }
    if let Some(priority) = filter.priority {
        clauses.push("priority = ?");
        params.push(Box::new(priority.as_str()));
    }
    if let Some(assignee) = filter.assigned_to {
        clauses.push("assigned_to = ?");
        params.push(Box::new(assignee.to_string()));
    }
    if let Some(anonymous) = filter.anonymous {
        clauses.push("is_anonymous = ?");
        params.push(Box::new(anonymous));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {} FROM complaints{} ORDER BY created_at DESC",
        COMPLAINT_COLUMNS, where_sql
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), complaint_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(ComplaintRow::into_model).collect()
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn complaint_row(row: &Row<'_>) -> rusqlite::Result<ComplaintRow> {
    Ok(ComplaintRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        priority: row.get(5)?,
        status: row.get(6)?,
        is_anonymous: row.get(7)?,
        anonymous_email: row.get(8)?,
        assigned_to: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        resolved_at: row.get(12)?,
    })
}
