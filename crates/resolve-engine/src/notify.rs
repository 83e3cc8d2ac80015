use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

use resolve_db::Database;
use resolve_types::models::{Notification, NotificationKind};

use crate::clock::Clock;

/// External delivery channel (email, SMS, ...).
pub trait Outbound: Send + Sync {
    fn send(&self, recipient: &str, title: &str, body: &str) -> Result<()>;
}

/// Stands in for a real provider: every message becomes a log line on the
/// `notification` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOutbound;

impl Outbound for LogOutbound {
    fn send(&self, recipient: &str, title: &str, body: &str) -> Result<()> {
        info!(target: "notification", %recipient, %title, %body, "Notification sent");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub complaint_id: Option<Uuid>,
}

impl Message {
    pub fn new(kind: NotificationKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            complaint_id: None,
        }
    }

    pub fn about(mut self, complaint_id: Uuid) -> Self {
        self.complaint_id = Some(complaint_id);
        self
    }
}

/// Fire-and-forget notification fan-out. Delivery goes through the
/// [`Outbound`] channel for every recipient; recipients that match a
/// registered user also get an in-app record.
#[derive(Clone)]
pub struct Notifier {
    db: Arc<Database>,
    outbound: Arc<dyn Outbound>,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(db: Arc<Database>, outbound: Arc<dyn Outbound>, clock: Arc<dyn Clock>) -> Self {
        Self { db, outbound, clock }
    }

    /// Never fails. Returns the in-app record when one was stored.
    pub fn dispatch(&self, recipient: &str, message: Message) -> Option<Notification> {
        if let Err(e) = self.outbound.send(recipient, &message.title, &message.body) {
            warn!("Outbound delivery to {} failed: {}", recipient, e);
        }

        match self.persist(recipient, message) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to store notification for {}: {}", recipient, e);
                None
            }
        }
    }

    fn persist(&self, recipient: &str, message: Message) -> Result<Option<Notification>> {
        let Some(user) = self.db.get_user_by_email(recipient)? else {
            debug!("No account for {}, skipping in-app notification", recipient);
            return Ok(None);
        };

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: user.id,
            complaint_id: message.complaint_id,
            title: message.title,
            message: message.body,
            notification_type: message.kind,
            is_read: false,
            created_at: self.clock.now(),
        };
        self.db.insert_notification(&notification)?;
        Ok(Some(notification))
    }

    /// No-op for unknown ids and for notifications addressed to someone
    /// else. Returns whether a notification of `user_id` was marked.
    pub fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        self.db.mark_notification_read(id, user_id)
    }

    /// Newest first; empty for an email with no account.
    pub fn list_for_user(&self, email: &str, unread_only: bool) -> Result<Vec<Notification>> {
        match self.db.get_user_by_email(email)? {
            Some(user) => self.db.list_notifications(user.id, unread_only),
            None => Ok(vec![]),
        }
    }
}
