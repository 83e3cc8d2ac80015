use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use resolve_db::{Database, queries};
use resolve_types::api::ComplaintQuery;
use resolve_types::models::{
    Attachment, Complaint, ComplaintChanges, ComplaintStatus, NewComplaint, NotificationKind,
    TimelineEntry, User,
};

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::files::{FileStore, Upload};
use crate::notify::{Message, Notifier, Outbound};
use crate::sweeper::{EscalationPolicy, Escalator};
use crate::timeline::{self, TimelineEvent};

/// Owns the complaint state machine.
pub struct Engine {
    pub(crate) db: Arc<Database>,
    pub(crate) notifier: Notifier,
    pub(crate) files: Arc<dyn FileStore>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(
        db: Arc<Database>,
        files: Arc<dyn FileStore>,
        outbound: Arc<dyn Outbound>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let notifier = Notifier::new(db.clone(), outbound, clock.clone());
        Self {
            db,
            notifier,
            files,
            clock,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn escalator(&self, policy: EscalationPolicy) -> Escalator {
        Escalator::new(self.db.clone(), self.notifier.clone(), self.clock.clone(), policy)
    }

    // -- Reads --

    pub fn get(&self, id: Uuid) -> Result<Complaint> {
        self.db.get_complaint(id)?.ok_or_else(|| EngineError::complaint(id))
    }

    pub fn list(&self, filter: &ComplaintQuery) -> Result<Vec<Complaint>> {
        Ok(self.db.list_complaints(filter)?)
    }

    pub fn list_for_user(&self, email: &str) -> Result<Vec<Complaint>> {
        let user = self.actor(email)?;
        Ok(self.db.list_complaints_for_user(user.id)?)
    }

    pub fn attachments(&self, id: Uuid) -> Result<Vec<Attachment>> {
        self.get(id)?;
        Ok(self.db.list_attachments(id)?)
    }

    pub fn users(&self) -> Result<Vec<User>> {
        Ok(self.db.list_users()?)
    }

    /// Timeline newest-first. Non-staff callers only see public entries.
    pub fn timeline(&self, id: Uuid, is_staff: bool) -> Result<Vec<TimelineEntry>> {
        self.get(id)?;
        Ok(timeline::entries(&self.db, id, is_staff)?)
    }

    // -- Transitions --

    pub fn submit(&self, new: NewComplaint, attachment: Option<Upload>) -> Result<Complaint> {
        let owner = if new.is_anonymous { None } else { new.user_id };
        if let Some(owner_id) = owner {
            if self.db.get_user_by_id(owner_id)?.is_none() {
                return Err(EngineError::NotFound { kind: "user", id: owner_id });
            }
        }

        let now = self.clock.now();
        let complaint = Complaint {
            id: Uuid::new_v4(),
            user_id: owner,
            category: new.category,
            title: new.title,
            description: new.description,
            priority: new.priority.unwrap_or_default(),
            status: new.status.unwrap_or(ComplaintStatus::New),
            is_anonymous: new.is_anonymous,
            anonymous_email: new.anonymous_email.filter(|e| !e.trim().is_empty()),
            assigned_to: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };

        // The blob goes first so the attachment row can reference it; if the
        // transaction then fails the blob is removed again.
        let stored = match &attachment {
            Some(upload) => Some((upload, self.files.store(upload)?)),
            None => None,
        };
        let with_evidence = stored.is_some();

        let result = self.db.with_tx(|conn| {
            queries::insert_complaint(conn, &complaint)?;
            let comment = if with_evidence {
                "Complaint submitted with evidence."
            } else {
                "Complaint submitted."
            };
            timeline::append(conn, complaint.id, TimelineEvent::new("NEW", comment), now)?;

            if let Some((upload, file)) = &stored {
                queries::insert_attachment(
                    conn,
                    &Attachment {
                        id: Uuid::new_v4(),
                        complaint_id: complaint.id,
                        file_name: upload.file_name.clone(),
                        file_path: file.reference.clone(),
                        file_type: upload.content_type.clone(),
                        file_size: file.size,
                        sha256: file.sha256.clone(),
                        uploaded_at: now,
                    },
                )?;
            }
            Ok(())
        });

        if let Err(e) = result {
            if let Some((_, file)) = &stored {
                if let Err(cleanup) = self.files.remove(&file.reference) {
                    warn!("Failed to remove orphaned upload {}: {}", file.reference, cleanup);
                }
            }
            return Err(e.into());
        }

        info!("Complaint {} submitted ({})", complaint.id, complaint.category);

        if let Some(recipient) = self.contact(&complaint) {
            let body = if with_evidence {
                format!("Your complaint #{} has been received with evidence.", complaint.id)
            } else {
                format!("Your complaint #{} has been received.", complaint.id)
            };
            self.notifier.dispatch(
                &recipient,
                Message::new(NotificationKind::StatusUpdate, "Complaint Submitted", body)
                    .about(complaint.id),
            );
        }

        Ok(complaint)
    }

    /// Replace the editable fields. Logs a timeline entry only when the
    /// status actually changed.
    pub fn update(&self, id: Uuid, changes: ComplaintChanges) -> Result<Complaint> {
        self.apply(id, |c, _| {
            let previous = c.status;
            c.title = changes.title;
            c.description = changes.description;
            c.category = changes.category;
            c.priority = changes.priority;
            c.status = changes.status;
            c.is_anonymous = changes.is_anonymous;
            c.anonymous_email = changes.anonymous_email;

            (previous != c.status).then(|| {
                TimelineEvent::status(c.status, format!("Status updated to {}", c.status))
            })
        })
    }

    pub fn assign(&self, id: Uuid, technician_id: Uuid) -> Result<Complaint> {
        let technician = self
            .db
            .get_user_by_id(technician_id)?
            .ok_or_else(|| EngineError::NotFound { kind: "technician", id: technician_id })?;

        let complaint = self.apply(id, |c, _| {
            c.assigned_to = Some(technician.id);
            c.status = ComplaintStatus::InProgress;
            Some(TimelineEvent::status(
                ComplaintStatus::InProgress,
                format!("Complaint assigned to {}", technician.full_name),
            ))
        })?;

        info!("Complaint {} assigned to {}", complaint.id, technician.email);

        if let Some(recipient) = self.contact(&complaint) {
            self.notifier.dispatch(
                &recipient,
                Message::new(
                    NotificationKind::Assignment,
                    "Technician Assigned",
                    format!(
                        "Your complaint #{} has been assigned to {}",
                        complaint.id, technician.full_name
                    ),
                )
                .about(complaint.id),
            );
        }
        self.notifier.dispatch(
            &technician.email,
            Message::new(
                NotificationKind::Assignment,
                "New Complaint Assigned",
                format!("You have been assigned a new complaint: #{}", complaint.id),
            )
            .about(complaint.id),
        );

        Ok(complaint)
    }

    /// Returns `Ok(None)` when the complaint does not exist; a comment on a
    /// missing complaint is dropped, not rejected.
    pub fn add_comment(
        &self,
        id: Uuid,
        comment: &str,
        actor_email: &str,
        is_public: bool,
    ) -> Result<Option<TimelineEntry>> {
        let actor = self.actor(actor_email)?;
        let now = self.clock.now();

        let entry = self.db.with_tx(|conn| {
            let Some(complaint) = queries::find_complaint(conn, id)? else {
                return Ok(None);
            };
            let event = TimelineEvent::status(complaint.status, comment)
                .by(Some(actor.id))
                .visible(is_public);
            timeline::append(conn, complaint.id, event, now).map(Some)
        })?;

        if entry.is_none() {
            info!("Comment from {} dropped: complaint {} does not exist", actor.email, id);
        }
        Ok(entry)
    }

    pub fn resolve(&self, id: Uuid, comment: Option<String>, admin_email: &str) -> Result<Complaint> {
        let admin = self.actor(admin_email)?;
        let comment = non_blank(comment).unwrap_or_else(|| "Grievance has been resolved.".into());

        let complaint = self.apply(id, |c, now| {
            c.status = ComplaintStatus::Resolved;
            c.resolved_at = Some(now);
            Some(TimelineEvent::status(ComplaintStatus::Resolved, comment).by(Some(admin.id)))
        })?;

        info!("Complaint {} resolved by {}", complaint.id, admin.email);

        if let Some(recipient) = self.contact(&complaint) {
            self.notifier.dispatch(
                &recipient,
                Message::new(
                    NotificationKind::Resolution,
                    "Grievance Resolved",
                    format!(
                        "Your grievance #{} has been marked as resolved. Please review the solution.",
                        complaint.id
                    ),
                )
                .about(complaint.id),
            );
        }

        Ok(complaint)
    }

    pub fn close(&self, id: Uuid, comment: Option<String>, user_email: &str) -> Result<Complaint> {
        let actor = self.optional_actor(user_email)?;
        let comment =
            non_blank(comment).unwrap_or_else(|| "User acknowledged the resolution.".into());

        let complaint = self.apply(id, |c, _| {
            c.status = ComplaintStatus::Closed;
            Some(TimelineEvent::status(ComplaintStatus::Closed, comment).by(actor))
        })?;

        info!("Complaint {} closed", complaint.id);
        Ok(complaint)
    }

    pub fn reopen(&self, id: Uuid, reason: &str, user_email: &str) -> Result<Complaint> {
        let actor = self.optional_actor(user_email)?;

        let complaint = self.apply(id, |c, _| {
            c.status = ComplaintStatus::InProgress;
            Some(TimelineEvent::new("REOPENED", format!("Grievance reopened: {}", reason)).by(actor))
        })?;

        info!("Complaint {} reopened", complaint.id);
        Ok(complaint)
    }

    /// Permanently remove a complaint together with its timeline and
    /// attachment rows. Stored blobs are removed best-effort afterwards.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let attachments = self.db.list_attachments(id)?;
        if !self.db.delete_complaint(id)? {
            return Err(EngineError::complaint(id));
        }

        for attachment in attachments {
            if let Err(e) = self.files.remove(&attachment.file_path) {
                warn!("Failed to remove attachment {}: {}", attachment.file_path, e);
            }
        }

        info!("Complaint {} deleted", id);
        Ok(())
    }

    // -- Helpers --

    /// Load, mutate and save a complaint plus its timeline entry in one
    /// transaction. `mutate` returns the event to log, if any.
    fn apply<F>(&self, id: Uuid, mutate: F) -> Result<Complaint>
    where
        F: FnOnce(&mut Complaint, DateTime<Utc>) -> Option<TimelineEvent>,
    {
        let now = self.clock.now();
        let updated = self.db.with_tx(|conn| {
            let Some(mut complaint) = queries::find_complaint(conn, id)? else {
                return Ok(None);
            };
            let event = mutate(&mut complaint, now);
            complaint.updated_at = now;
            queries::update_complaint(conn, &complaint)?;
            if let Some(event) = event {
                timeline::append(conn, complaint.id, event, now)?;
            }
            Ok(Some(complaint))
        })?;

        updated.ok_or_else(|| EngineError::complaint(id))
    }

    fn actor(&self, email: &str) -> Result<User> {
        self.db
            .get_user_by_email(email)?
            .ok_or_else(|| EngineError::UnknownActor(email.to_string()))
    }

    fn optional_actor(&self, email: &str) -> Result<Option<Uuid>> {
        Ok(self.db.get_user_by_email(email)?.map(|u| u.id))
    }

    /// Who hears about this complaint: the owner's email, or the anonymous
    /// contact address, or nobody.
    pub(crate) fn contact(&self, complaint: &Complaint) -> Option<String> {
        contact_for(&self.db, complaint)
    }
}

pub(crate) fn contact_for(db: &Database, complaint: &Complaint) -> Option<String> {
    if let Some(owner_id) = complaint.user_id {
        match db.get_user_by_id(owner_id) {
            Ok(Some(owner)) => return Some(owner.email),
            Ok(None) => warn!("Owner {} of complaint {} no longer exists", owner_id, complaint.id),
            Err(e) => {
                warn!("Owner lookup for complaint {} failed: {}", complaint.id, e);
                return None;
            }
        }
    }
    if complaint.is_anonymous {
        return complaint.anonymous_email.clone();
    }
    None
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}
