use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use resolve_db::{Database, queries};
use resolve_types::api::SweepReport;
use resolve_types::models::{Complaint, ComplaintStatus, NotificationKind, Priority};

use crate::clock::Clock;
use crate::lifecycle::contact_for;
use crate::notify::{Message, Notifier};
use crate::timeline::{self, TimelineEvent};

pub const DEFAULT_SENIOR_ADMIN_EMAIL: &str = "senior-admin@resolveit.com";

#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    /// How long a complaint may wait in NEW/UNDER_REVIEW.
    pub sla: Duration,
    /// Always told about every escalation.
    pub senior_admin_email: String,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            sla: Duration::hours(48),
            senior_admin_email: DEFAULT_SENIOR_ADMIN_EMAIL.to_string(),
        }
    }
}

/// Promotes complaints that sat untriaged past the SLA to ESCALATED/CRITICAL.
pub struct Escalator {
    db: Arc<Database>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    policy: EscalationPolicy,
}

impl Escalator {
    pub fn new(
        db: Arc<Database>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        policy: EscalationPolicy,
    ) -> Self {
        Self {
            db,
            notifier,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// One pass over the store. Each complaint commits on its own; a failure
    /// on one is recorded and the pass moves on.
    pub fn sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let threshold = now - self.policy.sla;
        let candidates = self
            .db
            .list_complaints_created_before(ComplaintStatus::AWAITING_TRIAGE, threshold)?;

        let mut report = SweepReport::default();
        for candidate in candidates {
            match self.escalate(candidate.id) {
                Ok(Some(complaint)) => {
                    self.announce(&complaint);
                    report.escalated.push(complaint.id);
                }
                // Moved on by a live request since the candidate query.
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to escalate complaint {}: {}", candidate.id, e);
                    report.failed.push(candidate.id);
                }
            }
        }

        if !report.escalated.is_empty() || !report.failed.is_empty() {
            info!(
                "Escalation sweep: {} escalated, {} failed",
                report.escalated.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    fn escalate(&self, id: Uuid) -> Result<Option<Complaint>> {
        let now = self.clock.now();
        let comment = format!(
            "Automatically escalated due to SLA breach ({}h).",
            self.policy.sla.num_hours()
        );

        self.db.with_tx(|conn| {
            let Some(mut complaint) = queries::find_complaint(conn, id)? else {
                return Ok(None);
            };
            if !ComplaintStatus::AWAITING_TRIAGE.contains(&complaint.status) {
                return Ok(None);
            }

            complaint.status = ComplaintStatus::Escalated;
            complaint.priority = Priority::Critical;
            complaint.updated_at = now;
            queries::update_complaint(conn, &complaint)?;
            timeline::append(
                conn,
                complaint.id,
                TimelineEvent::status(ComplaintStatus::Escalated, comment),
                now,
            )?;
            Ok(Some(complaint))
        })
    }

    fn announce(&self, complaint: &Complaint) {
        if let Some(recipient) = contact_for(&self.db, complaint) {
            self.notifier.dispatch(
                &recipient,
                Message::new(
                    NotificationKind::Escalation,
                    "Complaint Escalated",
                    format!(
                        "Your complaint #{} has been escalated to senior management for priority resolution.",
                        complaint.id
                    ),
                )
                .about(complaint.id),
            );
        }

        if let Some(assignee_id) = complaint.assigned_to {
            match self.db.get_user_by_id(assignee_id) {
                Ok(Some(assignee)) => {
                    self.notifier.dispatch(
                        &assignee.email,
                        Message::new(
                            NotificationKind::Escalation,
                            "Complaint Escalated - Urgency Critical",
                            format!(
                                "A complaint assigned to you (#{}) has been escalated due to SLA breach.",
                                complaint.id
                            ),
                        )
                        .about(complaint.id),
                    );
                }
                Ok(None) => warn!("Assignee {} of complaint {} no longer exists", assignee_id, complaint.id),
                Err(e) => warn!("Assignee lookup for complaint {} failed: {}", complaint.id, e),
            }
        }

        self.notifier.dispatch(
            &self.policy.senior_admin_email,
            Message::new(
                NotificationKind::Escalation,
                format!("Urgent: ESCALATION #{}", complaint.id),
                format!(
                    "A complaint has breached the {}h SLA and requires immediate attention.",
                    self.policy.sla.num_hours()
                ),
            )
            .about(complaint.id),
        );
    }
}

/// Background task that runs [`Escalator::sweep`] on a fixed interval.
///
/// The first sweep runs immediately. A slow sweep delays the next tick rather
/// than stacking runs on top of each other.
pub async fn run_escalation_loop(escalator: Arc<Escalator>, every: StdDuration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let esc = escalator.clone();
        match tokio::task::spawn_blocking(move || esc.sweep()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Escalation sweep error: {}", e),
            Err(e) => error!("Escalation sweep task panicked: {}", e),
        }
    }
}
