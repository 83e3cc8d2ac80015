use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored or submitted label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! labelled_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

// -- Complaints --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    #[default]
    New,
    UnderReview,
    InProgress,
    Resolved,
    Closed,
    Escalated,
}

labelled_enum!(ComplaintStatus, "status", {
    New => "NEW",
    UnderReview => "UNDER_REVIEW",
    InProgress => "IN_PROGRESS",
    Resolved => "RESOLVED",
    Closed => "CLOSED",
    Escalated => "ESCALATED",
});

impl ComplaintStatus {
    /// Statuses counted as "open" in statistics.
    pub const OPEN: &'static [ComplaintStatus] = &[
        ComplaintStatus::New,
        ComplaintStatus::InProgress,
        ComplaintStatus::UnderReview,
    ];

    /// Statuses that still count against the escalation SLA.
    pub const AWAITING_TRIAGE: &'static [ComplaintStatus] =
        &[ComplaintStatus::New, ComplaintStatus::UnderReview];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

labelled_enum!(Priority, "priority", {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub category: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: ComplaintStatus,
    pub is_anonymous: bool,
    pub anonymous_email: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Fields supplied by a caller when filing a complaint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComplaint {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub category: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub anonymous_email: Option<String>,
}

/// Full replacement of the editable complaint fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintChanges {
    pub category: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: ComplaintStatus,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub anonymous_email: Option<String>,
}

// -- Timeline --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: Uuid,
    pub complaint_id: Uuid,
    /// Event label. Usually a status name, but also events like "REOPENED".
    pub status: String,
    pub comment: String,
    pub is_public: bool,
    pub updated_by: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    StatusUpdate,
    Escalation,
    Assignment,
    Resolution,
    Comment,
}

labelled_enum!(NotificationKind, "notification type", {
    StatusUpdate => "STATUS_UPDATE",
    Escalation => "ESCALATION",
    Assignment => "ASSIGNMENT",
    Resolution => "RESOLUTION",
    Comment => "COMMENT",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub complaint_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// -- Users --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
    SeniorAdmin,
}

labelled_enum!(Role, "role", {
    User => "USER",
    Admin => "ADMIN",
    SeniorAdmin => "SENIOR_ADMIN",
});

impl Role {
    /// Case-insensitive parse used at registration. Anything unrecognised
    /// falls back to a plain user.
    pub fn parse_lenient(raw: Option<&str>) -> Role {
        raw.and_then(|r| r.trim().to_ascii_uppercase().parse().ok())
            .unwrap_or_default()
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::User)
    }
}

/// A user as seen by the rest of the system. The password hash never leaves
/// the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// -- Attachments --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Uuid,
    pub complaint_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_type: Option<String>,
    pub file_size: u64,
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}
