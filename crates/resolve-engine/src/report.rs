use std::collections::{BTreeMap, HashMap};

use chrono::SecondsFormat;
use csv::QuoteStyle;
use uuid::Uuid;

use resolve_types::api::{ComplaintQuery, Statistics};
use resolve_types::models::{ComplaintStatus, User};

use crate::error::Result;
use crate::lifecycle::Engine;

pub const CSV_HEADER: &str = "ID,Title,Category,Status,Priority,CreatedAt,ResolvedAt,User,AssignedTo";

impl Engine {
    pub fn statistics(&self) -> Result<Statistics> {
        let mut open = 0;
        for status in ComplaintStatus::OPEN {
            open += self.db.count_complaints_by_status(*status)?;
        }

        Ok(Statistics {
            total: self.db.count_complaints()?,
            open,
            resolved: self.db.count_complaints_by_status(ComplaintStatus::Resolved)?,
            closed: self.db.count_complaints_by_status(ComplaintStatus::Closed)?,
            categories: self
                .db
                .count_complaints_by_category()?
                .into_iter()
                .collect::<BTreeMap<_, _>>(),
        })
    }

    /// Every complaint as CSV, newest first. The header line is fixed; every
    /// data field is quoted.
    pub fn export_csv(&self) -> Result<String> {
        let complaints = self.db.list_complaints(&ComplaintQuery::default())?;
        let users: HashMap<Uuid, User> = self
            .db
            .list_users()?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut buf = Vec::with_capacity(CSV_HEADER.len() + 1 + complaints.len() * 160);
        buf.extend_from_slice(CSV_HEADER.as_bytes());
        buf.push(b'\n');

        let mut writer = csv::WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(buf);

        for c in &complaints {
            let owner = match c.user_id.and_then(|id| users.get(&id)) {
                Some(user) => user.email.as_str(),
                None if c.is_anonymous => "Anonymous",
                None => "",
            };
            let assignee = c
                .assigned_to
                .and_then(|id| users.get(&id))
                .map(|u| u.full_name.as_str())
                .unwrap_or("");

            let id = c.id.to_string();
            let created_at = c.created_at.to_rfc3339_opts(SecondsFormat::Secs, true);
            let resolved_at = c
                .resolved_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default();

            writer
                .write_record([
                    id.as_str(),
                    c.title.as_str(),
                    c.category.as_str(),
                    c.status.as_str(),
                    c.priority.as_str(),
                    created_at.as_str(),
                    resolved_at.as_str(),
                    owner,
                    assignee,
                ])
                .map_err(anyhow::Error::from)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV export: {}", e.error()))?;
        Ok(String::from_utf8(bytes).map_err(anyhow::Error::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use resolve_types::models::Role;

    fn read_rows(csv: &str) -> Vec<csv::StringRecord> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(csv.as_bytes());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(headers.join(","), CSV_HEADER);
        reader.records().collect::<std::result::Result<_, _>>().unwrap()
    }

    #[test]
    fn test_statistics_counts() {
        let h = Harness::new();
        h.user("admin@example.com", Role::Admin);
        let tech = h.user("tech@example.com", Role::Admin);

        let statuses = [
            ComplaintStatus::New,
            ComplaintStatus::New,
            ComplaintStatus::InProgress,
            ComplaintStatus::UnderReview,
            ComplaintStatus::Resolved,
            ComplaintStatus::Closed,
            ComplaintStatus::Closed,
            ComplaintStatus::Escalated,
        ];
        for (i, status) in statuses.iter().enumerate() {
            let mut new = h.new_complaint(None);
            new.status = Some(*status);
            new.category = if i % 2 == 0 { "Hostel".into() } else { "Library".into() };
            h.engine.submit(new, None).unwrap();
        }
        // Assignment moves NEW to IN_PROGRESS; still open.
        let c = h.anonymous_complaint(None);
        h.engine.assign(c.id, tech.id).unwrap();

        let stats = h.engine.statistics().unwrap();
        assert_eq!(stats.total, 9);
        assert_eq!(stats.open, 5);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.closed, 2);
        assert_eq!(stats.categories.get("Hostel"), Some(&5));
        assert_eq!(stats.categories.get("Library"), Some(&4));
    }

    #[test]
    fn test_export_escapes_title_quotes() {
        let h = Harness::new();
        let mut new = h.new_complaint(None);
        new.title = r#"Fan says "click", then stops"#.into();
        let c = h.engine.submit(new, None).unwrap();

        let csv = h.engine.export_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));

        let row = lines.next().unwrap();
        assert!(row.contains(r#""Fan says ""click"", then stops""#));

        let rows = read_rows(&csv);
        assert_eq!(rows.len(), 1);
        let fields = &rows[0];
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[0], c.id.to_string());
        assert_eq!(&fields[1], r#"Fan says "click", then stops"#);
        assert_eq!(&fields[7], "Anonymous");
    }

    #[test]
    fn test_export_user_and_assignee_columns() {
        let h = Harness::new();
        let owner = h.user("student@example.com", Role::User);
        let tech = h.user("tech@example.com", Role::Admin);
        h.user("admin@example.com", Role::Admin);

        let owned = h.engine.submit(h.new_complaint(Some(owner.id)), None).unwrap();
        h.engine.assign(owned.id, tech.id).unwrap();
        h.engine.resolve(owned.id, None, "admin@example.com").unwrap();

        let mut unowned = h.new_complaint(None);
        unowned.is_anonymous = false;
        h.engine.submit(unowned, None).unwrap();

        let csv = h.engine.export_csv().unwrap();
        let rows = read_rows(&csv);
        assert_eq!(rows.len(), 2);

        let owned_row = rows.iter().find(|r| r[0] == owned.id.to_string()).unwrap();
        assert_eq!(owned_row.len(), 9);
        assert_eq!(&owned_row[3], "RESOLVED");
        assert!(!owned_row[6].is_empty());
        assert_eq!(&owned_row[7], "student@example.com");
        assert_eq!(&owned_row[8], "Tech Example");

        let other_row = rows.iter().find(|r| r[0] != owned.id.to_string()).unwrap();
        assert_eq!(&other_row[6], "");
        assert_eq!(&other_row[7], "");
        assert_eq!(&other_row[8], "");
    }
}
