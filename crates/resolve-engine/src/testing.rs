use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use resolve_db::Database;
use resolve_types::models::{Complaint, NewComplaint, Role, User};

use crate::clock::ManualClock;
use crate::files::{FileStore, StoredFile, Upload};
use crate::lifecycle::Engine;
use crate::notify::{Notifier, Outbound};
use crate::sweeper::{EscalationPolicy, Escalator};

/// Records what would have gone out, keyed by (recipient, title).
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
    fail_next: AtomicBool,
}

impl Outbox {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Outbound for Outbox {
    fn send(&self, recipient: &str, title: &str, _body: &str) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            bail!("provider unavailable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), title.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn contains(&self, reference: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(reference)
    }
}

impl FileStore for MemoryStore {
    fn store(&self, upload: &Upload) -> Result<StoredFile> {
        let reference = Uuid::new_v4().to_string();
        self.blobs
            .lock()
            .unwrap()
            .insert(reference.clone(), upload.bytes.clone());
        Ok(StoredFile {
            reference,
            size: upload.bytes.len() as u64,
            sha256: "0".repeat(64),
        })
    }

    fn remove(&self, reference: &str) -> Result<()> {
        self.blobs.lock().unwrap().remove(reference);
        Ok(())
    }
}

pub struct Harness {
    pub db: Arc<Database>,
    pub clock: Arc<ManualClock>,
    pub outbox: Arc<Outbox>,
    pub files: Arc<MemoryStore>,
    pub engine: Engine,
    pub notifier: Notifier,
    pub escalator: Escalator,
}

impl Harness {
    pub fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap(),
        ));
        let outbox = Arc::new(Outbox::default());
        let files = Arc::new(MemoryStore::default());

        let engine = Engine::new(db.clone(), files.clone(), outbox.clone(), clock.clone());
        let notifier = engine.notifier().clone();
        let escalator = engine.escalator(EscalationPolicy::default());

        Self {
            db,
            clock,
            outbox,
            files,
            engine,
            notifier,
            escalator,
        }
    }

    /// Registers a user whose full name is derived from the email, e.g.
    /// `tech@example.com` becomes "Tech Example".
    pub fn user(&self, email: &str, role: Role) -> User {
        let local = email.split('@').next().unwrap_or(email);
        let mut chars = local.chars();
        let first = chars.next().map(|c| c.to_ascii_uppercase()).unwrap_or('X');
        let user = User {
            id: Uuid::new_v4(),
            full_name: format!("{}{} Example", first, chars.as_str()),
            email: email.to_string(),
            role,
            created_at: Utc::now(),
        };
        self.db.create_user(&user, "not-a-real-hash").unwrap();
        user
    }

    pub fn new_complaint(&self, owner: Option<Uuid>) -> NewComplaint {
        NewComplaint {
            user_id: owner,
            category: "Hostel".into(),
            title: "Water leak in room 214".into(),
            description: "Ceiling drips whenever it rains".into(),
            priority: None,
            status: None,
            is_anonymous: owner.is_none(),
            anonymous_email: None,
        }
    }

    pub fn anonymous_complaint(&self, contact: Option<&str>) -> Complaint {
        let mut new = self.new_complaint(None);
        new.anonymous_email = contact.map(str::to_string);
        self.engine.submit(new, None).unwrap()
    }
}
