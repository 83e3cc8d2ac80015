use anyhow::{Result, bail};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

/// 20 MB cap on a single piece of evidence.
pub const MAX_ATTACHMENT_SIZE: usize = 20 * 1024 * 1024;

/// A file received alongside a complaint.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub reference: String,
    pub size: u64,
    pub sha256: String,
}

/// Blob storage for complaint evidence. Calls are blocking.
pub trait FileStore: Send + Sync {
    fn store(&self, upload: &Upload) -> Result<StoredFile>;

    /// Remove a stored blob. Missing blobs are not an error.
    fn remove(&self, reference: &str) -> Result<()>;
}

/// Stores each upload as a flat file named `{uuid}` inside `dir`.
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        info!("Attachment storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, reference: &str) -> Result<PathBuf> {
        // References are always UUIDs we minted; reject anything else so a
        // stored row can never point outside the storage directory.
        reference
            .parse::<Uuid>()
            .map_err(|_| anyhow::anyhow!("Invalid storage reference '{}'", reference))?;
        Ok(self.dir.join(reference))
    }
}

impl FileStore for DiskStore {
    fn store(&self, upload: &Upload) -> Result<StoredFile> {
        if upload.bytes.is_empty() {
            bail!("Empty upload '{}'", upload.file_name);
        }
        if upload.bytes.len() > MAX_ATTACHMENT_SIZE {
            bail!(
                "Upload '{}' is {} bytes, limit is {}",
                upload.file_name,
                upload.bytes.len(),
                MAX_ATTACHMENT_SIZE
            );
        }

        let reference = Uuid::new_v4().to_string();
        let path = self.path_for(&reference)?;
        fs::write(&path, &upload.bytes)?;

        let mut hasher = Sha256::new();
        hasher.update(&upload.bytes);

        Ok(StoredFile {
            reference,
            size: upload.bytes.len() as u64,
            sha256: hex::encode(hasher.finalize()),
        })
    }

    fn remove(&self, reference: &str) -> Result<()> {
        let path = self.path_for(reference)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted attachment {}", reference);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Attachment {} already gone", reference);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
