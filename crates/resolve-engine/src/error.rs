use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("no user registered as {0}")]
    UnknownActor(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub fn complaint(id: Uuid) -> Self {
        EngineError::NotFound { kind: "complaint", id }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
