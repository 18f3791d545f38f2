use facepose_core::Identity;
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of the change-notification channel. Slow subscribers see
/// `RecvError::Lagged` and should reload.
pub(crate) const EVENT_CAPACITY: usize = 32;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity {0} has no embeddings")]
    EmptyIdentity(String),
    #[error("identity {0} already exists")]
    DuplicateId(String),
    #[error("stored embedding for identity {id} is corrupt ({len} bytes)")]
    CorruptEmbedding { id: String, len: usize },
}

/// Change notification published after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEvent {
    Inserted { id: String },
    Deleted { id: String },
}

/// Persistence of enrolled identities.
///
/// Identities are written and deleted whole; their embeddings are never
/// edited in place.
pub trait GalleryStore {
    /// Every identity with its embeddings, oldest first.
    fn load_all(&self) -> Result<Vec<Identity>, StoreError>;

    /// Add a new identity. Rejects identities without embeddings.
    fn insert(&mut self, identity: &Identity) -> Result<(), StoreError>;

    /// Remove an identity and its embeddings. Returns `false` if the id is unknown.
    fn delete(&mut self, id: &str) -> Result<bool, StoreError>;

    /// Live change notifications.
    fn subscribe(&self) -> broadcast::Receiver<GalleryEvent>;
}

pub(crate) fn ensure_not_empty(identity: &Identity) -> Result<(), StoreError> {
    if identity.embeddings.is_empty() {
        return Err(StoreError::EmptyIdentity(identity.id.clone()));
    }
    Ok(())
}

/// Publish to whoever is listening; having no subscribers is fine.
pub(crate) fn notify(events: &broadcast::Sender<GalleryEvent>, event: GalleryEvent) {
    let _ = events.send(event);
}
