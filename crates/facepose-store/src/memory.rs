use crate::gallery::{
    ensure_not_empty, notify, GalleryEvent, GalleryStore, StoreError, EVENT_CAPACITY,
};
use facepose_core::Identity;
use tokio::sync::broadcast;

/// In-process gallery, kept in insertion order.
pub struct MemoryGallery {
    identities: Vec<Identity>,
    events: broadcast::Sender<GalleryEvent>,
}

impl MemoryGallery {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            identities: Vec::new(),
            events,
        }
    }
}

impl Default for MemoryGallery {
    fn default() -> Self {
        Self::new()
    }
}

impl GalleryStore for MemoryGallery {
    fn load_all(&self) -> Result<Vec<Identity>, StoreError> {
        Ok(self.identities.clone())
    }

    fn insert(&mut self, identity: &Identity) -> Result<(), StoreError> {
        ensure_not_empty(identity)?;
        if self.identities.iter().any(|i| i.id == identity.id) {
            return Err(StoreError::DuplicateId(identity.id.clone()));
        }
        self.identities.push(identity.clone());
        notify(&self.events, GalleryEvent::Inserted { id: identity.id.clone() });
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.identities.len();
        self.identities.retain(|i| i.id != id);
        let removed = self.identities.len() != before;
        if removed {
            notify(&self.events, GalleryEvent::Deleted { id: id.to_string() });
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<GalleryEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facepose_core::Embedding;

    #[test]
    fn test_insert_load_delete() {
        let mut g = MemoryGallery::new();
        let mut rx = g.subscribe();

        let identity = Identity::new("alice", vec![Embedding::new(vec![1.0, 2.0])]);
        g.insert(&identity).unwrap();
        assert_eq!(g.load_all().unwrap(), vec![identity.clone()]);
        assert_eq!(rx.try_recv().unwrap(), GalleryEvent::Inserted { id: identity.id.clone() });

        assert!(g.delete(&identity.id).unwrap());
        assert!(!g.delete(&identity.id).unwrap());
        assert!(g.load_all().unwrap().is_empty());
        assert_eq!(rx.try_recv().unwrap(), GalleryEvent::Deleted { id: identity.id });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rejects_empty_and_duplicate() {
        let mut g = MemoryGallery::new();
        let empty = Identity::new("nobody", vec![]);
        assert!(matches!(g.insert(&empty), Err(StoreError::EmptyIdentity(_))));

        let identity = Identity::new("bob", vec![Embedding::new(vec![1.0])]);
        g.insert(&identity).unwrap();
        assert!(matches!(g.insert(&identity), Err(StoreError::DuplicateId(_))));
    }
}
