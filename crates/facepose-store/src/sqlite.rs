//! SQLite-backed gallery.
//!
//! Schema: one row per identity, one row per embedding. Vectors are stored as
//! little-endian `f32` blobs and read back in capture order.

use crate::gallery::{
    ensure_not_empty, notify, GalleryEvent, GalleryStore, StoreError, EVENT_CAPACITY,
};
use facepose_core::{Embedding, Identity};
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use tokio::sync::broadcast;

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS identities (
        id      TEXT PRIMARY KEY,
        name    TEXT NOT NULL,
        created TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS embeddings (
        identity_id   TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
        ordinal       INTEGER NOT NULL,
        model_version TEXT,
        vector        BLOB NOT NULL,
        PRIMARY KEY (identity_id, ordinal)
    );
";

pub struct SqliteGallery {
    conn: Connection,
    events: broadcast::Sender<GalleryEvent>,
}

impl SqliteGallery {
    /// Open (or create) the gallery database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "gallery database opened");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self { conn, events })
    }
}

impl GalleryStore for SqliteGallery {
    fn load_all(&self) -> Result<Vec<Identity>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created FROM identities ORDER BY created, id")?;
        let mut identities = stmt
            .query_map([], |row| {
                Ok(Identity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created: row.get(2)?,
                    embeddings: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT model_version, vector FROM embeddings WHERE identity_id = ?1 ORDER BY ordinal",
        )?;
        for identity in &mut identities {
            let rows = stmt
                .query_map(params![identity.id], |row| {
                    Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            for (model_version, blob) in rows {
                let values = decode_vector(&blob).ok_or_else(|| StoreError::CorruptEmbedding {
                    id: identity.id.clone(),
                    len: blob.len(),
                })?;
                identity.embeddings.push(Embedding {
                    values,
                    model_version,
                });
            }
        }

        tracing::debug!(count = identities.len(), "gallery loaded");
        Ok(identities)
    }

    fn insert(&mut self, identity: &Identity) -> Result<(), StoreError> {
        ensure_not_empty(identity)?;

        let tx = self.conn.transaction()?;
        match tx.execute(
            "INSERT INTO identities (id, name, created) VALUES (?1, ?2, ?3)",
            params![identity.id, identity.name, identity.created],
        ) {
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicateId(identity.id.clone()));
            }
            other => {
                other?;
            }
        }

        for (ordinal, embedding) in identity.embeddings.iter().enumerate() {
            tx.execute(
                "INSERT INTO embeddings (identity_id, ordinal, model_version, vector)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    identity.id,
                    ordinal as i64,
                    embedding.model_version,
                    encode_vector(&embedding.values)
                ],
            )?;
        }
        tx.commit()?;

        tracing::info!(
            id = %identity.id,
            name = %identity.name,
            embeddings = identity.embeddings.len(),
            "identity stored"
        );
        notify(&self.events, GalleryEvent::Inserted { id: identity.id.clone() });
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM identities WHERE id = ?1", params![id])?
            > 0;
        if removed {
            tracing::info!(id, "identity deleted");
            notify(&self.events, GalleryEvent::Deleted { id: id.to_string() });
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<GalleryEvent> {
        self.events.subscribe()
    }
}

fn encode_vector(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
