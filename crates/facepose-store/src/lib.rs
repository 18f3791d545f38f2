//! facepose-store — Gallery of enrolled identities.
//!
//! The core only needs a snapshot read for verification and an append when
//! enrollment completes. [`SqliteGallery`] persists to disk; [`MemoryGallery`]
//! keeps everything in process.

pub mod gallery;
pub mod memory;
pub mod sqlite;

pub use gallery::{GalleryEvent, GalleryStore, StoreError};
pub use memory::MemoryGallery;
pub use sqlite::SqliteGallery;
