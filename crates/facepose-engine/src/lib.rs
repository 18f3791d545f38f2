//! facepose-engine — frame pipeline around the pose-guidance core.
//!
//! Runs detection, pose sequencing and matching on a dedicated thread and
//! exposes it through a cloneable async handle.

pub mod config;
pub mod engine;
pub mod events;

pub use config::{Config, ConfigError};
pub use engine::{spawn_engine, EngineError, EngineHandle, EngineStatus, Mode};
pub use events::{EngineEvent, FrameOutcome, UiState};
