//! facepose-core — Pose-guided face enrollment and verification logic.
//!
//! Maps detector output into preview space, classifies head direction
//! against a target circle, sequences pose captures, and matches embeddings
//! against enrolled identities. Detection and embedding models are external
//! collaborators behind the traits in [`detector`].

pub mod classifier;
pub mod detector;
pub mod enrollment;
pub mod frame;
pub mod matcher;
pub mod projector;
pub mod sequencer;
pub mod types;
pub mod verification;

pub use classifier::{PoseThresholds, TargetRegion};
pub use detector::{Embedder, FaceDetector};
pub use enrollment::{EnrollPhase, EnrollmentSession};
pub use frame::Frame;
pub use matcher::{BestOfMatcher, Matcher};
pub use sequencer::{CaptureSequencer, PoseRequirement, PoseScript, SequencerEvent};
pub use types::{
    BoundingBox, Detection, Direction, Embedding, FaceGeometry, Identity, MatchResult, Point2D,
    Size2D,
};
pub use verification::VerificationSession;
