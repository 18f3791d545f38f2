//! Enrollment session: the reducer behind the add-face screen.

use crate::frame::Frame;
use crate::sequencer::{CaptureSequencer, PoseScript, SequencerEvent};
use crate::types::{Direction, Embedding, Identity};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollPhase {
    /// Following the pose script.
    Camera,
    /// Script done; captures are shown for approval.
    Review,
    /// Identity handed to the gallery store.
    Saving,
    Saved,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnrollmentError {
    #[error("enrollment is in phase {actual:?}, expected {expected:?}")]
    WrongPhase {
        expected: EnrollPhase,
        actual: EnrollPhase,
    },
    #[error("identity name is blank")]
    BlankName,
    #[error("no usable embedding was captured")]
    NoEmbeddings,
    #[error("pose script has no step {0}")]
    UnknownStep(usize),
}

/// One captured pose.
#[derive(Debug, Clone)]
pub struct CapturedPose {
    pub direction: Direction,
    pub crop: Frame,
    /// `None` when the embedder had no vector for this crop.
    pub embedding: Option<Embedding>,
}

#[derive(Debug, Clone)]
pub struct EnrollmentSession {
    sequencer: CaptureSequencer,
    phase: EnrollPhase,
    captures: Vec<CapturedPose>,
}

impl EnrollmentSession {
    pub fn new(script: PoseScript) -> Self {
        Self {
            sequencer: CaptureSequencer::new(script),
            phase: EnrollPhase::Camera,
            captures: Vec::new(),
        }
    }

    pub fn phase(&self) -> EnrollPhase {
        self.phase
    }

    pub fn sequencer(&self) -> &CaptureSequencer {
        &self.sequencer
    }

    pub fn captures(&self) -> &[CapturedPose] {
        &self.captures
    }

    /// Instruction for the pose currently requested.
    pub fn prompt(&self) -> Option<&'static str> {
        self.sequencer
            .current_requirement()
            .map(|r| r.direction.prompt())
    }

    /// Feed one classified frame.
    ///
    /// Only the camera phase reacts. Leaving the region also discards every
    /// capture taken so far; the finish signal moves the session to review.
    pub fn observe(&mut self, direction: Direction) -> SequencerEvent {
        if self.phase != EnrollPhase::Camera {
            return SequencerEvent::Idle;
        }

        let event = self.sequencer.observe(direction);
        match event {
            SequencerEvent::Reset => {
                if !self.captures.is_empty() {
                    tracing::debug!(
                        discarded = self.captures.len(),
                        "face left region, captures cleared"
                    );
                }
                self.captures.clear();
            }
            SequencerEvent::Finished => {
                tracing::info!(
                    captures = self.captures.len(),
                    "pose script finished, moving to review"
                );
                self.phase = EnrollPhase::Review;
            }
            _ => {}
        }
        event
    }

    /// Store the crop that fulfils a `Capture` event for script step `index`.
    /// An index outside the script is rejected and nothing is stored.
    pub fn record_capture(
        &mut self,
        index: usize,
        crop: Frame,
        embedding: Option<Embedding>,
    ) -> Result<(), EnrollmentError> {
        let direction = self
            .sequencer
            .script()
            .steps()
            .get(index)
            .map(|r| r.direction)
            .ok_or(EnrollmentError::UnknownStep(index))?;
        self.captures.push(CapturedPose {
            direction,
            crop,
            embedding,
        });
        Ok(())
    }

    /// Reject the captures and run the script again.
    pub fn back(&mut self) -> Result<(), EnrollmentError> {
        self.expect_phase(EnrollPhase::Review)?;
        self.captures.clear();
        self.sequencer.restart();
        self.phase = EnrollPhase::Camera;
        Ok(())
    }

    /// Approve the captures under `name` and build the identity to store.
    pub fn accept(&mut self, name: &str) -> Result<Identity, EnrollmentError> {
        self.expect_phase(EnrollPhase::Review)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(EnrollmentError::BlankName);
        }

        let embeddings: Vec<Embedding> = self
            .captures
            .iter()
            .filter_map(|c| c.embedding.clone())
            .collect();
        if embeddings.is_empty() {
            return Err(EnrollmentError::NoEmbeddings);
        }

        self.phase = EnrollPhase::Saving;
        Ok(Identity::new(name, embeddings))
    }

    /// The store accepted the identity.
    pub fn mark_saved(&mut self) -> Result<(), EnrollmentError> {
        self.expect_phase(EnrollPhase::Saving)?;
        self.phase = EnrollPhase::Saved;
        Ok(())
    }

    /// The store rejected the identity; return to review so the user can retry.
    pub fn save_failed(&mut self) -> Result<(), EnrollmentError> {
        self.expect_phase(EnrollPhase::Saving)?;
        self.phase = EnrollPhase::Review;
        Ok(())
    }

    fn expect_phase(&self, expected: EnrollPhase) -> Result<(), EnrollmentError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(EnrollmentError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }
}
