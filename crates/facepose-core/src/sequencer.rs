//! Capture sequencing over an ordered pose script.
//!
//! The sequencer consumes one classified [`Direction`] per frame and walks
//! through the script: each step needs its direction held for a number of
//! consecutive frames, after which a capture is requested and the next step
//! begins. Leaving the target region restarts the whole script; looking the
//! wrong way only loses the current step's streak.

use crate::types::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_FRAMES_PER_POSE: u32 = 20;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScriptError {
    #[error("pose script has no steps")]
    Empty,
    #[error("pose script step {0} asks for the outside-region direction")]
    OutsideStep(usize),
    #[error("pose script step {0} requires zero frames")]
    ZeroFrames(usize),
}

/// One step of the pose script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoseRequirement {
    pub direction: Direction,
    #[serde(rename = "frames")]
    pub required_frames: u32,
}

impl PoseRequirement {
    pub const fn new(direction: Direction, required_frames: u32) -> Self {
        Self {
            direction,
            required_frames,
        }
    }
}

/// Validated, immutable list of pose requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoseScript {
    steps: Vec<PoseRequirement>,
}

impl PoseScript {
    pub fn new(steps: Vec<PoseRequirement>) -> Result<Self, ScriptError> {
        if steps.is_empty() {
            return Err(ScriptError::Empty);
        }
        for (i, step) in steps.iter().enumerate() {
            if !step.direction.is_in_region() {
                return Err(ScriptError::OutsideStep(i));
            }
            if step.required_frames == 0 {
                return Err(ScriptError::ZeroFrames(i));
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[PoseRequirement] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for PoseScript {
    /// Forward, left, right, up, down; twenty frames each.
    fn default() -> Self {
        let steps = [
            Direction::Forward,
            Direction::Left,
            Direction::Right,
            Direction::Up,
            Direction::Down,
        ]
        .into_iter()
        .map(|d| PoseRequirement::new(d, DEFAULT_FRAMES_PER_POSE))
        .collect();
        Self { steps }
    }
}

/// Where the sequencer is in its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    Active { index: usize, match_count: u32 },
    Completed,
}

/// Outcome of feeding one direction into the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SequencerEvent {
    /// Face left the region; script restarted from the first step.
    Reset,
    /// Matching direction counted towards the current step.
    Counted { index: usize, match_count: u32 },
    /// Wrong direction; current step's streak dropped to zero.
    StreakBroken { index: usize },
    /// Step satisfied; the caller must capture the current frame.
    Capture { index: usize, completed: bool },
    /// First in-region frame after completion. Emitted exactly once.
    Finished,
    /// Nothing left to do.
    Idle,
}

/// Per-session state machine. Not thread-safe by itself: exactly one frame
/// stream may drive it.
#[derive(Debug, Clone)]
pub struct CaptureSequencer {
    script: PoseScript,
    state: SequencerState,
    finish_signalled: bool,
}

impl CaptureSequencer {
    pub fn new(script: PoseScript) -> Self {
        Self {
            script,
            state: SequencerState::Active {
                index: 0,
                match_count: 0,
            },
            finish_signalled: false,
        }
    }

    pub fn script(&self) -> &PoseScript {
        &self.script
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Requirement currently being collected, `None` once completed.
    pub fn current_requirement(&self) -> Option<&PoseRequirement> {
        match self.state {
            SequencerState::Active { index, .. } => self.script.steps.get(index),
            SequencerState::Completed => None,
        }
    }

    /// Fraction of the current step's streak, for the progress arc.
    pub fn progress(&self) -> Option<f32> {
        match self.state {
            SequencerState::Active { index, match_count } => {
                let required = self.script.steps[index].required_frames;
                Some(match_count as f32 / required as f32)
            }
            SequencerState::Completed => None,
        }
    }

    /// Back to the first step with an empty streak.
    pub fn restart(&mut self) {
        self.state = SequencerState::Active {
            index: 0,
            match_count: 0,
        };
        self.finish_signalled = false;
    }

    pub fn observe(&mut self, direction: Direction) -> SequencerEvent {
        if direction == Direction::OutsideTargetRegion {
            self.restart();
            return SequencerEvent::Reset;
        }

        let (index, match_count) = match self.state {
            SequencerState::Completed => {
                if self.finish_signalled {
                    return SequencerEvent::Idle;
                }
                self.finish_signalled = true;
                return SequencerEvent::Finished;
            }
            SequencerState::Active { index, match_count } => (index, match_count),
        };

        let requirement = self.script.steps[index];
        if direction != requirement.direction {
            self.state = SequencerState::Active {
                index,
                match_count: 0,
            };
            return SequencerEvent::StreakBroken { index };
        }

        if match_count + 1 >= requirement.required_frames {
            let completed = index + 1 == self.script.len();
            self.state = if completed {
                SequencerState::Completed
            } else {
                SequencerState::Active {
                    index: index + 1,
                    match_count: 0,
                }
            };
            tracing::debug!(index, completed, direction = %direction, "pose step captured");
            SequencerEvent::Capture { index, completed }
        } else {
            let match_count = match_count + 1;
            self.state = SequencerState::Active { index, match_count };
            SequencerEvent::Counted { index, match_count }
        }
    }
}
