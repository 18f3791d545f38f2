//! Typed events emitted by the engine and the UI-side reducer that folds them.

use facepose_core::{Direction, EnrollPhase, MatchResult, SequencerEvent};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Classified direction for an enrollment frame.
    Direction { sequence: u64, direction: Direction },
    Sequencer { sequence: u64, event: SequencerEvent },
    PhaseChanged { phase: EnrollPhase },
    /// New verification result list; replaces the previous one.
    Matches { sequence: u64, matches: Vec<MatchResult> },
    /// A frame arrived while another was in flight and was discarded.
    FrameDropped { sequence: u64 },
    IdentitySaved { id: String },
}

/// What happened to one processed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameOutcome {
    pub sequence: u64,
    /// `false` when no usable face was found and the frame was skipped.
    pub face_found: bool,
    pub direction: Option<Direction>,
    pub sequencer: Option<SequencerEvent>,
    pub matches: Option<Vec<MatchResult>>,
}

/// Presentation state rebuilt from the event stream on the UI thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UiState {
    pub direction: Option<Direction>,
    pub phase: Option<EnrollPhase>,
    /// Step index and streak of the last counted frame.
    pub streak: Option<(usize, u32)>,
    pub captures: usize,
    pub matches: Vec<MatchResult>,
    pub match_updates: u64,
    pub dropped_frames: u64,
    pub saved_identity: Option<String>,
}

impl UiState {
    pub fn apply(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::Direction { direction, .. } => self.direction = Some(*direction),
            EngineEvent::Sequencer { event, .. } => match *event {
                SequencerEvent::Reset => {
                    self.captures = 0;
                    self.streak = None;
                }
                SequencerEvent::Counted { index, match_count } => {
                    self.streak = Some((index, match_count));
                }
                SequencerEvent::StreakBroken { index } => self.streak = Some((index, 0)),
                SequencerEvent::Capture { .. } => {
                    self.captures += 1;
                    self.streak = None;
                }
                SequencerEvent::Finished | SequencerEvent::Idle => {}
            },
            EngineEvent::PhaseChanged { phase } => {
                if *phase == EnrollPhase::Camera {
                    self.captures = 0;
                    self.streak = None;
                }
                self.phase = Some(*phase);
            }
            EngineEvent::Matches { matches, .. } => {
                self.matches = matches.clone();
                self.match_updates += 1;
            }
            EngineEvent::FrameDropped { .. } => self.dropped_frames += 1,
            EngineEvent::IdentitySaved { id } => self.saved_identity = Some(id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(event: SequencerEvent) -> EngineEvent {
        EngineEvent::Sequencer { sequence: 0, event }
    }

    #[test]
    fn test_reducer_tracks_captures_and_reset() {
        let mut ui = UiState::default();
        ui.apply(&seq(SequencerEvent::Counted { index: 0, match_count: 1 }));
        assert_eq!(ui.streak, Some((0, 1)));
        ui.apply(&seq(SequencerEvent::Capture { index: 0, completed: false }));
        ui.apply(&seq(SequencerEvent::Capture { index: 1, completed: false }));
        assert_eq!(ui.captures, 2);
        ui.apply(&seq(SequencerEvent::Reset));
        assert_eq!(ui.captures, 0);
        assert_eq!(ui.streak, None);
    }

    #[test]
    fn test_reducer_matches_and_drops() {
        let mut ui = UiState::default();
        let m = MatchResult {
            identity_id: "1".into(),
            identity_name: "alice".into(),
            score: 0.9,
        };
        ui.apply(&EngineEvent::Matches { sequence: 1, matches: vec![m.clone()] });
        ui.apply(&EngineEvent::FrameDropped { sequence: 2 });
        assert_eq!(ui.matches, vec![m]);
        assert_eq!(ui.match_updates, 1);
        assert_eq!(ui.dropped_frames, 1);
    }

    #[test]
    fn test_reducer_phase_and_direction() {
        let mut ui = UiState::default();
        ui.apply(&EngineEvent::Direction { sequence: 0, direction: Direction::Left });
        ui.apply(&EngineEvent::PhaseChanged { phase: EnrollPhase::Review });
        ui.apply(&EngineEvent::IdentitySaved { id: "abc".into() });
        assert_eq!(ui.direction, Some(Direction::Left));
        assert_eq!(ui.phase, Some(EnrollPhase::Review));
        assert_eq!(ui.saved_identity.as_deref(), Some("abc"));
    }
}
