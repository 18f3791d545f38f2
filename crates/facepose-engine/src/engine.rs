//! Frame engine: one worker thread owns the detector, embedder, gallery store
//! and the active session.
//!
//! Frames pass through a single-permit gate. [`EngineHandle::submit_frame`]
//! drops a frame outright if another one is still being processed, so a slow
//! model never builds up a backlog; [`EngineHandle::process_frame`] waits for
//! the gate instead and is meant for paced replay.

use crate::config::Config;
use crate::events::{EngineEvent, FrameOutcome};
use facepose_core::detector::select_face;
use facepose_core::enrollment::EnrollmentError;
use facepose_core::projector::project_detection;
use facepose_core::{
    Embedder, Embedding, EnrollPhase, EnrollmentSession, FaceDetector, Frame, Identity,
    MatchResult, SequencerEvent, Size2D, TargetRegion, VerificationSession,
};
use facepose_store::{GalleryStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, OwnedSemaphorePermit, Semaphore};

const REQUEST_CAPACITY: usize = 8;
const EVENT_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("gallery store error: {0}")]
    Store(#[from] StoreError),
    #[error("enrollment error: {0}")]
    Enrollment(#[from] EnrollmentError),
    #[error("no enrollment session is active")]
    NotEnrolling,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Which session the engine is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Idle,
    Enrolling,
    Verifying,
}

/// Point-in-time view of the engine, for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub mode: Mode,
    pub phase: Option<EnrollPhase>,
    pub prompt: Option<&'static str>,
    pub progress: Option<f32>,
    pub captures: usize,
    pub matches: Vec<MatchResult>,
    /// Identities in the verification snapshot.
    pub gallery_size: Option<usize>,
    pub threshold: f32,
}

enum Session {
    Idle,
    Enrolling(EnrollmentSession),
    Verifying(VerificationSession),
}

/// Messages sent from handles to the engine thread.
enum EngineRequest {
    Frame {
        frame: Frame,
        preview: Size2D,
        permit: OwnedSemaphorePermit,
        reply: Option<oneshot::Sender<FrameOutcome>>,
    },
    StartEnrollment {
        reply: oneshot::Sender<()>,
    },
    StartVerification {
        reply: oneshot::Sender<Result<usize, EngineError>>,
    },
    SetThreshold {
        threshold: f32,
        reply: oneshot::Sender<f32>,
    },
    ReviewBack {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Accept {
        name: String,
        reply: oneshot::Sender<Result<String, EngineError>>,
    },
    List {
        reply: oneshot::Sender<Result<Vec<Identity>, EngineError>>,
    },
    Remove {
        id: String,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
    Shutdown,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    gate: Arc<Semaphore>,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineHandle {
    /// Subscribe to the engine's event stream.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Hand a live frame to the engine without waiting.
    ///
    /// Returns `false` and discards the frame if another frame is in flight.
    pub fn submit_frame(&self, frame: Frame, preview: Size2D) -> bool {
        let sequence = frame.sequence;
        let Ok(permit) = self.gate.clone().try_acquire_owned() else {
            tracing::trace!(sequence, "frame dropped, pipeline busy");
            let _ = self.events.send(EngineEvent::FrameDropped { sequence });
            return false;
        };

        let request = EngineRequest::Frame {
            frame,
            preview,
            permit,
            reply: None,
        };
        if self.tx.try_send(request).is_err() {
            tracing::debug!(sequence, "frame dropped, request queue unavailable");
            let _ = self.events.send(EngineEvent::FrameDropped { sequence });
            return false;
        }
        true
    }

    /// Process a frame, waiting for any in-flight frame to finish first.
    pub async fn process_frame(
        &self,
        frame: Frame,
        preview: Size2D,
    ) -> Result<FrameOutcome, EngineError> {
        let permit = self
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        self.request(|reply| EngineRequest::Frame {
            frame,
            preview,
            permit,
            reply: Some(reply),
        })
        .await
    }

    /// Begin a fresh enrollment, discarding any active session.
    pub async fn start_enrollment(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::StartEnrollment { reply }).await
    }

    /// Begin verification against a snapshot of the current gallery.
    /// Returns the number of identities in the snapshot.
    pub async fn start_verification(&self) -> Result<usize, EngineError> {
        self.request(|reply| EngineRequest::StartVerification { reply })
            .await?
    }

    /// Change the similarity threshold; returns the clamped value in effect.
    pub async fn set_threshold(&self, threshold: f32) -> Result<f32, EngineError> {
        self.request(|reply| EngineRequest::SetThreshold { threshold, reply })
            .await
    }

    /// Reject the reviewed captures and restart the pose script.
    pub async fn review_back(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::ReviewBack { reply }).await?
    }

    /// Approve the reviewed captures and store them under `name`.
    /// Returns the new identity id.
    pub async fn accept(&self, name: &str) -> Result<String, EngineError> {
        let name = name.to_string();
        self.request(|reply| EngineRequest::Accept { name, reply }).await?
    }

    pub async fn list(&self) -> Result<Vec<Identity>, EngineError> {
        self.request(|reply| EngineRequest::List { reply }).await?
    }

    pub async fn remove(&self, id: &str) -> Result<bool, EngineError> {
        let id = id.to_string();
        self.request(|reply| EngineRequest::Remove { id, reply }).await?
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| EngineRequest::Status { reply }).await
    }

    /// Ask the engine thread to exit after the requests already queued.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.tx
            .send(EngineRequest::Shutdown)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns every collaborator; handles only exchange messages with it.
pub fn spawn_engine(
    config: Config,
    detector: Box<dyn FaceDetector + Send>,
    embedder: Box<dyn Embedder + Send>,
    store: Box<dyn GalleryStore + Send>,
) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(REQUEST_CAPACITY);
    let (events, _) = broadcast::channel(EVENT_CAPACITY);

    let mut worker = Worker {
        config,
        detector,
        embedder,
        store,
        session: Session::Idle,
        events: events.clone(),
    };

    std::thread::Builder::new()
        .name("facepose-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                if !worker.handle(req) {
                    break;
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle {
        tx,
        gate: Arc::new(Semaphore::new(1)),
        events,
    })
}

struct Worker {
    config: Config,
    detector: Box<dyn FaceDetector + Send>,
    embedder: Box<dyn Embedder + Send>,
    store: Box<dyn GalleryStore + Send>,
    session: Session,
    events: broadcast::Sender<EngineEvent>,
}

impl Worker {
    /// Handle one request. Returns `false` when the thread should exit.
    fn handle(&mut self, req: EngineRequest) -> bool {
        match req {
            EngineRequest::Frame {
                frame,
                preview,
                permit,
                reply,
            } => {
                let outcome = self.run_frame(&frame, preview);
                // Release the gate before replying so a paced caller can
                // immediately submit the next frame.
                drop(permit);
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            EngineRequest::StartEnrollment { reply } => {
                let script = self.config.pose_script.clone();
                self.session = Session::Enrolling(EnrollmentSession::new(script));
                tracing::info!(steps = self.config.pose_script.len(), "enrollment started");
                self.emit(EngineEvent::PhaseChanged {
                    phase: EnrollPhase::Camera,
                });
                let _ = reply.send(());
            }
            EngineRequest::StartVerification { reply } => {
                let _ = reply.send(self.start_verification());
            }
            EngineRequest::SetThreshold { threshold, reply } => {
                let threshold = threshold.clamp(-1.0, 1.0);
                self.config.similarity_threshold = threshold;
                if let Session::Verifying(session) = &mut self.session {
                    session.set_threshold(threshold);
                }
                tracing::debug!(threshold, "similarity threshold updated");
                let _ = reply.send(threshold);
            }
            EngineRequest::ReviewBack { reply } => {
                let _ = reply.send(self.review_back());
            }
            EngineRequest::Accept { name, reply } => {
                let _ = reply.send(self.accept(&name));
            }
            EngineRequest::List { reply } => {
                let _ = reply.send(self.store.load_all().map_err(EngineError::from));
            }
            EngineRequest::Remove { id, reply } => {
                let _ = reply.send(self.store.delete(&id).map_err(EngineError::from));
            }
            EngineRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
            EngineRequest::Shutdown => return false,
        }
        true
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// Detect, select the first confident face, then drive the active session.
    fn run_frame(&mut self, frame: &Frame, preview: Size2D) -> FrameOutcome {
        let mut outcome = FrameOutcome {
            sequence: frame.sequence,
            ..FrameOutcome::default()
        };

        if frame.size().is_empty() || preview.is_empty() {
            tracing::warn!(
                sequence = frame.sequence,
                "skipping zero-sized frame or preview"
            );
            return outcome;
        }
        if let Session::Enrolling(session) = &self.session {
            if session.phase() != EnrollPhase::Camera {
                return outcome;
            }
        }
        if matches!(self.session, Session::Idle) {
            return outcome;
        }

        let detections = match self.detector.detect(frame) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(
                    sequence = frame.sequence,
                    error = %e,
                    "detector failed; frame skipped"
                );
                return outcome;
            }
        };
        let Some(face) = select_face(&detections, self.config.min_detection_confidence) else {
            tracing::trace!(
                sequence = frame.sequence,
                detections = detections.len(),
                "no usable face"
            );
            return outcome;
        };

        match &mut self.session {
            Session::Idle => {}
            Session::Enrolling(session) => {
                let Some(geometry) = project_detection(face, frame.size(), preview) else {
                    tracing::debug!(
                        sequence = frame.sequence,
                        "detection lacks keypoints; frame skipped"
                    );
                    return outcome;
                };
                outcome.face_found = true;

                let region = TargetRegion::for_preview(preview, self.config.region_divisor);
                let direction = self.config.thresholds.classify(&geometry, &region);
                let phase_before = session.phase();
                let event = session.observe(direction);

                if let SequencerEvent::Capture { index, .. } = event {
                    match frame.crop(&face.bounding_box) {
                        Some(crop) => {
                            let embedding = embed(self.embedder.as_mut(), &crop);
                            if let Err(e) = session.record_capture(index, crop, embedding) {
                                tracing::warn!(
                                    sequence = frame.sequence,
                                    error = %e,
                                    "capture dropped"
                                );
                            }
                        }
                        None => {
                            tracing::warn!(sequence = frame.sequence, index, "capture crop failed")
                        }
                    }
                }

                let phase_after = session.phase();
                outcome.direction = Some(direction);
                outcome.sequencer = Some(event);
                self.emit(EngineEvent::Direction {
                    sequence: frame.sequence,
                    direction,
                });
                self.emit(EngineEvent::Sequencer {
                    sequence: frame.sequence,
                    event,
                });
                if phase_after != phase_before {
                    self.emit(EngineEvent::PhaseChanged { phase: phase_after });
                }
            }
            Session::Verifying(session) => {
                outcome.face_found = true;
                let embedding = frame
                    .crop(&face.bounding_box)
                    .and_then(|crop| embed(self.embedder.as_mut(), &crop));
                if let Some(matches) = session.observe(embedding.as_ref()) {
                    let matches = matches.to_vec();
                    outcome.matches = Some(matches.clone());
                    self.emit(EngineEvent::Matches {
                        sequence: frame.sequence,
                        matches,
                    });
                }
            }
        }

        outcome
    }

    fn start_verification(&mut self) -> Result<usize, EngineError> {
        let snapshot: Arc<[Identity]> = self.store.load_all()?.into();
        let count = snapshot.len();
        self.session = Session::Verifying(VerificationSession::new(
            snapshot,
            self.config.similarity_threshold,
        ));
        tracing::info!(
            identities = count,
            threshold = self.config.similarity_threshold,
            "verification started"
        );
        Ok(count)
    }

    fn review_back(&mut self) -> Result<(), EngineError> {
        let Session::Enrolling(session) = &mut self.session else {
            return Err(EngineError::NotEnrolling);
        };
        session.back()?;
        self.emit(EngineEvent::PhaseChanged {
            phase: EnrollPhase::Camera,
        });
        Ok(())
    }

    fn accept(&mut self, name: &str) -> Result<String, EngineError> {
        let Session::Enrolling(session) = &mut self.session else {
            return Err(EngineError::NotEnrolling);
        };
        let identity = session.accept(name)?;
        let _ = self.events.send(EngineEvent::PhaseChanged {
            phase: EnrollPhase::Saving,
        });

        if let Err(e) = self.store.insert(&identity) {
            tracing::warn!(error = %e, "failed to store identity; back to review");
            session.save_failed()?;
            let _ = self.events.send(EngineEvent::PhaseChanged {
                phase: EnrollPhase::Review,
            });
            return Err(e.into());
        }

        session.mark_saved()?;
        let _ = self.events.send(EngineEvent::PhaseChanged {
            phase: EnrollPhase::Saved,
        });
        let _ = self.events.send(EngineEvent::IdentitySaved {
            id: identity.id.clone(),
        });
        Ok(identity.id)
    }

    fn status(&self) -> EngineStatus {
        let threshold = self.config.similarity_threshold;
        match &self.session {
            Session::Idle => EngineStatus {
                mode: Mode::Idle,
                phase: None,
                prompt: None,
                progress: None,
                captures: 0,
                matches: Vec::new(),
                gallery_size: None,
                threshold,
            },
            Session::Enrolling(session) => EngineStatus {
                mode: Mode::Enrolling,
                phase: Some(session.phase()),
                prompt: session.prompt(),
                progress: session.sequencer().progress(),
                captures: session.captures().len(),
                matches: Vec::new(),
                gallery_size: None,
                threshold,
            },
            Session::Verifying(session) => EngineStatus {
                mode: Mode::Verifying,
                phase: None,
                prompt: None,
                progress: None,
                captures: 0,
                matches: session.matches().to_vec(),
                gallery_size: Some(session.gallery().len()),
                threshold: session.threshold(),
            },
        }
    }
}

/// Run the embedder, treating failures like "no vector".
fn embed(embedder: &mut dyn Embedder, crop: &Frame) -> Option<Embedding> {
    match embedder.embed(crop) {
        Ok(embedding) => embedding,
        Err(e) => {
            tracing::warn!(error = %e, "embedder failed; no vector for this crop");
            None
        }
    }
}
