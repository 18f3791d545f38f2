//! Verification session over a fixed gallery snapshot.

use crate::matcher::{BestOfMatcher, Matcher};
use crate::types::{Embedding, Identity, MatchResult};
use std::sync::Arc;

/// Holds the gallery snapshot taken when verification started and the most
/// recent match list. Later gallery edits do not affect a running session.
pub struct VerificationSession {
    gallery: Arc<[Identity]>,
    threshold: f32,
    matches: Vec<MatchResult>,
    updates: u64,
}

impl VerificationSession {
    pub fn new(gallery: Arc<[Identity]>, threshold: f32) -> Self {
        Self {
            gallery,
            threshold: threshold.clamp(-1.0, 1.0),
            matches: Vec::new(),
            updates: 0,
        }
    }

    pub fn gallery(&self) -> &Arc<[Identity]> {
        &self.gallery
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Retune the threshold, clamped to [-1, 1]. Applies from the next frame.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(-1.0, 1.0);
    }

    pub fn matches(&self) -> &[MatchResult] {
        &self.matches
    }

    /// Number of frames that replaced the match list.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Feed one frame's embedding. `None` keeps the previous matches.
    pub fn observe(&mut self, embedding: Option<&Embedding>) -> Option<&[MatchResult]> {
        let embedding = embedding?;
        self.matches = BestOfMatcher.compare(embedding, &self.gallery, self.threshold);
        self.updates += 1;
        tracing::trace!(matches = self.matches.len(), "verification frame matched");
        Some(&self.matches)
    }

    /// Forget the current matches and counters.
    pub fn clear(&mut self) {
        self.matches.clear();
        self.updates = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gallery() -> Arc<[Identity]> {
        vec![Identity {
            id: "1".into(),
            name: "alice".into(),
            created: "2024-01-01 00:00:00".into(),
            embeddings: vec![Embedding::new(vec![1.0, 0.0])],
        }]
        .into()
    }

    #[test]
    fn test_observe_replaces_matches() {
        let mut s = VerificationSession::new(gallery(), 0.8);
        let hit = s.observe(Some(&Embedding::new(vec![1.0, 0.0]))).unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(s.updates(), 1);

        let miss = s.observe(Some(&Embedding::new(vec![0.0, 1.0]))).unwrap();
        assert!(miss.is_empty());
        assert_eq!(s.updates(), 2);
    }

    #[test]
    fn test_missing_embedding_keeps_previous_state() {
        let mut s = VerificationSession::new(gallery(), 0.8);
        s.observe(Some(&Embedding::new(vec![1.0, 0.0])));
        assert!(s.observe(None).is_none());
        assert_eq!(s.matches().len(), 1);
        assert_eq!(s.updates(), 1);
    }

    #[test]
    fn test_empty_gallery_yields_no_match() {
        let mut s = VerificationSession::new(Vec::<Identity>::new().into(), 0.8);
        assert!(s.observe(Some(&Embedding::new(vec![1.0]))).unwrap().is_empty());
    }

    #[test]
    fn test_threshold_is_clamped() {
        let mut s = VerificationSession::new(gallery(), 3.0);
        assert_eq!(s.threshold(), 1.0);
        s.set_threshold(-7.0);
        assert_eq!(s.threshold(), -1.0);
    }

    #[test]
    fn test_clear() {
        let mut s = VerificationSession::new(gallery(), 0.8);
        s.observe(Some(&Embedding::new(vec![1.0, 0.0])));
        s.clear();
        assert!(s.matches().is_empty());
        assert_eq!(s.updates(), 0);
    }
}
