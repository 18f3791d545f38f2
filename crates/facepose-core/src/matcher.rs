//! Gallery matching of a probe embedding.

use crate::types::{Embedding, Identity, MatchResult};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

/// Strategy for comparing a probe embedding against a gallery of enrolled identities.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[Identity], threshold: f32) -> Vec<MatchResult>;
}

/// Best-of-N cosine matcher.
///
/// An identity scores the maximum similarity over all of its embeddings, so
/// one close enrolled pose is enough. Identities scoring strictly above the
/// threshold are returned, highest score first; ties keep gallery order.
pub struct BestOfMatcher;

impl Matcher for BestOfMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[Identity], threshold: f32) -> Vec<MatchResult> {
        if probe.values.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<MatchResult> = gallery
            .iter()
            .filter_map(|identity| {
                let score = identity
                    .embeddings
                    .iter()
                    .map(|e| probe.similarity(e))
                    .reduce(f32::max)?;
                (score > threshold).then(|| MatchResult {
                    identity_id: identity.id.clone(),
                    identity_name: identity.name.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results
    }
}

/// Match with [`BestOfMatcher`].
pub fn match_gallery(probe: &Embedding, gallery: &[Identity], threshold: f32) -> Vec<MatchResult> {
    BestOfMatcher.compare(probe, gallery, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str, embeddings: Vec<Vec<f32>>) -> Identity {
        Identity {
            id: id.into(),
            name: format!("name-{id}"),
            created: "2024-01-01 00:00:00".into(),
            embeddings: embeddings.into_iter().map(Embedding::new).collect(),
        }
    }

    /// Unit vector in the xy-plane whose cosine with (1, 0) is `cos`.
    fn at_cos(cos: f32) -> Vec<f32> {
        vec![cos, (1.0 - cos * cos).sqrt()]
    }

    #[test]
    fn test_best_of_n_score() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![identity("a", vec![at_cos(0.2), at_cos(0.9), at_cos(0.5)])];

        let results = match_gallery(&probe, &gallery, 0.8);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].identity_id, "a");
        assert_eq!(results[0].identity_name, "name-a");
        assert!((results[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_scores_at_or_below_threshold_excluded() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![
            identity("low", vec![at_cos(0.1), at_cos(0.3)]),
            identity("equal", vec![vec![1.0, 0.0]]),
        ];
        assert!(match_gallery(&probe, &gallery, 1.0).is_empty());
        assert!(match_gallery(&probe, &gallery[..1], 0.8).is_empty());
    }

    #[test]
    fn test_empty_gallery() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        assert!(match_gallery(&probe, &[], 0.8).is_empty());
    }

    #[test]
    fn test_empty_probe_matches_nothing() {
        let gallery = vec![identity("a", vec![vec![1.0, 0.0]])];
        assert!(match_gallery(&Embedding::new(vec![]), &gallery, -1.0).is_empty());
    }

    #[test]
    fn test_identity_without_embeddings_is_skipped() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![identity("empty", vec![])];
        assert!(match_gallery(&probe, &gallery, -1.0).is_empty());
    }

    #[test]
    fn test_results_sorted_descending() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![
            identity("mid", vec![at_cos(0.85)]),
            identity("none", vec![at_cos(0.1)]),
            identity("top", vec![at_cos(0.99)]),
            identity("low", vec![at_cos(0.81)]),
        ];
        let ids: Vec<_> = match_gallery(&probe, &gallery, 0.8)
            .into_iter()
            .map(|r| r.identity_id)
            .collect();
        assert_eq!(ids, vec!["top", "mid", "low"]);
    }

    #[test]
    fn test_negative_threshold() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![identity("opposite", vec![vec![-1.0, 0.0]])];
        assert!(match_gallery(&probe, &gallery, -1.0).is_empty());
        assert_eq!(match_gallery(&probe, &gallery, -1.5).len(), 1);
    }
}
