//! Maximal marginal relevance re-ranking
//!
//! MMR balances relevance against redundancy among already-selected results:
//! MMR = λ × sim(query, doc) - (1-λ) × max(sim(doc, selected))
//!
//! λ = 1.0 degenerates to pure similarity ranking; λ = 0.0 is pure diversity.
//! Regulatory text is full of cross-referencing near-duplicate clauses, which
//! is why retrieval defaults to this instead of naive top-k.

/// Dot product over equal-length slices
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Vector magnitude
pub fn magnitude(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine similarity; zero vectors compare as 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (mag_a * mag_b)
}

/// Greedily select up to `k` candidates maximizing marginal relevance.
///
/// `candidates` are (relevance, vector) pairs already ranked by relevance to
/// the query; the stored relevance is the query similarity computed by stage
/// one. Returns indices into `candidates` in selection order.
pub fn mmr_select(candidates: &[(f32, Vec<f32>)], k: usize, lambda: f32) -> Vec<usize> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let k = k.min(candidates.len());
    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    for _ in 0..k {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &idx) in remaining.iter().enumerate() {
            let relevance = candidates[idx].0;

            let max_similarity = selected
                .iter()
                .map(|&s| cosine_similarity(&candidates[idx].1, &candidates[s].1))
                .fold(0.0f32, f32::max);

            let score = lambda * relevance - (1.0 - lambda) * max_similarity;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(relevance: f32, vector: Vec<f32>) -> (f32, Vec<f32>) {
        (relevance, vector)
    }

    #[test]
    fn test_empty_candidates() {
        assert!(mmr_select(&[], 5, 0.5).is_empty());
    }

    #[test]
    fn test_k_zero() {
        let candidates = vec![candidate(0.9, vec![0.9, 0.1])];
        assert!(mmr_select(&candidates, 0, 0.5).is_empty());
    }

    #[test]
    fn test_returns_at_most_k() {
        let candidates = vec![
            candidate(0.9, vec![0.9, 0.1, 0.0]),
            candidate(0.8, vec![0.8, 0.2, 0.0]),
            candidate(0.7, vec![0.7, 0.3, 0.0]),
            candidate(0.6, vec![0.6, 0.4, 0.0]),
        ];

        assert_eq!(mmr_select(&candidates, 3, 0.5).len(), 3);
        assert_eq!(mmr_select(&candidates, 10, 0.5).len(), 4);
    }

    #[test]
    fn test_pure_relevance_preserves_order() {
        let candidates = vec![
            candidate(0.9, vec![0.9, 0.1]),
            candidate(0.85, vec![0.88, 0.12]),
            candidate(0.5, vec![0.5, 0.5]),
        ];

        let selected = mmr_select(&candidates, 3, 1.0);
        assert_eq!(selected[0], 0);
        assert_eq!(selected[1], 1);
    }

    #[test]
    fn test_promotes_diverse_candidate_over_near_duplicate() {
        let candidates = vec![
            candidate(0.95, vec![0.99, 0.01, 0.0]), // closest to query
            candidate(0.94, vec![0.98, 0.02, 0.0]), // near-duplicate of the first
            candidate(0.70, vec![0.0, 0.0, 1.0]),   // orthogonal
        ];

        let selected = mmr_select(&candidates, 2, 0.5);
        assert_eq!(selected[0], 0);
        assert_eq!(
            selected[1], 2,
            "second pick should be the diverse candidate, not the near-duplicate"
        );
    }

    #[test]
    fn test_identical_vectors_still_fill_k() {
        let candidates = vec![
            candidate(0.9, vec![1.0, 0.0]),
            candidate(0.8, vec![1.0, 0.0]),
            candidate(0.7, vec![1.0, 0.0]),
        ];

        assert_eq!(mmr_select(&candidates, 3, 0.5).len(), 3);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert!((cosine_similarity(&[0.0, 0.0], &[1.0, 0.0])).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cosine_similarity_parallel() {
        let sim = cosine_similarity(&[2.0, 0.0], &[5.0, 0.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }
}
