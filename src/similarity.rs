//! Similarity engine.
//!
//! Stateless scoring of the likeness of two code blocks using layered
//! metrics, cheapest first:
//!
//! 1. Exact content-hash match (short-circuits to 1.0)
//! 2. Token-set Jaccard similarity (also a pre-filter)
//! 3. Normalized edit similarity over raw content
//! 4. Structural-feature similarity over coarse syntax counts
//!
//! The blended score uses the configured weights. The function performs no
//! I/O and holds no state; it is safe to call concurrently.

use crate::config::SimilarityWeights;
use crate::types::{CodeBlock, MatchType, SimilarityScore};
use std::collections::HashSet;

/// Compute the similarity of two blocks. Deterministic and symmetric.
pub fn similarity(a: &CodeBlock, b: &CodeBlock, weights: &SimilarityWeights) -> SimilarityScore {
    if a.content_hash == b.content_hash {
        return SimilarityScore {
            score: 1.0,
            hash_exact: true,
            token_jaccard: 1.0,
            edit_similarity: 1.0,
            structural_similarity: 1.0,
            match_type: MatchType::Exact,
        };
    }

    let token_jaccard = jaccard(&a.tokens, &b.tokens);

    // Pre-filter: clearly dissimilar token sets are not worth the two
    // expensive metrics.
    if token_jaccard < weights.prefilter_floor {
        let score = clamp01(token_jaccard * normalized(weights).0);
        return SimilarityScore {
            score,
            hash_exact: false,
            token_jaccard,
            edit_similarity: 0.0,
            structural_similarity: 0.0,
            match_type: MatchType::Semantic,
        };
    }

    let edit_similarity = edit_similarity(&a.content, &b.content);
    let structural_similarity =
        feature_similarity(&StructuralFeatures::of(&a.content), &StructuralFeatures::of(&b.content));

    let (w_token, w_edit, w_structural) = normalized(weights);
    let score = clamp01(
        token_jaccard * w_token + edit_similarity * w_edit + structural_similarity * w_structural,
    );

    let match_type = if score > weights.structural_cutoff {
        MatchType::Structural
    } else {
        MatchType::Semantic
    };

    SimilarityScore {
        score,
        hash_exact: false,
        token_jaccard,
        edit_similarity,
        structural_similarity,
        match_type,
    }
}

/// Jaccard index over the two token multisets-as-sets.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - intersection;
    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}

/// `1 - levenshtein(a, b) / max(|a|, |b|)` over raw content. Catches
/// near-identical code with small token-level edits that token-set
/// similarity under-weights.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(a, b);
    1.0 - distance as f64 / max_len as f64
}

/// Coarse syntax counts compared as a vector. Catches same-shape logic with
/// different tokens, like copy-pasted control flow with renamed variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructuralFeatures {
    pub conditionals: usize,
    pub loops: usize,
    pub assignments: usize,
    pub returns: usize,
    pub declarations: usize,
    pub call_sites: usize,
}

impl StructuralFeatures {
    pub fn of(content: &str) -> Self {
        let mut features = Self::default();
        let bytes = content.as_bytes();

        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if c.is_ascii_alphabetic() || c == b'_' {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &content[start..i];
                match word {
                    "if" | "else" | "match" | "switch" | "case" => features.conditionals += 1,
                    "for" | "while" | "loop" | "foreach" => features.loops += 1,
                    "return" => features.returns += 1,
                    "let" | "var" | "const" | "static" => features.declarations += 1,
                    _ => {
                        // Identifier directly followed by '(' counts as a call.
                        if bytes.get(i) == Some(&b'(') {
                            features.call_sites += 1;
                        }
                    }
                }
                continue;
            }
            if c == b'=' {
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                // Plain assignment, not ==, !=, <=, >=, =>, += and friends.
                if next != b'=' && next != b'>' && !matches!(prev, b'=' | b'!' | b'<' | b'>') {
                    features.assignments += 1;
                }
            }
            i += 1;
        }
        features
    }

    fn as_array(&self) -> [usize; 6] {
        [
            self.conditionals,
            self.loops,
            self.assignments,
            self.returns,
            self.declarations,
            self.call_sites,
        ]
    }
}

/// `1 - sum(|diff|) / sum(max)` over the feature vectors.
pub fn feature_similarity(a: &StructuralFeatures, b: &StructuralFeatures) -> f64 {
    let av = a.as_array();
    let bv = b.as_array();
    let mut diff_sum = 0usize;
    let mut max_sum = 0usize;
    for (x, y) in av.iter().zip(bv.iter()) {
        diff_sum += x.abs_diff(*y);
        max_sum += *x.max(y);
    }
    if max_sum == 0 {
        return 1.0;
    }
    1.0 - diff_sum as f64 / max_sum as f64
}

fn normalized(weights: &SimilarityWeights) -> (f64, f64, f64) {
    let sum = weights.token + weights.edit + weights.structural;
    if sum <= 0.0 {
        return (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
    }
    (
        weights.token / sum,
        weights.edit / sum,
        weights.structural / sum,
    )
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}
