//! Engine configuration.
//!
//! Every threshold and weight the engine uses lives here; nothing reads
//! them as hidden constants. All sections have serde defaults so a partial
//! JSON file overrides only what it names.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Weights for blending the similarity metrics. The three weights should
/// sum to 1.0; the engine normalizes if they don't.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub token: f64,
    pub edit: f64,
    pub structural: f64,
    /// Token-Jaccard floor below which the expensive metrics are skipped.
    pub prefilter_floor: f64,
    /// Blended score above which a match is classified as structural.
    pub structural_cutoff: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            token: 0.4,
            edit: 0.3,
            structural: 0.3,
            prefilter_floor: 0.2,
            structural_cutoff: 0.9,
        }
    }
}

/// Knobs for the block segmenter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Minimum block length in lines.
    pub min_block_lines: usize,
    /// Upper bound for variable-size windows.
    pub max_block_lines: usize,
    /// Required ratio of non-blank, non-comment lines per window.
    pub significant_ratio: f64,
    /// Collapse numeric literals to a placeholder token.
    pub collapse_numbers: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_block_lines: 5,
            max_block_lines: 30,
            significant_ratio: 0.5,
            collapse_numbers: true,
        }
    }
}

/// Knobs for the duplicate detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DuplicateConfig {
    /// Minimum blended similarity for a pair to join a group.
    pub threshold: f64,
    /// Width of the token-count buckets used to prune candidate pairs.
    pub token_bucket_width: usize,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            token_bucket_width: 8,
        }
    }
}

/// Knobs for keyword/fuzzy search scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchConfig {
    pub exact_name_weight: f64,
    pub prefix_weight: f64,
    pub all_words_weight: f64,
    pub content_weight: f64,
    pub word_boundary_bonus: f64,
    /// Multiplier applied to results in test paths.
    pub test_path_penalty: f64,
    /// Additive boost for results under a `src/` directory.
    pub src_path_boost: f64,
    /// Boost per extra query word matching the same (file, line).
    pub co_occurrence_boost: f64,
    /// Fuzzy mode accepts matches with edit distance up to this fraction
    /// of the query length.
    pub fuzzy_distance_ratio: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            exact_name_weight: 0.5,
            prefix_weight: 0.3,
            all_words_weight: 0.4,
            content_weight: 0.1,
            word_boundary_bonus: 0.15,
            test_path_penalty: 0.7,
            src_path_boost: 0.1,
            co_occurrence_boost: 0.1,
            fuzzy_distance_ratio: 0.4,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub similarity: SimilarityWeights,
    pub segmenter: SegmenterConfig,
    pub duplicates: DuplicateConfig,
    pub search: SearchConfig,
    /// Bound on concurrent per-file work during indexing and scans.
    pub concurrency: Concurrency,
}

/// Concurrency limit wrapper so serde gets a sensible default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Concurrency(pub usize);

impl Default for Concurrency {
    fn default() -> Self {
        Self(8)
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file, falling back to defaults for
    /// any missing section.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }
}
