//! Duplicate detector.
//!
//! Finds block pairs above a similarity threshold across one file, a file
//! pair, or a whole codebase, then clusters transitively-similar pairs into
//! duplicate groups with refactoring advice.
//!
//! To avoid full O(n^2) comparison, blocks are bucketed by content hash
//! (exact matches) and by coarse token count (near matches) before the
//! similarity engine runs; only bucket-adjacent pairs get the full metric
//! stack.

use crate::config::EngineConfig;
use crate::error::Warning;
use crate::segment::{segment_fixed, segment_variable};
use crate::similarity::similarity;
use crate::types::{
    BlockLocation, CodeBlock, DuplicateGroup, DuplicateReport, MatchType, RefactoringAdvice,
};
use futures::stream::{self, StreamExt};
use petgraph::unionfind::UnionFind;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Duplicate detector configured with segmentation, similarity, and
/// threshold settings.
pub struct DuplicateDetector {
    config: EngineConfig,
}

impl DuplicateDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Override the similarity threshold for this detector.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.config.duplicates.threshold = threshold;
        self
    }

    /// Detect duplicated regions within a single file.
    ///
    /// Uses variable-size windows so regions longer than the minimum block
    /// size are reported at their full extent.
    pub fn detect_in_file(&self, content: &str, file: &Path) -> Vec<DuplicateGroup> {
        let blocks = segment_variable(content, file, &self.config.segmenter);
        self.cluster(blocks)
    }

    /// Detect duplicated regions between two files (including within each).
    pub fn detect_in_pair(
        &self,
        content_a: &str,
        file_a: &Path,
        content_b: &str,
        file_b: &Path,
    ) -> Vec<DuplicateGroup> {
        let mut blocks = segment_variable(content_a, file_a, &self.config.segmenter);
        blocks.extend(segment_variable(content_b, file_b, &self.config.segmenter));
        self.cluster(blocks)
    }

    /// Detect duplicated regions across a whole codebase.
    ///
    /// Uses fixed-size windows to keep the candidate set tractable. Files
    /// are read and segmented concurrently under the configured bound.
    /// Files that cannot be read are skipped and reported as warnings; they
    /// never abort the run. Cancellation is checked per file.
    pub async fn detect_in_codebase(
        &self,
        files: &[PathBuf],
        cancel: &AtomicBool,
    ) -> DuplicateReport {
        let concurrency = self.config.concurrency.0.max(1);
        let segmenter = &self.config.segmenter;

        type FileBlocks = std::result::Result<Vec<CodeBlock>, Warning>;
        let outcomes: Vec<FileBlocks> = stream::iter(files.iter().cloned())
            .map(|file| async move {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                match tokio::fs::read_to_string(&file).await {
                    Ok(content) => Some(Ok(segment_fixed(&content, &file, segmenter))),
                    Err(e) => {
                        tracing::warn!("skipping unreadable file {}: {}", file.display(), e);
                        Some(Err(Warning::unreadable(&file, e.to_string())))
                    }
                }
            })
            .buffer_unordered(concurrency)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        if cancel.load(Ordering::Relaxed) {
            tracing::info!("duplicate scan cancelled after {} files", outcomes.len());
        }

        let mut blocks = Vec::new();
        let mut warnings = Vec::new();
        let mut files_scanned = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(file_blocks) => {
                    blocks.extend(file_blocks);
                    files_scanned += 1;
                }
                Err(warning) => warnings.push(warning),
            }
        }

        // Completion order is nondeterministic; restore a stable block
        // order so group output is reproducible.
        blocks.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| a.start_line.cmp(&b.start_line))
                .then_with(|| a.end_line.cmp(&b.end_line))
        });

        DuplicateReport {
            groups: self.cluster(blocks),
            files_scanned,
            warnings,
        }
    }

    /// Score candidate pairs and cluster transitively-similar blocks.
    fn cluster(&self, blocks: Vec<CodeBlock>) -> Vec<DuplicateGroup> {
        if blocks.len() < 2 {
            return Vec::new();
        }

        let threshold = self.config.duplicates.threshold;
        let bucket_width = self.config.duplicates.token_bucket_width.max(1);

        // Bucket by exact hash and by coarse token count.
        let mut hash_buckets: HashMap<u64, Vec<usize>> = HashMap::new();
        let mut token_buckets: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, block) in blocks.iter().enumerate() {
            hash_buckets.entry(block.content_hash).or_default().push(i);
            token_buckets
                .entry(block.tokens.len() / bucket_width)
                .or_default()
                .push(i);
        }

        let mut union = UnionFind::<usize>::new(blocks.len());
        let mut pair_scores: Vec<(usize, usize, f64, bool)> = Vec::new();
        let mut seen = HashSet::<(usize, usize)>::new();

        let mut consider = |i: usize, j: usize, union: &mut UnionFind<usize>| {
            let (i, j) = if i < j { (i, j) } else { (j, i) };
            if i == j || !seen.insert((i, j)) {
                return;
            }
            // A window is not a duplicate of itself under a different offset.
            if blocks[i].overlaps(&blocks[j]) {
                return;
            }
            let score = similarity(&blocks[i], &blocks[j], &self.config.similarity);
            if score.score >= threshold {
                union.union(i, j);
                pair_scores.push((i, j, score.score, score.hash_exact));
            }
        };

        // Exact-hash buckets: every pair matches by definition, but still
        // runs through `consider` for overlap suppression.
        for indices in hash_buckets.values() {
            if indices.len() < 2 {
                continue;
            }
            for (a, &i) in indices.iter().enumerate() {
                for &j in &indices[a + 1..] {
                    consider(i, j, &mut union);
                }
            }
        }

        // Near-match candidates: same or adjacent token bucket.
        let bucket_keys: Vec<usize> = token_buckets.keys().copied().collect();
        for &key in &bucket_keys {
            let current = &token_buckets[&key];
            for (a, &i) in current.iter().enumerate() {
                for &j in &current[a + 1..] {
                    consider(i, j, &mut union);
                }
                if let Some(next) = token_buckets.get(&(key + 1)) {
                    for &j in next {
                        consider(i, j, &mut union);
                    }
                }
            }
        }

        if pair_scores.is_empty() {
            return Vec::new();
        }

        // Sliding windows over one duplicated region land in separate
        // components unless overlapping matched blocks are unioned too.
        let matched: Vec<usize> = {
            let mut m: Vec<usize> = pair_scores
                .iter()
                .flat_map(|&(i, j, _, _)| [i, j])
                .collect();
            m.sort_unstable();
            m.dedup();
            m
        };
        for (a, &i) in matched.iter().enumerate() {
            for &j in &matched[a + 1..] {
                if blocks[i].overlaps(&blocks[j]) {
                    union.union(i, j);
                }
            }
        }

        // Accumulate per-component score sums.
        let mut component_scores: HashMap<usize, (f64, usize, bool)> = HashMap::new();
        for &(i, _, score, exact) in &pair_scores {
            let root = union.find(i);
            let entry = component_scores.entry(root).or_insert((0.0, 0, true));
            entry.0 += score;
            entry.1 += 1;
            entry.2 &= exact;
        }

        let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
        for &i in &matched {
            members.entry(union.find(i)).or_default().push(i);
        }

        let mut groups = Vec::new();
        for (root, indices) in members {
            let Some(&(score_sum, pair_count, all_exact)) = component_scores.get(&root) else {
                continue;
            };
            let locations = merge_member_spans(&blocks, &indices);
            if locations.len() < 2 {
                continue;
            }

            let average_similarity = score_sum / pair_count as f64;
            let match_type = if all_exact {
                MatchType::Exact
            } else if average_similarity > self.config.similarity.structural_cutoff {
                MatchType::Structural
            } else {
                MatchType::Semantic
            };

            let snippet = blocks[indices[0]].content.clone();
            let mut group = DuplicateGroup {
                locations,
                snippet,
                average_similarity,
                match_type,
                advice: RefactoringAdvice::ExtractMethod,
            };
            group.advice = classify_advice(&group);
            groups.push(group);
        }

        groups.sort_by(|a, b| {
            b.average_similarity
                .partial_cmp(&a.average_similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.locations[0].file_path.cmp(&b.locations[0].file_path))
                .then_with(|| a.locations[0].start_line.cmp(&b.locations[0].start_line))
        });
        groups
    }
}

/// Collapse same-file overlapping member blocks into their covering spans.
fn merge_member_spans(blocks: &[CodeBlock], indices: &[usize]) -> Vec<BlockLocation> {
    let mut spans: Vec<BlockLocation> = indices.iter().map(|&i| (&blocks[i]).into()).collect();
    spans.sort_by(|a, b| {
        a.file_path
            .cmp(&b.file_path)
            .then_with(|| a.start_line.cmp(&b.start_line))
    });

    let mut merged: Vec<BlockLocation> = Vec::new();
    for span in spans {
        match merged.last_mut() {
            Some(last)
                if last.file_path == span.file_path && span.start_line <= last.end_line + 1 =>
            {
                last.end_line = last.end_line.max(span.end_line);
            }
            _ => merged.push(span),
        }
    }
    merged
}

/// Classify a group into a refactoring-advice tier by affected lines.
fn classify_advice(group: &DuplicateGroup) -> RefactoringAdvice {
    let total = group.total_lines();
    if total > 50 {
        RefactoringAdvice::ExtractModule
    } else if group.is_cross_file() || total >= 10 {
        RefactoringAdvice::ExtractMethod
    } else {
        RefactoringAdvice::ExtractVariable
    }
}
