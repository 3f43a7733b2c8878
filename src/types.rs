//! Core types for the code-intelligence engine.
//!
//! This module defines the fundamental data structures shared by the
//! extractor, segmenter, similarity engine, duplicate detector, index
//! store, and search engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Entities
// ============================================================================

/// Kind of addressable code entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Function,
    Class,
    Interface,
    Method,
    TypeAlias,
    Variable,
    Import,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Method => "method",
            Self::TypeAlias => "type",
            Self::Variable => "variable",
            Self::Import => "import",
        }
    }
}

/// Function/method signature information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<String>,
    pub return_type: Option<String>,
}

/// A named, typed span of source extracted from one file.
///
/// Entities are created by the extractor during an indexing run and owned
/// by the index store once persisted. `(file_path, start_line, name)` is
/// unique within a codebase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntity {
    pub name: String,
    pub kind: EntityKind,
    pub file_path: PathBuf,
    /// 1-indexed, inclusive.
    pub start_line: usize,
    /// 1-indexed, inclusive. Always >= `start_line`.
    pub end_line: usize,
    pub content: String,
    pub signature: Option<Signature>,
    pub codebase_id: Option<String>,
}

impl CodeEntity {
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

// ============================================================================
// Blocks
// ============================================================================

/// An unnamed contiguous span of lines used only for similarity comparison.
///
/// Blocks are transient: created fresh for each duplicate-detection run or
/// fuzzy query and never persisted.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub file_path: PathBuf,
    /// 1-indexed, inclusive.
    pub start_line: usize,
    /// 1-indexed, inclusive.
    pub end_line: usize,
    pub content: String,
    /// Normalized token sequence: delimiters split, case-folded,
    /// numeric literals optionally collapsed.
    pub tokens: Vec<String>,
    /// FNV-1a hash of the normalized significant lines.
    pub content_hash: u64,
}

impl CodeBlock {
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Whether two blocks from the same file have intersecting line ranges.
    pub fn overlaps(&self, other: &CodeBlock) -> bool {
        self.file_path == other.file_path
            && self.start_line <= other.end_line
            && other.start_line <= self.end_line
    }
}

/// A block location without the content payload, used in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    pub file_path: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
}

impl BlockLocation {
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

impl From<&CodeBlock> for BlockLocation {
    fn from(block: &CodeBlock) -> Self {
        Self {
            file_path: block.file_path.clone(),
            start_line: block.start_line,
            end_line: block.end_line,
        }
    }
}

// ============================================================================
// Similarity
// ============================================================================

/// Classification of how two blocks match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    /// Content hashes are equal.
    Exact,
    /// Blended score above the structural cutoff (default 0.9).
    Structural,
    /// Above threshold but below the structural cutoff.
    Semantic,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Structural => "structural",
            Self::Semantic => "semantic",
        }
    }
}

/// Output of the similarity engine: one blended score in [0, 1] plus the
/// per-metric components that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub score: f64,
    pub hash_exact: bool,
    pub token_jaccard: f64,
    pub edit_similarity: f64,
    pub structural_similarity: f64,
    pub match_type: MatchType,
}

// ============================================================================
// Duplicate groups
// ============================================================================

/// Refactoring guidance for a duplicate group, tiered by affected lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefactoringAdvice {
    /// Small single-file duplication (< 10 lines).
    ExtractVariable,
    /// Medium duplication (10-50 lines) or short cross-file blocks.
    ExtractMethod,
    /// Large duplication (> 50 lines) or large cross-file blocks.
    ExtractModule,
}

impl RefactoringAdvice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractVariable => "extract_variable",
            Self::ExtractMethod => "extract_method",
            Self::ExtractModule => "extract_module",
        }
    }
}

/// A cluster of two or more block locations whose pairwise similarity
/// exceeded the configured threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub locations: Vec<BlockLocation>,
    /// Representative snippet from the first member.
    pub snippet: String,
    /// Average pairwise similarity across the group's scored pairs.
    pub average_similarity: f64,
    pub match_type: MatchType,
    pub advice: RefactoringAdvice,
}

impl DuplicateGroup {
    /// Total lines covered by all member locations.
    pub fn total_lines(&self) -> usize {
        self.locations.iter().map(|l| l.line_count()).sum()
    }

    /// Whether the group spans more than one file.
    pub fn is_cross_file(&self) -> bool {
        self.locations
            .windows(2)
            .any(|w| w[0].file_path != w[1].file_path)
    }
}

// ============================================================================
// Search
// ============================================================================

/// How a search query should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    /// Substring/prefix matching against names and content.
    Keyword,
    /// Edit-distance matching for approximate queries.
    Fuzzy,
    /// Name-only matching for "find this declaration" queries.
    Structural,
}

/// Options controlling a search call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum results to return.
    pub max_results: usize,
    /// Restrict to one codebase; `None` searches all.
    pub codebase_id: Option<String>,
    /// Filter results to these entity kinds.
    pub kind_filter: Option<Vec<EntityKind>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 20,
            codebase_id: None,
            kind_filter: None,
        }
    }
}

/// A single ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub kind: EntityKind,
    pub file_path: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
    /// Relevance in [0, 1], descending across the result list.
    pub score: f64,
    /// First matching content line, when the match was in content.
    pub context: Option<String>,
}

// ============================================================================
// Statistics and reports
// ============================================================================

/// Index statistics for one codebase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_entities: usize,
    pub total_files: usize,
    pub functions: usize,
    pub classes: usize,
    pub interfaces: usize,
    pub methods: usize,
    pub type_aliases: usize,
    pub variables: usize,
    pub imports: usize,
}

impl IndexStats {
    pub fn count_for(&mut self, kind: EntityKind) {
        self.total_entities += 1;
        match kind {
            EntityKind::Function => self.functions += 1,
            EntityKind::Class => self.classes += 1,
            EntityKind::Interface => self.interfaces += 1,
            EntityKind::Method => self.methods += 1,
            EntityKind::TypeAlias => self.type_aliases += 1,
            EntityKind::Variable => self.variables += 1,
            EntityKind::Import => self.imports += 1,
        }
    }
}

/// Result of an indexing run: counts plus per-file warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    pub codebase_id: String,
    pub entity_count: usize,
    pub file_count: usize,
    pub warnings: Vec<crate::error::Warning>,
}

/// Result of a duplicate-detection run: groups plus per-file warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
    pub files_scanned: usize,
    pub warnings: Vec<crate::error::Warning>,
}
