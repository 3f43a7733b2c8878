//! Code-intelligence core.
//!
//! Extracts typed entities from source files, keeps them in an atomically
//! replaceable index, and answers questions about the code on top of that
//! index:
//!
//! 1. **Extraction**: tree-sitter parsing for Rust and TypeScript/TSX with
//!    a lexical fallback for everything else.
//! 2. **Indexing**: per-codebase entity store with wholesale atomic
//!    replacement and optional on-disk snapshots.
//! 3. **Search**: keyword, fuzzy, and structural modes over the index.
//! 4. **Duplicate detection**: block segmentation plus a blended
//!    token/edit/structural similarity metric, clustered with union-find.
//!
//! # Usage
//!
//! ```ignore
//! use codeintel::{CodeIntel, EngineConfig, SearchMode, SearchOptions};
//!
//! let engine = CodeIntel::new(EngineConfig::default(), None)?;
//! engine.index_codebase("myrepo", "/path/to/repo".as_ref()).await?;
//!
//! let hits = engine.search("parse config", SearchMode::Keyword, &SearchOptions::default())?;
//! let report = engine.detect_duplicates("/path/to/repo".as_ref()).await?;
//! ```

pub mod config;
pub mod discovery;
pub mod duplicates;
pub mod error;
pub mod extract;
pub mod indexer;
pub mod search;
pub mod segment;
pub mod similarity;
pub mod store;
pub mod types;

// Re-exports
pub use config::{DuplicateConfig, EngineConfig, SearchConfig, SegmenterConfig, SimilarityWeights};
pub use discovery::FileDiscovery;
pub use duplicates::DuplicateDetector;
pub use error::{Error, Result, Warning, WarningKind};
pub use extract::{extract_entities, EntityExtractor, Language};
pub use indexer::Indexer;
pub use search::SearchEngine;
pub use similarity::similarity;
pub use store::{CodebaseIndex, IndexStore};
pub use types::*;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// One-stop facade wiring the store, indexer, search engine, and duplicate
/// detector together with a shared configuration.
pub struct CodeIntel {
    config: EngineConfig,
    store: Arc<IndexStore>,
    search: SearchEngine,
    discovery_excludes: Vec<String>,
}

impl CodeIntel {
    /// Create an engine. With `data_dir` set, index snapshots persist there
    /// and reload on the next construction; without it the index is
    /// memory-only.
    pub fn new(config: EngineConfig, data_dir: Option<&Path>) -> Result<Self> {
        let store = Arc::new(IndexStore::new());
        store.initialize(data_dir)?;
        let search = SearchEngine::new(store.clone(), config.search);
        Ok(Self {
            config,
            store,
            search,
            discovery_excludes: Vec::new(),
        })
    }

    /// Add a discovery exclude pattern applied to every indexing run.
    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.discovery_excludes.push(pattern.to_string());
        self
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Index (or re-index) the codebase rooted at `root` under the given id.
    pub async fn index_codebase(&self, codebase_id: &str, root: &Path) -> Result<IndexReport> {
        let discovery = self.discovery();
        Indexer::new(self.store.clone(), self.config.clone())
            .index_codebase(codebase_id, root, &discovery, &AtomicBool::new(false))
            .await
    }

    /// Remove a codebase and its persisted entities.
    pub fn delete_codebase(&self, codebase_id: &str) -> Result<()> {
        self.store.delete_codebase(codebase_id)
    }

    /// Search indexed entities.
    pub fn search(
        &self,
        query: &str,
        mode: SearchMode,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let results = self.search.search(query, mode, options)?;
        let mut merged = search::dedup_by_location(results);
        merged.truncate(options.max_results);
        Ok(merged)
    }

    /// Scan a codebase root for duplicated blocks. Runs on files directly;
    /// the codebase does not need to be indexed first.
    pub async fn detect_duplicates(&self, root: &Path) -> Result<DuplicateReport> {
        let files = self.discovery().discover(root)?;
        let detector = DuplicateDetector::new(&self.config);
        Ok(detector
            .detect_in_codebase(&files, &AtomicBool::new(false))
            .await)
    }

    /// Duplicate scan within a single file's content.
    pub fn detect_duplicates_in_file(&self, content: &str, file: &Path) -> Vec<DuplicateGroup> {
        DuplicateDetector::new(&self.config).detect_in_file(content, file)
    }

    /// Compare two blocks with the configured weights.
    pub fn similarity(&self, a: &CodeBlock, b: &CodeBlock) -> SimilarityScore {
        similarity::similarity(a, b, &self.config.similarity)
    }

    /// Segment file content into comparison blocks with the configured
    /// segmenter settings.
    pub fn segment_blocks(&self, content: &str, file: &Path) -> Vec<CodeBlock> {
        segment::segment_variable(content, file, &self.config.segmenter)
    }

    /// Index statistics for one codebase.
    pub fn stats(&self, codebase_id: &str) -> Result<IndexStats> {
        self.store.stats(codebase_id)
    }

    pub fn codebase_ids(&self) -> Result<Vec<String>> {
        self.store.codebase_ids()
    }

    fn discovery(&self) -> FileDiscovery {
        let mut discovery = FileDiscovery::new();
        for pattern in &self.discovery_excludes {
            discovery = discovery.with_exclude(pattern);
        }
        discovery
    }
}
