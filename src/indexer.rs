//! Codebase indexing pipeline.
//!
//! Drives discovery, per-file extraction, and the atomic store swap. File
//! failures never abort a run: unreadable or unparsable files are recorded
//! as warnings in the [`IndexReport`] and the run continues.

use crate::config::EngineConfig;
use crate::discovery::FileDiscovery;
use crate::error::{Result, Warning};
use crate::extract::{self, Language};
use crate::store::IndexStore;
use crate::types::{CodeEntity, IndexReport};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of extracting one file.
struct FileOutcome {
    entities: Vec<CodeEntity>,
    warning: Option<Warning>,
}

pub struct Indexer {
    store: Arc<IndexStore>,
    config: EngineConfig,
}

impl Indexer {
    pub fn new(store: Arc<IndexStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Index every discovered source file under `root` and replace the
    /// codebase's entities in one atomic swap.
    ///
    /// Cancellation is checked between files; a cancelled run leaves the
    /// store untouched and reports what it scanned so far.
    pub async fn index_codebase(
        &self,
        codebase_id: &str,
        root: &Path,
        discovery: &FileDiscovery,
        cancel: &AtomicBool,
    ) -> Result<IndexReport> {
        let files = discovery.discover(root)?;
        info!(
            codebase = codebase_id,
            files = files.len(),
            "indexing {}",
            root.display()
        );

        let concurrency = self.config.concurrency.0.max(1);
        let outcomes: Vec<FileOutcome> = stream::iter(files.iter().cloned())
            .map(|path| async move {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                Some(extract_file(path).await)
            })
            .buffer_unordered(concurrency)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        let mut entities = Vec::new();
        let mut warnings = Vec::new();
        for outcome in outcomes {
            entities.extend(outcome.entities);
            if let Some(warning) = outcome.warning {
                warn!(
                    file = %warning.file_path.display(),
                    "{}", warning.message
                );
                warnings.push(warning);
            }
        }

        if cancel.load(Ordering::Relaxed) {
            info!(codebase = codebase_id, "indexing cancelled before commit");
            return Ok(IndexReport {
                codebase_id: codebase_id.to_string(),
                entity_count: 0,
                file_count: files.len(),
                warnings,
            });
        }

        let entity_count = self.store.upsert_codebase(codebase_id, entities)?;
        info!(
            codebase = codebase_id,
            entities = entity_count,
            warnings = warnings.len(),
            "indexing complete"
        );

        Ok(IndexReport {
            codebase_id: codebase_id.to_string(),
            entity_count,
            file_count: files.len(),
            warnings,
        })
    }
}

async fn extract_file(path: PathBuf) -> FileOutcome {
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => {
            return FileOutcome {
                entities: Vec::new(),
                warning: Some(Warning::unreadable(&path, e.to_string())),
            };
        }
    };

    let language = Language::from_path(&path);
    let (entities, warning) = extract::extract_entities(&content, &path, language);
    FileOutcome { entities, warning }
}
