//! Index store.
//!
//! Durable, queryable store of [`CodeEntity`] records keyed by codebase id.
//! Re-indexing replaces a codebase's entities atomically: a new snapshot is
//! built and persisted first, then swapped in, so concurrent readers never
//! observe a mix of old and new entities. Writes are serialized per
//! codebase id; reads against other codebases are unaffected. Persistence
//! of the shared on-disk snapshot is serialized store-wide.

use crate::error::{Error, Result};
use crate::types::{CodeEntity, IndexStats};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SNAPSHOT_FILE: &str = "entities.bin";

/// Immutable per-codebase snapshot with precomputed lookup structures.
#[derive(Debug)]
pub struct CodebaseIndex {
    entities: Vec<CodeEntity>,
    /// Lowercased name -> entity indices.
    by_name: HashMap<String, Vec<usize>>,
    /// File path -> entity indices.
    by_file: HashMap<PathBuf, Vec<usize>>,
    stats: IndexStats,
}

impl CodebaseIndex {
    fn build(codebase_id: &str, mut entities: Vec<CodeEntity>) -> Self {
        for entity in &mut entities {
            entity.codebase_id = Some(codebase_id.to_string());
        }
        // (file, start_line, name) is unique within a codebase.
        entities.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| a.start_line.cmp(&b.start_line))
                .then_with(|| a.name.cmp(&b.name))
        });
        entities.dedup_by(|a, b| {
            a.file_path == b.file_path && a.start_line == b.start_line && a.name == b.name
        });

        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_file: HashMap<PathBuf, Vec<usize>> = HashMap::new();
        let mut stats = IndexStats::default();
        let mut files = HashSet::new();

        for (i, entity) in entities.iter().enumerate() {
            by_name
                .entry(entity.name.to_lowercase())
                .or_default()
                .push(i);
            by_file.entry(entity.file_path.clone()).or_default().push(i);
            files.insert(entity.file_path.clone());
            stats.count_for(entity.kind);
        }
        stats.total_files = files.len();

        Self {
            entities,
            by_name,
            by_file,
            stats,
        }
    }

    pub fn entities(&self) -> &[CodeEntity] {
        &self.entities
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn entities_in_file(&self, file: &Path) -> Vec<&CodeEntity> {
        self.by_file
            .get(file)
            .map(|idx| idx.iter().map(|&i| &self.entities[i]).collect())
            .unwrap_or_default()
    }
}

/// On-disk snapshot format: all codebases, entities only. Lookup tables are
/// rebuilt on load.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    codebases: HashMap<String, Vec<CodeEntity>>,
}

struct StoreInner {
    /// Persistence directory; `None` keeps the store memory-only.
    dir: Option<PathBuf>,
    codebases: DashMap<String, Arc<CodebaseIndex>>,
    /// Per-codebase write serialization.
    write_locks: DashMap<String, Arc<Mutex<()>>>,
    /// The snapshot file is shared by all codebases, so persist + in-memory
    /// commit must be serialized store-wide: concurrent upserts of
    /// different codebases would otherwise race on the write+rename and
    /// silently revert each other's committed entities.
    persist_lock: Mutex<()>,
}

/// Thread-safe entity store. Must be [`initialize`](IndexStore::initialize)d
/// before use; every operation on an uninitialized store fails with
/// [`Error::NotInitialized`].
pub struct IndexStore {
    inner: RwLock<Option<StoreInner>>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Initialize the store. With a directory, a previously persisted
    /// snapshot is loaded and future upserts are persisted there; without
    /// one the store is memory-only.
    pub fn initialize(&self, dir: Option<&Path>) -> Result<()> {
        let codebases = DashMap::new();
        if let Some(dir) = dir {
            fs::create_dir_all(dir)?;
            let path = dir.join(SNAPSHOT_FILE);
            if path.exists() {
                let data = fs::read(&path)?;
                let snapshot: Snapshot = bincode::deserialize(&data)
                    .map_err(|e| Error::TransactionFailed(format!("corrupt snapshot: {e}")))?;
                for (id, entities) in snapshot.codebases {
                    let index = CodebaseIndex::build(&id, entities);
                    codebases.insert(id, Arc::new(index));
                }
            }
        }
        *self.inner.write() = Some(StoreInner {
            dir: dir.map(Path::to_path_buf),
            codebases,
            write_locks: DashMap::new(),
            persist_lock: Mutex::new(()),
        });
        Ok(())
    }

    /// Replace all entities for a codebase atomically.
    ///
    /// The snapshot is persisted before the in-memory swap; if persistence
    /// fails the prior state stays visible and [`Error::TransactionFailed`]
    /// is returned. Returns the number of entities stored.
    pub fn upsert_codebase(&self, codebase_id: &str, entities: Vec<CodeEntity>) -> Result<usize> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotInitialized)?;

        let lock = inner
            .write_locks
            .entry(codebase_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _write_guard = lock.lock();

        let index = Arc::new(CodebaseIndex::build(codebase_id, entities));
        let count = index.entities.len();

        let _persist_guard = inner.persist_lock.lock();
        Self::persist_with(inner, |snapshot| {
            snapshot
                .codebases
                .insert(codebase_id.to_string(), index.entities.clone());
        })?;

        inner.codebases.insert(codebase_id.to_string(), index);
        Ok(count)
    }

    /// Remove a codebase and all of its entities.
    pub fn delete_codebase(&self, codebase_id: &str) -> Result<()> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotInitialized)?;

        let lock = inner
            .write_locks
            .entry(codebase_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _write_guard = lock.lock();

        let _persist_guard = inner.persist_lock.lock();
        Self::persist_with(inner, |snapshot| {
            snapshot.codebases.remove(codebase_id);
        })?;

        inner.codebases.remove(codebase_id);
        Ok(())
    }

    /// Entities whose name matches exactly (case-insensitive).
    pub fn lookup_exact(&self, name: &str, codebase_id: Option<&str>) -> Result<Vec<CodeEntity>> {
        let needle = name.to_lowercase();
        self.collect(codebase_id, |index, out| {
            if let Some(indices) = index.by_name.get(&needle) {
                out.extend(indices.iter().map(|&i| index.entities[i].clone()));
            }
        })
    }

    /// Entities whose name starts with the given prefix (case-insensitive).
    pub fn lookup_prefix(&self, prefix: &str, codebase_id: Option<&str>) -> Result<Vec<CodeEntity>> {
        let needle = prefix.to_lowercase();
        self.collect(codebase_id, |index, out| {
            for (name, indices) in &index.by_name {
                if name.starts_with(&needle) {
                    out.extend(indices.iter().map(|&i| index.entities[i].clone()));
                }
            }
        })
    }

    /// Entities whose content contains the given substring.
    pub fn lookup_substring(
        &self,
        needle: &str,
        codebase_id: Option<&str>,
    ) -> Result<Vec<CodeEntity>> {
        self.collect(codebase_id, |index, out| {
            out.extend(
                index
                    .entities
                    .iter()
                    .filter(|e| e.content.contains(needle))
                    .cloned(),
            );
        })
    }

    /// Consistent read-only snapshots for the requested scope. Each snapshot
    /// is immutable; a concurrent upsert swaps in a new one without
    /// affecting readers holding the old.
    pub fn snapshots(&self, codebase_id: Option<&str>) -> Result<Vec<Arc<CodebaseIndex>>> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotInitialized)?;
        match codebase_id {
            Some(id) => Ok(inner
                .codebases
                .get(id)
                .map(|r| vec![r.value().clone()])
                .unwrap_or_default()),
            None => Ok(inner.codebases.iter().map(|r| r.value().clone()).collect()),
        }
    }

    /// Per-kind entity counts and file totals for one codebase.
    pub fn stats(&self, codebase_id: &str) -> Result<IndexStats> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotInitialized)?;
        Ok(inner
            .codebases
            .get(codebase_id)
            .map(|r| r.stats.clone())
            .unwrap_or_default())
    }

    pub fn codebase_ids(&self) -> Result<Vec<String>> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotInitialized)?;
        let mut ids: Vec<String> = inner.codebases.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }

    fn collect(
        &self,
        codebase_id: Option<&str>,
        f: impl Fn(&CodebaseIndex, &mut Vec<CodeEntity>),
    ) -> Result<Vec<CodeEntity>> {
        let snapshots = self.snapshots(codebase_id)?;
        let mut out = Vec::new();
        for snapshot in snapshots {
            f(&snapshot, &mut out);
        }
        Ok(out)
    }

    /// Apply a mutation to the persisted snapshot, written temp-then-rename
    /// so a failure never corrupts the previous file. Memory-only stores
    /// skip persistence entirely.
    ///
    /// Callers must hold `persist_lock` until their in-memory commit is
    /// done; the snapshot is rebuilt from the in-memory map, so another
    /// writer slipping in between persist and commit would rebuild it
    /// without this writer's entities.
    fn persist_with(inner: &StoreInner, mutate: impl FnOnce(&mut Snapshot)) -> Result<()> {
        let Some(dir) = &inner.dir else {
            return Ok(());
        };

        let mut snapshot = Snapshot::default();
        for entry in inner.codebases.iter() {
            snapshot
                .codebases
                .insert(entry.key().clone(), entry.value().entities.clone());
        }
        mutate(&mut snapshot);

        let data = bincode::serialize(&snapshot)
            .map_err(|e| Error::TransactionFailed(format!("encode snapshot: {e}")))?;
        let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        let path = dir.join(SNAPSHOT_FILE);
        fs::write(&tmp, data)
            .map_err(|e| Error::TransactionFailed(format!("write snapshot: {e}")))?;
        fs::rename(&tmp, &path)
            .map_err(|e| Error::TransactionFailed(format!("commit snapshot: {e}")))?;
        Ok(())
    }
}

impl Default for IndexStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKind;

    fn entity(name: &str, file: &str, start: usize) -> CodeEntity {
        CodeEntity {
            name: name.to_string(),
            kind: EntityKind::Function,
            file_path: PathBuf::from(file),
            start_line: start,
            end_line: start + 3,
            content: format!("fn {name}() {{}}"),
            signature: None,
            codebase_id: None,
        }
    }

    #[test]
    fn uninitialized_store_rejects_operations() {
        let store = IndexStore::new();
        assert!(matches!(
            store.lookup_exact("x", None),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            store.upsert_codebase("cb", Vec::new()),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn upsert_replaces_wholesale() {
        let store = IndexStore::new();
        store.initialize(None).unwrap();

        store
            .upsert_codebase("cb", vec![entity("alpha", "src/a.rs", 1)])
            .unwrap();
        store
            .upsert_codebase("cb", vec![entity("beta", "src/b.rs", 1)])
            .unwrap();

        assert!(store.lookup_exact("alpha", Some("cb")).unwrap().is_empty());
        let found = store.lookup_exact("beta", Some("cb")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].codebase_id.as_deref(), Some("cb"));
    }

    #[test]
    fn lookups_by_prefix_and_substring() {
        let store = IndexStore::new();
        store.initialize(None).unwrap();
        store
            .upsert_codebase(
                "cb",
                vec![
                    entity("parseConfig", "src/a.rs", 1),
                    entity("parseHeader", "src/a.rs", 10),
                    entity("render", "src/b.rs", 1),
                ],
            )
            .unwrap();

        assert_eq!(store.lookup_prefix("parse", Some("cb")).unwrap().len(), 2);
        assert_eq!(store.lookup_exact("PARSECONFIG", Some("cb")).unwrap().len(), 1);
        assert_eq!(
            store.lookup_substring("fn render", Some("cb")).unwrap().len(),
            1
        );
    }

    #[test]
    fn delete_removes_all_rows_and_stats() {
        let store = IndexStore::new();
        store.initialize(None).unwrap();
        store
            .upsert_codebase("cb", vec![entity("alpha", "src/a.rs", 1)])
            .unwrap();
        store.delete_codebase("cb").unwrap();

        assert!(store.lookup_exact("alpha", Some("cb")).unwrap().is_empty());
        let stats = store.stats("cb").unwrap();
        assert_eq!(stats.total_entities, 0);
        assert_eq!(stats.total_files, 0);
    }

    #[test]
    fn duplicate_key_rows_are_collapsed() {
        let store = IndexStore::new();
        store.initialize(None).unwrap();
        store
            .upsert_codebase(
                "cb",
                vec![entity("alpha", "src/a.rs", 1), entity("alpha", "src/a.rs", 1)],
            )
            .unwrap();
        assert_eq!(store.lookup_exact("alpha", Some("cb")).unwrap().len(), 1);
    }

    #[test]
    fn persisted_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = IndexStore::new();
            store.initialize(Some(dir.path())).unwrap();
            store
                .upsert_codebase("cb", vec![entity("alpha", "src/a.rs", 1)])
                .unwrap();
        }
        let store = IndexStore::new();
        store.initialize(Some(dir.path())).unwrap();
        assert_eq!(store.lookup_exact("alpha", Some("cb")).unwrap().len(), 1);
        assert_eq!(store.stats("cb").unwrap().total_entities, 1);
    }

    #[test]
    fn concurrent_upserts_of_different_codebases_all_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(IndexStore::new());
        store.initialize(Some(dir.path())).unwrap();

        let handles: Vec<_> = ["alpha", "beta"]
            .iter()
            .map(|&id| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for round in 0..25 {
                        store
                            .upsert_codebase(id, vec![entity(&format!("{id}_{round}"), "src/a.rs", 1)])
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // The final upsert of each codebase must survive on disk, not just
        // in memory.
        let reopened = IndexStore::new();
        reopened.initialize(Some(dir.path())).unwrap();
        assert_eq!(
            reopened.lookup_exact("alpha_24", Some("alpha")).unwrap().len(),
            1
        );
        assert_eq!(
            reopened.lookup_exact("beta_24", Some("beta")).unwrap().len(),
            1
        );
    }

    #[test]
    fn failed_persist_leaves_prior_state_visible() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new();
        store.initialize(Some(dir.path())).unwrap();
        store
            .upsert_codebase("cb", vec![entity("alpha", "src/a.rs", 1)])
            .unwrap();

        // A directory squatting on the temp path makes the snapshot write
        // fail before the rename.
        let blocker = dir.path().join(format!("{SNAPSHOT_FILE}.tmp"));
        fs::create_dir(&blocker).unwrap();
        let err = store
            .upsert_codebase("cb", vec![entity("beta", "src/b.rs", 1)])
            .unwrap_err();
        assert!(matches!(err, Error::TransactionFailed(_)));

        // In-memory state still shows the last committed entities.
        assert_eq!(store.lookup_exact("alpha", Some("cb")).unwrap().len(), 1);
        assert!(store.lookup_exact("beta", Some("cb")).unwrap().is_empty());

        // And so does the snapshot on disk.
        fs::remove_dir(&blocker).unwrap();
        let reopened = IndexStore::new();
        reopened.initialize(Some(dir.path())).unwrap();
        assert_eq!(reopened.lookup_exact("alpha", Some("cb")).unwrap().len(), 1);
        assert!(reopened.lookup_exact("beta", Some("cb")).unwrap().is_empty());
    }

    #[test]
    fn stats_count_kinds_and_files() {
        let store = IndexStore::new();
        store.initialize(None).unwrap();
        let mut class = entity("Widget", "src/w.rs", 1);
        class.kind = EntityKind::Class;
        store
            .upsert_codebase("cb", vec![entity("alpha", "src/a.rs", 1), class])
            .unwrap();
        let stats = store.stats("cb").unwrap();
        assert_eq!(stats.total_entities, 2);
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.functions, 1);
        assert_eq!(stats.classes, 1);
    }
}
