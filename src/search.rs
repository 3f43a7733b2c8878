//! Entity search over index store snapshots.
//!
//! Three modes share one ranked-result shape: keyword mode scores
//! substring/prefix hits against names and content, fuzzy mode tolerates
//! typos via edit distance, and structural mode matches declaration names
//! only. All scoring weights come from [`SearchConfig`]; the module holds
//! no hidden constants.

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::store::IndexStore;
use crate::types::{CodeEntity, EntityKind, SearchMode, SearchOptions, SearchResult};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Relative weight of each entity kind in keyword ranking. Declarations a
/// reader navigates to (classes, interfaces, functions) outrank incidental
/// rows like imports.
fn kind_weight(kind: EntityKind) -> f64 {
    match kind {
        EntityKind::Class => 0.20,
        EntityKind::Interface => 0.18,
        EntityKind::Function | EntityKind::Method => 0.15,
        EntityKind::TypeAlias => 0.10,
        EntityKind::Variable => 0.08,
        EntityKind::Import => 0.02,
    }
}

pub struct SearchEngine {
    store: Arc<IndexStore>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(store: Arc<IndexStore>, config: SearchConfig) -> Self {
        Self { store, config }
    }

    /// Run a query in the given mode. Results are sorted by descending
    /// score, truncated to `options.max_results`.
    pub fn search(
        &self,
        query: &str,
        mode: SearchMode,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidPattern("empty query".to_string()));
        }

        let snapshots = self.store.snapshots(options.codebase_id.as_deref())?;
        let mut results = Vec::new();

        for snapshot in &snapshots {
            for entity in snapshot.entities() {
                if let Some(kinds) = &options.kind_filter {
                    if !kinds.contains(&entity.kind) {
                        continue;
                    }
                }
                let scored = match mode {
                    SearchMode::Keyword => self.score_keyword(query, entity)?,
                    SearchMode::Fuzzy => self.score_fuzzy(query, entity),
                    SearchMode::Structural => self.score_structural(query, entity),
                };
                if let Some((score, context)) = scored {
                    results.push(SearchResult {
                        name: entity.name.clone(),
                        kind: entity.kind,
                        file_path: entity.file_path.clone(),
                        start_line: entity.start_line,
                        end_line: entity.end_line,
                        score,
                        context,
                    });
                }
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.start_line.cmp(&b.start_line))
        });
        results.truncate(options.max_results);
        Ok(results)
    }

    /// Keyword scoring: each query word contributes its best hit (exact
    /// name, name prefix, content substring); extra matching words add a
    /// co-occurrence boost, and a name containing every word adds more.
    /// Path adjustments run last, then the score is capped at 1.0.
    fn score_keyword(&self, query: &str, entity: &CodeEntity) -> Result<Option<(f64, Option<String>)>> {
        let words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let name_lower = entity.name.to_lowercase();
        let content_lower = entity.content.to_lowercase();

        let mut best_word_score = 0.0f64;
        let mut matched_words = 0usize;
        let mut context = None;
        let mut boundary_hit = false;

        for word in &words {
            let mut word_score = 0.0;
            if name_lower == *word {
                word_score += self.config.exact_name_weight;
            } else if name_lower.starts_with(word.as_str()) {
                word_score += self.config.prefix_weight;
            }
            if content_lower.contains(word.as_str()) {
                word_score += self.config.content_weight;
                if context.is_none() {
                    context = first_matching_line(&entity.content, word);
                }
            }
            if word_score > 0.0 {
                matched_words += 1;
                best_word_score = best_word_score.max(word_score);
                if !boundary_hit && word_boundary_match(word, &name_lower, &content_lower)? {
                    boundary_hit = true;
                }
            }
        }

        if matched_words == 0 {
            return Ok(None);
        }

        let mut score = kind_weight(entity.kind) + best_word_score;
        if matched_words > 1 {
            score += self.config.co_occurrence_boost * (matched_words - 1) as f64;
        }
        // The all-words bonus rewards a name covering a multi-word query;
        // for one word it would double-count the plain substring hit.
        if words.len() > 1 && words.iter().all(|w| name_lower.contains(w.as_str())) {
            score += self.config.all_words_weight;
        }
        if boundary_hit {
            score += self.config.word_boundary_bonus;
        }

        Ok(Some((self.adjust_for_path(score, entity), context)))
    }

    /// Fuzzy scoring: edit distance against the name and against each
    /// content line, accepting matches within the configured fraction of
    /// the query length.
    fn score_fuzzy(&self, query: &str, entity: &CodeEntity) -> Option<(f64, Option<String>)> {
        let query_lower = query.to_lowercase();
        let budget = (self.config.fuzzy_distance_ratio * query_lower.len() as f64).floor() as usize;

        let name_lower = entity.name.to_lowercase();
        let name_distance = strsim::levenshtein(&query_lower, &name_lower);
        if name_distance <= budget {
            let score = edit_score(name_distance, query_lower.len().max(name_lower.len()));
            return Some((self.adjust_for_path(score, entity), None));
        }

        // A query may target a fragment of a line rather than the name;
        // compare against each line's words so long lines don't drown it.
        for line in entity.content.lines() {
            for token in line.split(|c: char| !c.is_alphanumeric() && c != '_') {
                if token.is_empty() {
                    continue;
                }
                let token_lower = token.to_lowercase();
                let distance = strsim::levenshtein(&query_lower, &token_lower);
                if distance <= budget {
                    let score =
                        edit_score(distance, query_lower.len().max(token_lower.len())) * 0.8;
                    return Some((
                        self.adjust_for_path(score, entity),
                        Some(line.trim().to_string()),
                    ));
                }
            }
        }
        None
    }

    /// Structural scoring: names only, no content matching. Used for "find
    /// this declaration" queries where content hits are noise.
    fn score_structural(&self, query: &str, entity: &CodeEntity) -> Option<(f64, Option<String>)> {
        let query_lower = query.to_lowercase();
        let name_lower = entity.name.to_lowercase();

        let base = if name_lower == query_lower {
            self.config.exact_name_weight
        } else if name_lower.starts_with(&query_lower) {
            self.config.prefix_weight
        } else {
            return None;
        };

        let score = kind_weight(entity.kind) + base;
        Some((self.adjust_for_path(score, entity), None))
    }

    /// Path heuristics: boost results under `src/`, damp results in test
    /// trees, then cap at 1.0.
    fn adjust_for_path(&self, mut score: f64, entity: &CodeEntity) -> f64 {
        let path = entity.file_path.to_string_lossy().replace('\\', "/");
        if path.contains("/src/") || path.starts_with("src/") {
            score += self.config.src_path_boost;
        }
        if is_test_path(&path) {
            score *= self.config.test_path_penalty;
        }
        score.min(1.0)
    }
}

fn is_test_path(path: &str) -> bool {
    path.contains("/test/")
        || path.contains("/tests/")
        || path.starts_with("test/")
        || path.starts_with("tests/")
        || path.contains(".test.")
        || path.contains(".spec.")
        || path.contains("_test.")
}

fn word_boundary_match(word: &str, name: &str, content: &str) -> Result<bool> {
    let pattern = format!(r"\b{}\b", regex::escape(word));
    let regex = Regex::new(&pattern).map_err(|e| Error::InvalidPattern(e.to_string()))?;
    Ok(regex.is_match(name) || regex.is_match(content))
}

fn first_matching_line(content: &str, word_lower: &str) -> Option<String> {
    content
        .lines()
        .find(|line| line.to_lowercase().contains(word_lower))
        .map(|line| line.trim().to_string())
}

fn edit_score(distance: usize, max_len: usize) -> f64 {
    if max_len == 0 {
        return 0.0;
    }
    1.0 - distance as f64 / max_len as f64
}

/// Merge results that land on the same (file, line): keeps the highest
/// score when multiple snapshots or query variants hit one declaration.
pub fn dedup_by_location(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut best: HashMap<(std::path::PathBuf, usize), SearchResult> = HashMap::new();
    for result in results {
        let key = (result.file_path.clone(), result.start_line);
        match best.get(&key) {
            Some(existing) if existing.score >= result.score => {}
            _ => {
                best.insert(key, result);
            }
        }
    }
    let mut merged: Vec<SearchResult> = best.into_values().collect();
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| a.start_line.cmp(&b.start_line))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signature;
    use std::path::PathBuf;

    fn entity(name: &str, kind: EntityKind, file: &str, content: &str) -> CodeEntity {
        CodeEntity {
            name: name.to_string(),
            kind,
            file_path: PathBuf::from(file),
            start_line: 1,
            end_line: 1 + content.lines().count(),
            content: content.to_string(),
            signature: Some(Signature::default()),
            codebase_id: None,
        }
    }

    fn engine_with(entities: Vec<CodeEntity>) -> SearchEngine {
        let store = Arc::new(IndexStore::new());
        store.initialize(None).unwrap();
        store.upsert_codebase("cb", entities).unwrap();
        SearchEngine::new(store, SearchConfig::default())
    }

    fn fixture() -> SearchEngine {
        engine_with(vec![
            entity(
                "parseConfig",
                EntityKind::Function,
                "/repo/src/config.ts",
                "export function parseConfig(raw: string): Config {\n    return JSON.parse(raw);\n}",
            ),
            entity(
                "parseConfigTest",
                EntityKind::Function,
                "/repo/test/config.test.ts",
                "function parseConfigTest() {\n    assert(parseConfig(\"{}\"));\n}",
            ),
            entity(
                "ConfigLoader",
                EntityKind::Class,
                "/repo/src/loader.ts",
                "export class ConfigLoader {\n    load() {}\n}",
            ),
            entity(
                "render",
                EntityKind::Function,
                "/repo/src/view.ts",
                "export function render(tree: Node) {\n    // walks config-free\n}",
            ),
        ])
    }

    #[test]
    fn empty_query_is_rejected() {
        let engine = fixture();
        let err = engine
            .search("   ", SearchMode::Keyword, &SearchOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPattern(_)));
    }

    #[test]
    fn source_declaration_outranks_test_double() {
        let engine = fixture();
        let results = engine
            .search("parse config", SearchMode::Keyword, &SearchOptions::default())
            .unwrap();
        let src_pos = results
            .iter()
            .position(|r| r.name == "parseConfig")
            .unwrap();
        let test_pos = results
            .iter()
            .position(|r| r.name == "parseConfigTest")
            .unwrap();
        assert!(src_pos < test_pos);
        assert!(results[src_pos].score > results[test_pos].score);
    }

    #[test]
    fn exact_name_outranks_content_mention() {
        let engine = fixture();
        let results = engine
            .search("parseConfig", SearchMode::Keyword, &SearchOptions::default())
            .unwrap();
        assert_eq!(results[0].name, "parseConfig");
        // "render" mentions nothing relevant and must not appear.
        assert!(results.iter().all(|r| r.name != "render"));
    }

    #[test]
    fn kind_filter_narrows_results() {
        let engine = fixture();
        let options = SearchOptions {
            kind_filter: Some(vec![EntityKind::Class]),
            ..Default::default()
        };
        let results = engine
            .search("config", SearchMode::Keyword, &options)
            .unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.kind == EntityKind::Class));
    }

    #[test]
    fn single_word_query_gets_no_all_words_bonus() {
        let engine = fixture();
        let results = engine
            .search("config", SearchMode::Keyword, &SearchOptions::default())
            .unwrap();
        // ConfigLoader: class weight 0.2 + prefix hit 0.3 + src boost 0.1.
        // The multi-word bonus must not push it higher.
        let loader = results.iter().find(|r| r.name == "ConfigLoader").unwrap();
        assert!(loader.score <= 0.75, "got {}", loader.score);
    }

    #[test]
    fn fuzzy_tolerates_typos_in_names() {
        let engine = fixture();
        let results = engine
            .search("parseConfg", SearchMode::Fuzzy, &SearchOptions::default())
            .unwrap();
        assert!(results.iter().any(|r| r.name == "parseConfig"));
    }

    #[test]
    fn fuzzy_rejects_distant_queries() {
        let engine = fixture();
        let results = engine
            .search("zzz", SearchMode::Fuzzy, &SearchOptions::default())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn structural_ignores_content_hits() {
        let engine = fixture();
        // "config" appears in render's content but not its name.
        let results = engine
            .search("config", SearchMode::Structural, &SearchOptions::default())
            .unwrap();
        assert!(results.iter().all(|r| r.name != "render"));
        assert!(results.iter().any(|r| r.name == "ConfigLoader"));
    }

    #[test]
    fn results_are_truncated_to_max() {
        let entities: Vec<CodeEntity> = (0..50)
            .map(|i| {
                entity(
                    &format!("handler{i}"),
                    EntityKind::Function,
                    &format!("/repo/src/h{i}.rs"),
                    "fn handler() {}",
                )
            })
            .collect();
        let engine = engine_with(entities);
        let options = SearchOptions {
            max_results: 5,
            ..Default::default()
        };
        let results = engine
            .search("handler", SearchMode::Keyword, &options)
            .unwrap();
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn scores_are_capped_and_descending() {
        let engine = fixture();
        let results = engine
            .search("parse config", SearchMode::Keyword, &SearchOptions::default())
            .unwrap();
        assert!(results.iter().all(|r| r.score <= 1.0));
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
