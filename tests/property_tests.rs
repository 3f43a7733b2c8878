//! Property-based tests for the code-intelligence core.
//!
//! Uses proptest to generate random inputs and verify invariants hold.

use codeintel::config::{SegmenterConfig, SimilarityWeights};
use codeintel::segment::{normalize_line, segment_fixed, segment_variable};
use codeintel::similarity::similarity;
use codeintel::store::IndexStore;
use codeintel::types::{CodeBlock, CodeEntity, EntityKind, MatchType};
use proptest::prelude::*;
use std::path::{Path, PathBuf};

// ============================================================================
// Strategies for generating test data
// ============================================================================

/// Generate valid lowercase identifiers
fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,16}".prop_filter("must be valid identifier", |s| {
        !s.is_empty()
            && ![
                "fn", "let", "mut", "pub", "struct", "enum", "impl", "trait", "use", "mod",
                "const", "static", "if", "else", "for", "while", "loop", "return", "type",
            ]
            .contains(&s.as_str())
    })
}

/// Generate plausible statement lines
fn statement_line() -> impl Strategy<Value = String> {
    prop_oneof![
        (identifier(), identifier()).prop_map(|(a, b)| format!("let {a} = {b}();")),
        (identifier(), 0u32..100).prop_map(|(a, n)| format!("{a} += {n};")),
        identifier().prop_map(|a| format!("if {a} {{ return; }}")),
        (identifier(), identifier()).prop_map(|(a, b)| format!("{a}.push({b});")),
        identifier().prop_map(|a| format!("for item in {a} {{")),
        Just("}".to_string()),
    ]
}

/// Generate a function-ish body of 5 to 40 lines
fn code_body() -> impl Strategy<Value = String> {
    prop::collection::vec(statement_line(), 5..40).prop_map(|lines| lines.join("\n"))
}

/// Generate a comparison block directly from generated content
fn code_block() -> impl Strategy<Value = CodeBlock> {
    code_body().prop_map(|content| block_of(&content, "gen.rs", 1))
}

fn block_of(content: &str, file: &str, start: usize) -> CodeBlock {
    // Segment the whole content as one window to get tokens and hash.
    let lines = content.lines().count().max(1);
    let config = SegmenterConfig {
        min_block_lines: lines,
        max_block_lines: lines,
        significant_ratio: 0.0,
        ..Default::default()
    };
    segment_fixed(content, Path::new(file), &config)
        .into_iter()
        .next()
        .unwrap_or(CodeBlock {
            file_path: PathBuf::from(file),
            start_line: start,
            end_line: start + content.lines().count().saturating_sub(1),
            content: content.to_string(),
            tokens: Vec::new(),
            content_hash: 0,
        })
}

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

// ============================================================================
// Similarity properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: a block is always an exact match with itself
    #[test]
    fn similarity_identity(block in code_block()) {
        let weights = SimilarityWeights::default();
        let score = similarity(&block, &block, &weights);
        prop_assert!(score.hash_exact);
        prop_assert_eq!(score.score, 1.0);
        prop_assert_eq!(score.match_type, MatchType::Exact);
    }

    /// Property: similarity is symmetric
    #[test]
    fn similarity_symmetric(a in code_block(), b in code_block()) {
        let weights = SimilarityWeights::default();
        let ab = similarity(&a, &b, &weights);
        let ba = similarity(&b, &a, &weights);
        prop_assert!((ab.score - ba.score).abs() < 1e-9);
        prop_assert_eq!(ab.match_type, ba.match_type);
    }

    /// Property: scores stay within [0, 1]
    #[test]
    fn similarity_bounded(a in code_block(), b in code_block()) {
        let weights = SimilarityWeights::default();
        let score = similarity(&a, &b, &weights);
        prop_assert!(score.score >= 0.0);
        prop_assert!(score.score <= 1.0);
        prop_assert!(score.token_jaccard >= 0.0 && score.token_jaccard <= 1.0);
        prop_assert!(score.edit_similarity >= 0.0 && score.edit_similarity <= 1.0);
    }

    /// Property: weight normalization makes scaled weights equivalent
    #[test]
    fn similarity_weights_scale_invariant(a in code_block(), b in code_block()) {
        let unit = SimilarityWeights::default();
        let scaled = SimilarityWeights {
            token: unit.token * 3.0,
            edit: unit.edit * 3.0,
            structural: unit.structural * 3.0,
            ..unit
        };
        let one = similarity(&a, &b, &unit);
        let three = similarity(&a, &b, &scaled);
        prop_assert!((one.score - three.score).abs() < 1e-9);
    }
}

// ============================================================================
// Segmentation properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: every window respects the configured size bounds and stays
    /// within the file
    #[test]
    fn segment_windows_within_bounds(content in code_body()) {
        let config = SegmenterConfig::default();
        let total = content.lines().count();
        for block in segment_variable(&content, Path::new("gen.rs"), &config) {
            prop_assert!(block.start_line >= 1);
            prop_assert!(block.end_line <= total);
            prop_assert!(block.line_count() >= config.min_block_lines);
            prop_assert!(block.line_count() <= config.max_block_lines);
        }
    }

    /// Property: identical content yields identical hashes regardless of
    /// file or position
    #[test]
    fn segment_hash_is_content_only(content in code_body()) {
        let a = block_of(&content, "a.rs", 1);
        let b = block_of(&content, "b.rs", 100);
        prop_assert_eq!(a.content_hash, b.content_hash);
        prop_assert_eq!(a.tokens, b.tokens);
    }

    /// Property: normalization is case-insensitive and idempotent
    #[test]
    fn normalize_line_case_insensitive(line in "[ -~]{0,60}") {
        let lower = normalize_line(&line.to_lowercase(), true);
        let upper = normalize_line(&line.to_uppercase(), true);
        prop_assert_eq!(&lower, &upper);
        prop_assert_eq!(normalize_line(&lower, true), lower);
    }
}

// ============================================================================
// Store properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: an upserted entity is always findable by exact name
    #[test]
    fn store_upsert_then_lookup(names in prop::collection::hash_set(identifier(), 1..20)) {
        let store = IndexStore::new();
        store.initialize(None).unwrap();
        let entities: Vec<CodeEntity> = names
            .iter()
            .enumerate()
            .map(|(i, name)| entity(name, "src/gen.rs", i * 10 + 1))
            .collect();
        let count = store.upsert_codebase("cb", entities).unwrap();
        prop_assert_eq!(count, names.len());
        for name in &names {
            let found = store.lookup_exact(name, Some("cb")).unwrap();
            prop_assert_eq!(found.len(), 1);
            prop_assert_eq!(found[0].codebase_id.as_deref(), Some("cb"));
        }
    }

    /// Property: re-upserting replaces wholesale, never accumulates
    #[test]
    fn store_upsert_replaces(
        first in prop::collection::hash_set(identifier(), 1..10),
        second in prop::collection::hash_set(identifier(), 1..10),
    ) {
        let store = IndexStore::new();
        store.initialize(None).unwrap();
        let build = |names: &std::collections::HashSet<String>| -> Vec<CodeEntity> {
            names
                .iter()
                .enumerate()
                .map(|(i, name)| entity(name, "src/gen.rs", i * 10 + 1))
                .collect()
        };
        store.upsert_codebase("cb", build(&first)).unwrap();
        store.upsert_codebase("cb", build(&second)).unwrap();

        let stats = store.stats("cb").unwrap();
        prop_assert_eq!(stats.total_entities, second.len());
        for name in first.difference(&second) {
            prop_assert!(store.lookup_exact(name, Some("cb")).unwrap().is_empty());
        }
    }
}
