//! Entity extraction from source files.
//!
//! Two extractor variants are tried in sequence: the structural path parses
//! the file with tree-sitter and visits declaration nodes; when structural
//! parsing fails, a lexical line-pattern fallback runs instead. The
//! fallback is permanent, not a stopgap: production codebases always
//! contain some unparsable files, and indexing must degrade per-file rather
//! than fail the run.

pub mod lexical;
pub mod rust;
pub mod typescript;

use crate::error::{Error, Result, Warning};
use crate::types::CodeEntity;
use std::path::Path;

/// Language hint for extraction, usually derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    TypeScript,
    Tsx,
    /// No structural grammar available; extraction is lexical-only.
    Unknown,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        Self::from_hint(&ext)
    }

    pub fn from_hint(hint: &str) -> Self {
        match hint {
            "rs" | "rust" => Self::Rust,
            "ts" | "mts" | "cts" | "typescript" | "js" | "mjs" | "cjs" | "javascript" => {
                Self::TypeScript
            }
            "tsx" | "jsx" => Self::Tsx,
            _ => Self::Unknown,
        }
    }
}

/// A strategy for turning one file's content into entities.
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, content: &str, file: &Path) -> Result<Vec<CodeEntity>>;
}

/// Structural extractor backed by a tree-sitter grammar.
pub struct StructuralExtractor {
    language: Language,
}

impl StructuralExtractor {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

impl EntityExtractor for StructuralExtractor {
    fn extract(&self, content: &str, file: &Path) -> Result<Vec<CodeEntity>> {
        let grammar: tree_sitter::Language = match self.language {
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::Unknown => {
                return Err(Error::ParseFailed {
                    path: file.to_path_buf(),
                    reason: "no structural grammar for this language".to_string(),
                });
            }
        };

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| Error::ParseFailed {
                path: file.to_path_buf(),
                reason: e.to_string(),
            })?;

        let tree = parser.parse(content, None).ok_or_else(|| Error::ParseFailed {
            path: file.to_path_buf(),
            reason: "parser produced no tree".to_string(),
        })?;

        if tree.root_node().kind() == "ERROR" {
            return Err(Error::ParseFailed {
                path: file.to_path_buf(),
                reason: "file is not valid syntax for its language".to_string(),
            });
        }

        let entities = match self.language {
            Language::Rust => rust::extract(&tree, content, file)?,
            Language::TypeScript | Language::Tsx => typescript::extract(&tree, content, file)?,
            Language::Unknown => unreachable!(),
        };

        // Tree-sitter is error-tolerant: a file of garbage still parses to
        // a root full of error nodes. An errored tree that yielded no
        // declarations is treated as unparsable so the lexical fallback
        // gets a chance.
        if entities.is_empty() && tree.root_node().has_error() {
            return Err(Error::ParseFailed {
                path: file.to_path_buf(),
                reason: "no declarations parsed".to_string(),
            });
        }

        Ok(entities)
    }
}

/// Extract entities from one file, structural first with lexical fallback.
///
/// Pure function of the input text: no I/O, safe to call concurrently.
/// Returns the entities plus a warning when the structural path failed and
/// the fallback ran.
pub fn extract_entities(
    content: &str,
    file: &Path,
    language: Language,
) -> (Vec<CodeEntity>, Option<Warning>) {
    if language != Language::Unknown {
        match StructuralExtractor::new(language).extract(content, file) {
            Ok(entities) => return (entities, None),
            Err(e) => {
                tracing::debug!("structural parse failed for {}: {}", file.display(), e);
                let warning = Warning::parse_failed(file, e.to_string());
                let entities = lexical::LexicalExtractor::new()
                    .extract(content, file)
                    .unwrap_or_default();
                return (entities, Some(warning));
            }
        }
    }

    // Unknown languages go straight to the lexical path; that is expected,
    // not a degradation worth warning about.
    let entities = lexical::LexicalExtractor::new()
        .extract(content, file)
        .unwrap_or_default();
    (entities, None)
}

// Shared helpers for the tree-sitter extractors.

pub(crate) fn node_text<'a>(source: &'a str, node: tree_sitter::Node) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

pub(crate) fn entity_for_node(
    source: &str,
    file: &Path,
    node: tree_sitter::Node,
    name: String,
    kind: crate::types::EntityKind,
    signature: Option<crate::types::Signature>,
) -> CodeEntity {
    CodeEntity {
        name,
        kind,
        file_path: file.to_path_buf(),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        content: node_text(source, node).to_string(),
        signature,
        codebase_id: None,
    }
}
