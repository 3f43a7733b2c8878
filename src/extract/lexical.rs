//! Lexical fallback extractor.
//!
//! Line-oriented pattern matching that recognizes common declaration shapes
//! when structural parsing is unavailable or rejects the file. Coverage is
//! deliberately coarse: names and start lines are reliable, end lines come
//! from brace balancing or indentation and are best-effort.

use super::EntityExtractor;
use crate::error::Result;
use crate::types::{CodeEntity, EntityKind};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static PATTERNS: LazyLock<Vec<(Regex, EntityKind)>> = LazyLock::new(|| {
    let table: &[(&str, EntityKind)] = &[
        // Rust / C-family functions
        (
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(\w+)",
            EntityKind::Function,
        ),
        // JS/TS functions
        (
            r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(\w+)",
            EntityKind::Function,
        ),
        // Python functions
        (r"^\s*(?:async\s+)?def\s+(\w+)", EntityKind::Function),
        // Arrow-function bindings
        (
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(\w+)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|\w+)\s*=>",
            EntityKind::Function,
        ),
        // Classes (JS/TS/Python) and Rust structs/enums
        (
            r"^\s*(?:export\s+)?(?:abstract\s+)?class\s+(\w+)",
            EntityKind::Class,
        ),
        (
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|union)\s+(\w+)",
            EntityKind::Class,
        ),
        // Interfaces and traits
        (
            r"^\s*(?:export\s+)?interface\s+(\w+)",
            EntityKind::Interface,
        ),
        (
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+(\w+)",
            EntityKind::Interface,
        ),
        // Type aliases
        (
            r"^\s*(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?type\s+(\w+)\s*=",
            EntityKind::TypeAlias,
        ),
        // Imports: capture the module path or first imported name
        (r#"^\s*import\s+.*?["']([^"']+)["']"#, EntityKind::Import),
        (r"^\s*(?:pub\s+)?use\s+([\w:]+)", EntityKind::Import),
        (r"^\s*from\s+[\w.]+\s+import\s+(\w+)", EntityKind::Import),
        // Module-level constants
        (
            r"^(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:const|static)\s+(\w+)",
            EntityKind::Variable,
        ),
    ];
    table
        .iter()
        .map(|(pattern, kind)| {
            let regex = Regex::new(pattern).unwrap_or_else(|e| {
                unreachable!("declaration pattern failed to compile: {e}")
            });
            (regex, *kind)
        })
        .collect()
});

/// Extractor of last resort: pure text patterns, no syntax tree.
pub struct LexicalExtractor;

impl LexicalExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LexicalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor for LexicalExtractor {
    fn extract(&self, content: &str, file: &Path) -> Result<Vec<CodeEntity>> {
        let lines: Vec<&str> = content.lines().collect();
        let mut entities = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let Some((name, kind)) = match_declaration(line) else {
                continue;
            };
            let start_line = i + 1;
            let end_line = find_block_end(&lines, i);
            entities.push(CodeEntity {
                name,
                kind,
                file_path: file.to_path_buf(),
                start_line,
                end_line,
                content: lines[i..end_line].join("\n"),
                signature: None,
                codebase_id: None,
            });
        }

        Ok(entities)
    }
}

fn match_declaration(line: &str) -> Option<(String, EntityKind)> {
    for (regex, kind) in PATTERNS.iter() {
        if let Some(captures) = regex.captures(line) {
            if let Some(name) = captures.get(1) {
                let name = name.as_str();
                // Imports keep only the last path segment.
                let name = if *kind == EntityKind::Import {
                    name.rsplit(|c| c == ':' || c == '.' || c == '/')
                        .next()
                        .unwrap_or(name)
                } else {
                    name
                };
                return Some((name.to_string(), *kind));
            }
        }
    }
    None
}

/// Best-effort end line: balance braces from the declaration line, or for
/// colon-terminated (Python-style) declarations scan to the end of the
/// indented suite. Declarations with neither end on their own line.
fn find_block_end(lines: &[&str], decl_idx: usize) -> usize {
    let decl = lines[decl_idx];

    if decl.contains('{') {
        let mut depth = 0i64;
        for (j, line) in lines.iter().enumerate().skip(decl_idx) {
            depth += line.matches('{').count() as i64;
            depth -= line.matches('}').count() as i64;
            if depth <= 0 && j > decl_idx || (depth == 0 && line.contains('}')) {
                return j + 1;
            }
        }
        return lines.len();
    }

    if decl.trim_end().ends_with(':') {
        let indent = leading_spaces(decl);
        let mut last = decl_idx;
        for (j, line) in lines.iter().enumerate().skip(decl_idx + 1) {
            if line.trim().is_empty() {
                continue;
            }
            if leading_spaces(line) <= indent {
                break;
            }
            last = j;
        }
        return last + 1;
    }

    decl_idx + 1
}

fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str) -> Vec<CodeEntity> {
        LexicalExtractor::new()
            .extract(content, Path::new("mixed.src"))
            .unwrap()
    }

    #[test]
    fn recognizes_rust_shapes() {
        let entities = extract(
            "pub struct Point { x: f64 }\npub fn dist(a: Point) -> f64 {\n    a.x\n}\nuse std::fmt::Display;\n",
        );
        assert!(entities
            .iter()
            .any(|e| e.name == "Point" && e.kind == EntityKind::Class));
        assert!(entities
            .iter()
            .any(|e| e.name == "dist" && e.kind == EntityKind::Function));
        assert!(entities
            .iter()
            .any(|e| e.name == "Display" && e.kind == EntityKind::Import));
    }

    #[test]
    fn recognizes_python_shapes() {
        let entities = extract(
            "from os import path\n\nclass Walker:\n    def step(self):\n        return 1\n\ndef main():\n    pass\n",
        );
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"path"));
        assert!(names.contains(&"Walker"));
        assert!(names.contains(&"step"));
        assert!(names.contains(&"main"));
    }

    #[test]
    fn brace_balancing_finds_end_line() {
        let entities = extract("fn outer() {\n    if x {\n        y();\n    }\n}\nfn after() {}\n");
        let outer = entities.iter().find(|e| e.name == "outer").unwrap();
        assert_eq!(outer.start_line, 1);
        assert_eq!(outer.end_line, 5);
        let after = entities.iter().find(|e| e.name == "after").unwrap();
        assert_eq!(after.end_line, 6);
    }

    #[test]
    fn python_suite_end_by_indentation() {
        let entities = extract("def f():\n    a = 1\n    return a\n\nx = 2\n");
        let f = entities.iter().find(|e| e.name == "f").unwrap();
        assert_eq!(f.start_line, 1);
        assert_eq!(f.end_line, 3);
    }

    #[test]
    fn arrow_functions_and_consts() {
        let entities = extract("export const fmt = (s: string) => s.trim();\nconst LIMIT = 5;\n");
        assert!(entities
            .iter()
            .any(|e| e.name == "fmt" && e.kind == EntityKind::Function));
        assert!(entities
            .iter()
            .any(|e| e.name == "LIMIT" && e.kind == EntityKind::Variable));
    }

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(extract("This file is a README.\nNothing declarative here.\n").is_empty());
    }
}
