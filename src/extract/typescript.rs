//! TypeScript/TSX entity extraction using tree-sitter.

use super::{entity_for_node, node_text};
use crate::error::Result;
use crate::extract::rust::split_params;
use crate::types::{CodeEntity, EntityKind, Signature};
use std::path::Path;
use tree_sitter::{Node, Tree};

/// Visit declaration nodes and collect entities.
pub fn extract(tree: &Tree, source: &str, file: &Path) -> Result<Vec<CodeEntity>> {
    let mut entities = Vec::new();
    walk(tree.root_node(), source, file, Ctx::default(), &mut entities);
    Ok(entities)
}

#[derive(Clone, Copy, Default)]
struct Ctx {
    in_class: bool,
    in_function: bool,
}

fn walk(node: Node, source: &str, file: &Path, ctx: Ctx, entities: &mut Vec<CodeEntity>) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = field_text(source, node, "name") {
                let signature = function_signature(source, node);
                entities.push(entity_for_node(
                    source,
                    file,
                    node,
                    name,
                    EntityKind::Function,
                    signature,
                ));
            }
            walk_children(node, source, file, Ctx { in_function: true, ..ctx }, entities);
            return;
        }
        "method_definition" => {
            if let Some(name) = field_text(source, node, "name") {
                let signature = function_signature(source, node);
                entities.push(entity_for_node(
                    source,
                    file,
                    node,
                    name,
                    EntityKind::Method,
                    signature,
                ));
            }
            walk_children(node, source, file, Ctx { in_function: true, ..ctx }, entities);
            return;
        }
        "class_declaration" | "abstract_class_declaration" => {
            if let Some(name) = field_text(source, node, "name") {
                entities.push(entity_for_node(
                    source,
                    file,
                    node,
                    name,
                    EntityKind::Class,
                    None,
                ));
            }
            walk_children(node, source, file, Ctx { in_class: true, ..ctx }, entities);
            return;
        }
        "interface_declaration" => {
            if let Some(name) = field_text(source, node, "name") {
                entities.push(entity_for_node(
                    source,
                    file,
                    node,
                    name,
                    EntityKind::Interface,
                    None,
                ));
            }
        }
        "type_alias_declaration" => {
            if let Some(name) = field_text(source, node, "name") {
                entities.push(entity_for_node(
                    source,
                    file,
                    node,
                    name,
                    EntityKind::TypeAlias,
                    None,
                ));
            }
        }
        "enum_declaration" => {
            if let Some(name) = field_text(source, node, "name") {
                entities.push(entity_for_node(
                    source,
                    file,
                    node,
                    name,
                    EntityKind::Class,
                    None,
                ));
            }
        }
        "variable_declarator" => {
            let name = field_text(source, node, "name");
            let value = node.child_by_field_name("value");
            if let Some(name) = name {
                // `const f = () => ...` declares a function; anything else
                // at module level is a plain variable.
                let kind = match value.map(|v| v.kind()) {
                    Some("arrow_function") | Some("function_expression") | Some("function") => {
                        Some(EntityKind::Function)
                    }
                    // Locals inside functions and class field initializers
                    // are not addressable module entities.
                    _ if ctx.in_function || ctx.in_class => None,
                    _ => Some(EntityKind::Variable),
                };
                if let Some(kind) = kind {
                    entities.push(entity_for_node(source, file, node, name, kind, None));
                }
            }
        }
        "import_statement" => {
            let name = node
                .child_by_field_name("source")
                .map(|n| strip_quotes(node_text(source, n)))
                .unwrap_or_else(|| "import".to_string());
            entities.push(entity_for_node(
                source,
                file,
                node,
                name,
                EntityKind::Import,
                None,
            ));
        }
        _ => {}
    }

    walk_children(node, source, file, ctx, entities);
}

fn walk_children(node: Node, source: &str, file: &Path, ctx: Ctx, entities: &mut Vec<CodeEntity>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, file, ctx, entities);
    }
}

fn field_text(source: &str, node: Node, field: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(source, n).to_string())
}

fn function_signature(source: &str, node: Node) -> Option<Signature> {
    let params_node = node.child_by_field_name("parameters")?;
    let params = split_params(node_text(source, params_node));
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| node_text(source, n).trim_start_matches(':').trim().to_string());
    Some(Signature {
        params,
        return_type,
    })
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{EntityExtractor, Language, StructuralExtractor};

    fn extract_src(source: &str) -> Vec<CodeEntity> {
        StructuralExtractor::new(Language::TypeScript)
            .extract(source, Path::new("app.ts"))
            .unwrap()
    }

    #[test]
    fn declarations_across_kinds() {
        let source = r#"
import { readFile } from "fs";

export interface Config {
    root: string;
}

type Handler = (e: Event) => void;

export class Service {
    private cache: Map<string, string> = new Map();

    async lookup(key: string): Promise<string> {
        return this.cache.get(key) ?? "";
    }
}

export function parseConfig(raw: string): Config {
    return JSON.parse(raw);
}

const normalize = (s: string) => s.trim();
"#;
        let entities = extract_src(source);
        let names: Vec<(&str, EntityKind)> = entities
            .iter()
            .map(|e| (e.name.as_str(), e.kind))
            .collect();

        assert!(names.contains(&("fs", EntityKind::Import)));
        assert!(names.contains(&("Config", EntityKind::Interface)));
        assert!(names.contains(&("Handler", EntityKind::TypeAlias)));
        assert!(names.contains(&("Service", EntityKind::Class)));
        assert!(names.contains(&("lookup", EntityKind::Method)));
        assert!(names.contains(&("parseConfig", EntityKind::Function)));
        assert!(names.contains(&("normalize", EntityKind::Function)));
    }

    #[test]
    fn signature_for_ts_function() {
        let entities = extract_src("function add(a: number, b: number): number { return a + b; }");
        let add = entities.iter().find(|e| e.name == "add").unwrap();
        let sig = add.signature.as_ref().unwrap();
        assert_eq!(sig.params, vec!["a: number", "b: number"]);
        assert_eq!(sig.return_type.as_deref(), Some("number"));
    }

    #[test]
    fn module_level_const_is_a_variable() {
        let entities = extract_src("const LIMIT = 10;");
        assert!(entities
            .iter()
            .any(|e| e.name == "LIMIT" && e.kind == EntityKind::Variable));
    }

    #[test]
    fn line_ranges_cover_bodies() {
        let entities = extract_src("function f() {\n  one();\n  two();\n}\n");
        let f = entities.iter().find(|e| e.name == "f").unwrap();
        assert_eq!(f.start_line, 1);
        assert_eq!(f.end_line, 4);
    }
}
