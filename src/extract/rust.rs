//! Rust entity extraction using tree-sitter.

use super::{entity_for_node, node_text};
use crate::error::Result;
use crate::types::{CodeEntity, EntityKind, Signature};
use std::path::Path;
use tree_sitter::{Node, Tree};

/// Visit declaration nodes and collect entities.
pub fn extract(tree: &Tree, source: &str, file: &Path) -> Result<Vec<CodeEntity>> {
    let mut entities = Vec::new();
    walk(tree.root_node(), source, file, false, &mut entities);
    Ok(entities)
}

fn walk(node: Node, source: &str, file: &Path, in_impl: bool, entities: &mut Vec<CodeEntity>) {
    match node.kind() {
        // `function_signature_item` is a bodiless declaration: trait
        // methods and extern-block functions.
        "function_item" | "function_signature_item" => {
            if let Some(name) = field_text(source, node, "name") {
                let kind = if in_impl {
                    EntityKind::Method
                } else {
                    EntityKind::Function
                };
                let signature = function_signature(source, node);
                entities.push(entity_for_node(source, file, node, name, kind, signature));
            }
        }
        "struct_item" | "enum_item" | "union_item" => {
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
        "trait_item" => {
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
            // Default trait methods are declarations too.
            walk_children(node, source, file, true, entities);
            return;
        }
        "type_item" => {
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
        "const_item" | "static_item" => {
            if let Some(name) = field_text(source, node, "name") {
                entities.push(entity_for_node(
                    source,
                    file,
                    node,
                    name,
                    EntityKind::Variable,
                    None,
                ));
            }
        }
        "use_declaration" => {
            let text = node_text(source, node);
            let name = last_path_segment(text);
            entities.push(entity_for_node(
                source,
                file,
                node,
                name,
                EntityKind::Import,
                None,
            ));
        }
        "impl_item" => {
            walk_children(node, source, file, true, entities);
            return;
        }
        _ => {}
    }

    walk_children(node, source, file, in_impl, entities);
}

fn walk_children(node: Node, source: &str, file: &Path, in_impl: bool, entities: &mut Vec<CodeEntity>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, file, in_impl, entities);
    }
}

fn field_text(source: &str, node: Node, field: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(source, n).to_string())
}

fn function_signature(source: &str, node: Node) -> Option<Signature> {
    let params_node = node.child_by_field_name("parameters")?;
    let params_text = node_text(source, params_node);
    let params = split_params(params_text);
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| node_text(source, n).trim().to_string());
    Some(Signature {
        params,
        return_type,
    })
}

/// Split a parenthesized parameter list on top-level commas, so generic
/// arguments like `HashMap<K, V>` stay intact.
pub(crate) fn split_params(params_text: &str) -> Vec<String> {
    let inner = params_text
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let mut params = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                let p = current.trim();
                if !p.is_empty() {
                    params.push(p.to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    let p = current.trim();
    if !p.is_empty() {
        params.push(p.to_string());
    }
    params
}

fn last_path_segment(use_text: &str) -> String {
    let trimmed = use_text
        .trim_end_matches(';')
        .trim()
        .trim_start_matches("pub ")
        .trim_start_matches("use ")
        .trim();
    let tail = trimmed.rsplit("::").next().unwrap_or(trimmed);
    tail.trim_matches(|c| c == '{' || c == '}' || c == '*' || c == ' ')
        .split(" as ")
        .last()
        .unwrap_or(tail)
        .to_string()
}
