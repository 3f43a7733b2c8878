//! Block segmenter.
//!
//! Turns one source file into overlapping [`CodeBlock`] candidates for
//! similarity comparison. Windows whose significant-line ratio (non-blank,
//! non-comment lines over total lines) falls below the configured floor are
//! dropped, which bounds the candidate set before the similarity engine runs.

use crate::config::SegmenterConfig;
use crate::types::CodeBlock;
use std::path::Path;

/// Produce all fixed-size windows of `min_block_lines` lines.
///
/// Used for index-wide duplicate scans where a single window size keeps the
/// candidate set comparable across files.
pub fn segment_fixed(content: &str, file: &Path, config: &SegmenterConfig) -> Vec<CodeBlock> {
    segment(content, file, config, false)
}

/// Produce windows of every length in `min_block_lines..=max_block_lines`.
///
/// Used for single-file and file-pair analysis where variable-size windows
/// catch duplicated regions longer than the minimum.
pub fn segment_variable(content: &str, file: &Path, config: &SegmenterConfig) -> Vec<CodeBlock> {
    segment(content, file, config, true)
}

fn segment(content: &str, file: &Path, config: &SegmenterConfig, variable: bool) -> Vec<CodeBlock> {
    let k = config.min_block_lines.max(2);

    // Cheap bail-out before any per-line work.
    let newline_count = bytecount::count(content.as_bytes(), b'\n');
    if newline_count + 1 < k {
        return Vec::new();
    }

    let lines: Vec<&str> = content.lines().collect();
    let k_max = if variable {
        config.max_block_lines.max(k).min(lines.len())
    } else {
        k
    };

    let mut blocks = Vec::new();
    for width in k..=k_max {
        if width > lines.len() {
            break;
        }
        for start in 0..=(lines.len() - width) {
            let window = &lines[start..start + width];
            if let Some(block) = build_block(window, file, start + 1, config) {
                blocks.push(block);
            }
        }
    }
    blocks
}

/// Build a block for one window, or `None` if the window is mostly blank
/// or comment lines.
fn build_block(
    window: &[&str],
    file: &Path,
    start_line: usize,
    config: &SegmenterConfig,
) -> Option<CodeBlock> {
    let significant: Vec<&str> = window
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !is_comment_line(l))
        .collect();

    let ratio = significant.len() as f64 / window.len() as f64;
    if ratio < config.significant_ratio {
        return None;
    }

    let mut tokens = Vec::new();
    let mut hash: u64 = 0xcbf29ce484222325;
    for line in &significant {
        let normalized = normalize_line(line, config.collapse_numbers);
        for byte in normalized.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash ^= b'\n' as u64;
        hash = hash.wrapping_mul(0x100000001b3);
        tokens.extend(normalized.split(' ').map(str::to_string));
    }

    Some(CodeBlock {
        file_path: file.to_path_buf(),
        start_line,
        end_line: start_line + window.len() - 1,
        content: window.join("\n"),
        tokens,
        content_hash: hash,
    })
}

/// Tokenize and case-fold one line: delimiters become separators, numeric
/// literals optionally collapse to `0`.
pub fn normalize_line(line: &str, collapse_numbers: bool) -> String {
    let mut out = Vec::new();
    for raw in line.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if raw.is_empty() {
            continue;
        }
        if collapse_numbers && raw.chars().all(|c| c.is_ascii_digit()) {
            out.push("0".to_string());
        } else {
            out.push(raw.to_lowercase());
        }
    }
    out.join(" ")
}

/// Whether a trimmed line is comment-only.
pub fn is_comment_line(trimmed: &str) -> bool {
    trimmed.starts_with("//")
        || trimmed.starts_with('#')
        || trimmed.starts_with("/*")
        || trimmed.starts_with("* ")
        || trimmed == "*"
        || trimmed.starts_with("*/")
        || trimmed.starts_with("--")
}
