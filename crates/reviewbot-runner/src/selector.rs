use std::collections::HashSet;
use std::path::Path;

use reviewbot_core::DiffChange;

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "kt", "go", "rb", "rs", "swift", "c", "h", "cc", "cpp",
    "hpp", "cs", "php", "scala", "sql", "sh", "bash", "zsh", "yaml", "yml", "json", "toml", "ini",
    "cfg", "dockerfile",
];

const CODE_FILE_NAMES: &[&str] = &["Dockerfile", "Makefile", "CMakeLists.txt"];

pub fn is_code_file(path: &str) -> bool {
    let p = Path::new(path);
    if let Some(name) = p.file_name().and_then(|n| n.to_str()) {
        if CODE_FILE_NAMES.contains(&name) {
            return true;
        }
    }
    p.extension()
        .and_then(|e| e.to_str())
        .map(|e| CODE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Code files touched by `changes`, in order, without deletions or duplicates, at most `max_files`.
pub fn collect_candidate_paths(changes: &[DiffChange], max_files: usize) -> Vec<String> {
    let mut out = Vec::new();
    if max_files == 0 {
        return out;
    }
    let mut seen = HashSet::new();
    for change in changes {
        if change.deleted_file {
            continue;
        }
        let Some(path) = change.current_path() else { continue };
        if !is_code_file(path) || !seen.insert(path.to_string()) {
            continue;
        }
        out.push(path.to_string());
        if out.len() >= max_files {
            break;
        }
    }
    out
}

/// Clip to `max_chars` characters. The flag is true when anything was cut.
pub fn truncate_text(content: &str, max_chars: usize) -> (String, bool) {
    if max_chars == 0 {
        return (String::new(), !content.is_empty());
    }
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => (content[..cut].to_string(), true),
        None => (content.to_string(), false),
    }
}
