//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in production code outside notice expiry timers
//! - All I/O on the async path goes through tokio
//!
//! The helpers are line-based: they read source text and never parse Rust.

use std::path::{Path, PathBuf};

/// Production source trees, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["connector/core/src", "connector/cli/src"];

/// Workspace root, independent of the directory tests are run from
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// All `.rs` files under `dir` (relative to the workspace root)
#[must_use]
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    if !root.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Code portion of a line, without any trailing `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Kind of function a signature line opens
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FnKind {
    /// `fn`
    Sync,
    /// `async fn`
    Async,
}

/// Classify a line as a function signature, if it is one
///
/// Visibility qualifiers (`pub`, `pub(crate)`, `pub(super)`) are accepted.
#[must_use]
pub fn fn_header(line: &str) -> Option<FnKind> {
    let mut rest = line.trim_start();
    for vis in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(vis) {
            rest = stripped;
            break;
        }
    }

    if rest.starts_with("async fn ") {
        Some(FnKind::Async)
    } else if rest.starts_with("fn ") {
        Some(FnKind::Sync)
    } else {
        None
    }
}

/// Whether a line opens a module or impl block
#[must_use]
pub fn is_block_boundary(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("mod ")
        || line.starts_with("pub mod ")
        || line.starts_with("pub(crate) mod ")
        || (line.starts_with("impl") && line.contains('{'))
}

/// Index and kind of the nearest function signature above `current_idx`
///
/// Stops at module and impl boundaries.
#[must_use]
pub fn enclosing_fn(lines: &[&str], current_idx: usize) -> Option<(usize, FnKind)> {
    for i in (0..current_idx).rev() {
        if let Some(kind) = fn_header(lines[i]) {
            return Some((i, kind));
        }
        if is_block_boundary(lines[i]) {
            return None;
        }
    }
    None
}

/// Whether the line sits inside a test function or a `#[cfg(test)]` module
#[must_use]
pub fn is_in_test_code(lines: &[&str], current_idx: usize) -> bool {
    // Anything after a `#[cfg(test)]` module opener is test code
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();
        if line.starts_with("#[cfg(test)]") {
            let next = lines.get(i + 1).map_or("", |l| l.trim());
            let opens_module = next.starts_with("mod ") || next.starts_with("pub(crate) mod ");
            if opens_module && next.ends_with('{') {
                return true;
            }
        }
    }

    let Some((fn_idx, _)) = enclosing_fn(lines, current_idx) else {
        return false;
    };
    for i in (0..fn_idx).rev() {
        let line = lines[i].trim();
        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }
        if !line.starts_with("#[") && !line.starts_with("///") {
            break;
        }
    }
    false
}

/// True when the path is a whole test-only file (`test_utils.rs`)
#[must_use]
pub fn is_test_only_file(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()) == Some("test_utils.rs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_header_visibility() {
        assert_eq!(fn_header("fn main() {"), Some(FnKind::Sync));
        assert_eq!(fn_header("    pub fn load() -> X {"), Some(FnKind::Sync));
        assert_eq!(fn_header("pub(crate) async fn run() {"), Some(FnKind::Async));
        assert_eq!(fn_header("    async fn attempt("), Some(FnKind::Async));
        assert_eq!(fn_header("let f = |x| x;"), None);
        assert_eq!(fn_header("// fn commented()"), None);
    }

    #[test]
    fn test_enclosing_fn_stops_at_impl() {
        let code = vec![
            "async fn outer() {}",
            "impl Thing {",
            "    let x = std::fs::read(\"a\");",
        ];
        assert_eq!(enclosing_fn(&code, 2), None);
    }

    #[test]
    fn test_cfg_test_module_detected() {
        let code = vec![
            "fn prod() {}",
            "#[cfg(test)]",
            "mod tests {",
            "    fn helper() {",
            "        std::fs::write(\"x\", \"y\").unwrap();",
            "    }",
            "}",
        ];
        assert!(!is_in_test_code(&code, 0));
        assert!(is_in_test_code(&code, 4));
    }

    #[test]
    fn test_cfg_test_module_declaration_is_not_a_block() {
        let code = vec![
            "#[cfg(test)]",
            "pub(crate) mod test_utils;",
            "pub async fn after() {",
            "    std::fs::read(\"a\");",
            "}",
        ];
        assert!(!is_in_test_code(&code, 3));
    }

    #[test]
    fn test_workspace_root_has_manifest() {
        assert!(workspace_root().join("Cargo.toml").exists());
    }
}
