//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async code in the connector MUST NOT use blocking I/O.
//! **Required**: Use `tokio::fs`, `tokio::io`, `reqwest` (async), or move the
//! work onto `tokio::task::spawn_blocking`.

use std::fs;
use std::path::Path;

use architectural_enforcement::{
    code_part, enclosing_fn, is_in_test_code, is_test_only_file, rust_files, FnKind,
    PRODUCTION_DIRS,
};

/// Test that production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n❌ FORBIDDEN blocking I/O:");
        eprintln!("  - std::fs::read(), std::fs::write(), std::fs::File");
        eprintln!("  - std::net::TcpStream, std::net::TcpListener");
        eprintln!("  - std::process::Command::output()");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("  - std::io::stdin() inside async functions");
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs::read_to_string().await");
        eprintln!("  - tokio::io::stdin() with AsyncReadExt");
        eprintln!("  - reqwest::Client::get().send().await");
        eprintln!("\n✅ ACCEPTABLE blocking I/O:");
        eprintln!("  - Non-async functions (run via spawn_blocking from async callers)");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Find all blocking I/O calls in production code
fn find_blocking_io_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for path in rust_files(dir) {
            check_file(&path, &mut violations);
        }
    }

    violations
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    if is_test_only_file(path) {
        return;
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return,
    };

    let lines: Vec<&str> = content.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        if let Some(reason) = blocking_io_violation(&lines, idx) {
            violations.push(format!(
                "{}:{} - {}: {}",
                path.display(),
                idx + 1,
                reason,
                line.trim()
            ));
        }
    }
}

/// Why the line at `idx` is blocking I/O on the async path, if it is
fn blocking_io_violation(lines: &[&str], idx: usize) -> Option<&'static str> {
    let code = code_part(lines[idx]);

    let reason = if code.contains("std::fs::") || code.contains("use std::fs") {
        "Blocking file I/O"
    } else if code.contains("std::net::") || code.contains("use std::net") {
        "Blocking network I/O"
    } else if code.contains("std::process::Command") {
        "Blocking process I/O"
    } else if code.contains("reqwest::blocking") {
        "Blocking HTTP client"
    } else if code.contains("std::io::stdin()") || code.contains("std::io::stdout()") {
        "Blocking stdin/stdout"
    } else {
        return None;
    };

    if is_in_test_code(lines, idx) {
        return None;
    }

    // Blocking work is fine in sync functions; async callers hand it to
    // spawn_blocking
    match enclosing_fn(lines, idx) {
        Some((_, FnKind::Sync)) => None,
        Some((_, FnKind::Async)) => Some(reason),
        // Module level: imports of blocking APIs count
        None => Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_io_detection() {
        let test_code = vec![
            "async fn load_record() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];

        assert_eq!(
            blocking_io_violation(&test_code, 1),
            Some("Blocking file I/O")
        );
    }

    #[test]
    fn test_sync_function_allowed() {
        let test_code = vec![
            "pub fn load_config_from_path(path: Option<PathBuf>) -> Result<Config> {",
            "    let contents = std::fs::read_to_string(\"config.toml\")?;",
            "}",
        ];

        assert_eq!(blocking_io_violation(&test_code, 1), None);
    }

    #[test]
    fn test_sync_trait_method_allowed() {
        let test_code = vec![
            "impl OverrideStore for FileOverride {",
            "    fn set(&self, url: &str) -> Result<(), String> {",
            "        std::fs::write(&self.path, url)",
            "    }",
            "}",
        ];

        assert_eq!(blocking_io_violation(&test_code, 2), None);
    }

    #[test]
    fn test_module_level_import_flagged() {
        let test_code = vec!["use std::net::TcpStream;"];

        assert_eq!(
            blocking_io_violation(&test_code, 0),
            Some("Blocking network I/O")
        );
    }

    #[test]
    fn test_blocking_client_in_async_flagged() {
        let test_code = vec![
            "pub async fn fetch(url: &str) -> String {",
            "    reqwest::blocking::get(url).unwrap().text().unwrap()",
            "}",
        ];

        assert_eq!(
            blocking_io_violation(&test_code, 1),
            Some("Blocking HTTP client")
        );
    }

    #[test]
    fn test_test_function_allowed() {
        let test_code = vec![
            "#[tokio::test]",
            "async fn test_something() {",
            "    let contents = std::fs::read_to_string(\"test.txt\").unwrap();",
            "}",
        ];

        assert_eq!(blocking_io_violation(&test_code, 2), None);
    }
}
