//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods. Waiting is done on
//! I/O, channels, or `tokio::time::timeout`.
//! **Exceptions**: Notice expiry timers (a detached task that sleeps for a
//! notice's time-to-live, then clears it), exponential backoff, test code

use std::fs;
use std::path::Path;

use architectural_enforcement::{
    code_part, is_in_test_code, is_test_only_file, rust_files, PRODUCTION_DIRS,
};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations = find_sleep_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - Notice expiry timers (sleep for a TTL, then expire)");
        eprintln!("  - Exponential backoff in retry logic");
        eprintln!("  - Test code (#[test] or #[tokio::test] functions)");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep as poor man's synchronization");
        eprintln!("  - Sleep to 'wait' for a response (use tokio::time::timeout!)");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Find all sleep() calls in production code
fn find_sleep_violations() -> Vec<String> {
    let mut violations = Vec::new();
    let policy = SleepPolicy {
        allow_expiry_timers: true,
        allow_backoff: true,
        allow_tests: true,
    };

    for dir in PRODUCTION_DIRS {
        for path in rust_files(dir) {
            check_file(&path, &mut violations, &policy);
        }
    }

    violations
}

struct SleepPolicy {
    allow_expiry_timers: bool,
    allow_backoff: bool,
    allow_tests: bool,
}

fn check_file(path: &Path, violations: &mut Vec<String>, policy: &SleepPolicy) {
    if policy.allow_tests && is_test_only_file(path) {
        return;
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return,
    };

    let lines: Vec<&str> = content.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        if let Some(reason) = sleep_violation(&lines, idx, policy) {
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

/// Why the line at `idx` violates the policy, if it does
fn sleep_violation(lines: &[&str], idx: usize, policy: &SleepPolicy) -> Option<&'static str> {
    let code = code_part(lines[idx]);
    if !(code.contains("::sleep(") || code.contains(".sleep(")) {
        return None;
    }

    if policy.allow_tests && is_in_test_code(lines, idx) {
        return None;
    }
    if policy.allow_expiry_timers && is_expiry_timer_context(lines, idx) {
        return None;
    }
    if policy.allow_backoff && is_backoff_context(lines, idx) {
        return None;
    }

    if code.contains("std::thread::sleep") || code.contains("thread::sleep(") {
        Some("Blocking thread sleep")
    } else {
        Some("Sleep")
    }
}

/// Check if sleep times out a notice (detached task followed by expiry)
fn is_expiry_timer_context(lines: &[&str], current_idx: usize) -> bool {
    let context_range = current_idx.saturating_sub(10)..std::cmp::min(current_idx + 5, lines.len());

    let mut has_ttl = false;
    let mut has_expiry = false;
    let mut is_detached = false;

    for i in context_range {
        let line = lines[i].to_lowercase();
        if line.contains("ttl") {
            has_ttl = true;
        }
        if line.contains("expire") || line.contains("expiry") {
            has_expiry = true;
        }
        if line.contains("spawn(") {
            is_detached = true;
        }
    }

    has_ttl && has_expiry && is_detached
}

/// Check if sleep is used for exponential backoff (acceptable for retry logic)
fn is_backoff_context(lines: &[&str], current_idx: usize) -> bool {
    let context_range = current_idx.saturating_sub(15)..std::cmp::min(current_idx + 5, lines.len());

    let mut has_backoff_calc = false;
    let mut has_retry_context = false;

    for i in context_range {
        let line = lines[i].to_lowercase();

        // 2^n pattern or bit shift
        if line.contains("<<") || line.contains("pow") || line.contains("* 2") {
            has_backoff_calc = true;
        }

        if line.contains("retry") || line.contains("reconnect") || line.contains("backoff") {
            has_retry_context = true;
        }
    }

    has_backoff_calc && has_retry_context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> SleepPolicy {
        SleepPolicy {
            allow_expiry_timers: false,
            allow_backoff: false,
            allow_tests: false,
        }
    }

    fn lenient() -> SleepPolicy {
        SleepPolicy {
            allow_expiry_timers: true,
            allow_backoff: true,
            allow_tests: true,
        }
    }

    #[test]
    fn test_sleep_violation_detection() {
        let test_code = vec![
            "async fn wait_for_answer() {",
            "    tokio::time::sleep(Duration::from_millis(10)).await;",
            "}",
        ];

        assert_eq!(sleep_violation(&test_code, 1, &strict()), Some("Sleep"));
        assert_eq!(sleep_violation(&test_code, 1, &lenient()), Some("Sleep"));
    }

    #[test]
    fn test_thread_sleep_reported_as_blocking() {
        let test_code = vec![
            "fn poll() {",
            "    std::thread::sleep(Duration::from_millis(10));",
            "}",
        ];

        assert_eq!(
            sleep_violation(&test_code, 1, &lenient()),
            Some("Blocking thread sleep")
        );
    }

    #[test]
    fn test_expiry_timer_detection() {
        let test_code = vec![
            "fn schedule_expiry(&self, id: u64, ttl: Duration) {",
            "    let inner = Arc::clone(&self.inner);",
            "    handle.spawn(async move {",
            "        tokio::time::sleep(ttl).await;",
            "        expire(&inner.current, id);",
            "    });",
            "}",
        ];

        assert!(is_expiry_timer_context(&test_code, 3));
        assert_eq!(sleep_violation(&test_code, 3, &lenient()), None);
        assert!(sleep_violation(&test_code, 3, &strict()).is_some());
    }

    #[test]
    fn test_inline_ttl_wait_is_not_an_expiry_timer() {
        // Waiting in place for a TTL is still a sleep-as-synchronization
        let test_code = vec![
            "async fn expire_after(ttl: Duration) {",
            "    tokio::time::sleep(ttl).await;",
            "}",
        ];

        assert!(!is_expiry_timer_context(&test_code, 1));
    }

    #[test]
    fn test_backoff_detection() {
        let test_code = vec![
            "async fn reconnect() {",
            "    let delay = base_delay * (1 << attempt);",
            "    debug!(\"Retry attempt {}\", attempt);",
            "    tokio::time::sleep(Duration::from_millis(delay)).await;",
            "}",
        ];

        assert!(is_backoff_context(&test_code, 3));
    }

    #[test]
    fn test_sleep_in_test_module_allowed() {
        let test_code = vec![
            "#[cfg(test)]",
            "mod tests {",
            "    #[tokio::test]",
            "    async fn test_slow() {",
            "        tokio::time::sleep(Duration::from_millis(1)).await;",
            "    }",
            "}",
        ];

        assert_eq!(sleep_violation(&test_code, 4, &lenient()), None);
        assert!(sleep_violation(&test_code, 4, &strict()).is_some());
    }
}
