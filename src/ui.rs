use colored::{ColoredString, Colorize};
use declarative::{ApplyResult, RefreshOutcome};

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Symbol for a resource's apply result
pub fn result_symbol(result: &ApplyResult, dry_run: bool) -> ColoredString {
    match result {
        ApplyResult::Unchanged => "○".dimmed(),
        ApplyResult::Changed if dry_run => "~".yellow(),
        ApplyResult::Changed => "✓".green(),
        ApplyResult::Failed { .. } => "✗".red(),
    }
}

/// Symbol for a refresh outcome
pub fn refresh_symbol(outcome: &RefreshOutcome) -> ColoredString {
    match outcome {
        RefreshOutcome::Refreshed => "↻".green(),
        RefreshOutcome::Pending => "↻".yellow(),
        RefreshOutcome::Failed(_) => "↻".red(),
    }
}

/// Truncate a string for display, keeping the end
pub fn truncate_path(path: &str, max_len: usize) -> String {
    let len = path.chars().count();
    if len <= max_len {
        path.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let tail: String = path.chars().skip(len - (max_len - 3)).collect();
        format!("...{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_path_short() {
        assert_eq!(truncate_path("/etc/burp", 20), "/etc/burp");
    }

    #[test]
    fn test_truncate_path_long() {
        let truncated = truncate_path("/usr/local/bin/burp_ssl_extra_checks_script", 20);
        assert_eq!(truncated.chars().count(), 20);
        assert!(truncated.starts_with("..."));
        assert!(truncated.ends_with("checks_script"));
    }

    #[test]
    fn test_truncate_path_tiny_limit() {
        assert_eq!(truncate_path("/etc/burp", 2), "...");
    }
}
