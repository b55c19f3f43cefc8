//! Utility functions for nyx.

use std::fs;
use std::path::{Path, PathBuf};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref().to_path_buf();
    if !path.exists() {
        let _ = fs::create_dir_all(&path);
    }
    path
}

/// Get the nyx data directory (`~/.nyx`), creating it if needed.
pub fn get_data_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    ensure_dir(home.join(".nyx"))
}

/// Get the log directory (`~/.nyx/logs`).
pub fn get_logs_path() -> PathBuf {
    ensure_dir(get_data_path().join("logs"))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(rest)
    } else if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else {
        PathBuf::from(path)
    }
}

/// Find the largest byte index `<= idx` that lies on a UTF-8 char boundary.
pub fn floor_char_boundary(s: &str, idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    let mut i = idx;
    while !s.is_char_boundary(i) && i > 0 {
        i -= 1;
    }
    i
}

/// Truncate a string to max length, adding a suffix if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let suffix = "...";
    if s.len() <= max_len {
        return s.to_string();
    }
    if max_len <= suffix.len() {
        let end = floor_char_boundary(s, max_len);
        return s[..end].to_string();
    }
    let end = floor_char_boundary(s, max_len - suffix.len());
    let mut result = s[..end].to_string();
    result.push_str(suffix);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_multibyte_boundary() {
        // "°" is two bytes; cutting inside it must back off.
        let s = "61°C reading";
        let out = truncate_string(s, 6);
        assert!(out.ends_with("..."));
        assert!(out.starts_with("61"));
    }

    #[test]
    fn test_expand_tilde_plain_path() {
        assert_eq!(expand_tilde("/tmp/nyx.json"), PathBuf::from("/tmp/nyx.json"));
    }

    #[test]
    fn test_expand_tilde_home_prefix() {
        let expanded = expand_tilde("~/.nyx/nyx_memory.json");
        assert!(expanded.ends_with(".nyx/nyx_memory.json"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_floor_char_boundary_past_end() {
        assert_eq!(floor_char_boundary("abc", 10), 3);
    }
}
