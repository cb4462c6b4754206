//! Access policy for the file browser and open path.
//!
//! The dispatcher consults an [`AccessPolicy`] before reading anything
//! under the data folder. The permissions-map implementation walks from
//! the requested directory up through its parents until a configured
//! entry decides; the `*` key grants access to any API key.

use std::collections::HashMap;

/// Path-level access decisions, keyed by the caller's API key.
pub trait AccessPolicy: Send + Sync {
    /// Whether `prefix` (relative to the data folder) may be listed.
    fn is_directory_readable(&self, prefix: &str, api_key: &str) -> bool;

    /// Whether a single entry may be opened.
    fn is_entry_readable(&self, entry: &str, api_key: &str) -> bool;
}

/// Policy used when permission enforcement is off.
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn is_directory_readable(&self, _prefix: &str, _api_key: &str) -> bool {
        true
    }

    fn is_entry_readable(&self, _entry: &str, _api_key: &str) -> bool {
        true
    }
}

/// Folder-to-keys permissions map with parent-directory fallback.
#[derive(Debug, Default)]
pub struct PermissionsMap {
    entries: HashMap<String, Vec<String>>,
}

impl PermissionsMap {
    pub fn new(entries: HashMap<String, Vec<String>>) -> Self {
        Self { entries }
    }

    /// Parse the `folder:` / key-per-line permissions file format.
    ///
    /// Lines starting with `#` are comments; a line ending in `:` opens a
    /// folder section and subsequent keys (at least 4 characters, or `*`)
    /// are granted on it.
    pub fn parse(text: &str) -> Self {
        let mut entries: HashMap<String, Vec<String>> = HashMap::new();
        let mut current: Option<String> = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(folder) = line.strip_suffix(':') {
                current = Some(folder.trim().to_string());
            } else if let Some(folder) = &current {
                if line == "*" || line.len() >= 4 {
                    entries.entry(folder.clone()).or_default().push(line.to_string());
                }
            }
        }
        Self { entries }
    }

    fn entry_allows(&self, entry: &str, api_key: &str) -> bool {
        match self.entries.get(entry) {
            Some(keys) => keys.iter().any(|k| k == "*" || k == api_key),
            None => false,
        }
    }
}

impl AccessPolicy for PermissionsMap {
    fn is_directory_readable(&self, prefix: &str, api_key: &str) -> bool {
        let trimmed = prefix.trim_matches('/');
        if trimmed.is_empty() {
            return self.entry_allows("/", api_key);
        }
        // walk up parent directories until a configured entry decides
        let mut prefix = trimmed;
        loop {
            if self.entries.contains_key(prefix) {
                return self.entry_allows(prefix, api_key);
            }
            match prefix.rfind('/') {
                Some(idx) => prefix = &prefix[..idx],
                None => return false,
            }
        }
    }

    fn is_entry_readable(&self, entry: &str, api_key: &str) -> bool {
        let parent = match entry.trim_matches('/').rfind('/') {
            Some(idx) => &entry.trim_matches('/')[..idx],
            None => "",
        };
        self.is_directory_readable(parent, api_key)
    }
}

// =============================================================================
// Tests
// =============================================================================
