//! Display-identity normalization

use std::collections::HashMap;

/// Suffix appended to identities the directory could not resolve
pub const UNRESOLVED_MARKER: &str = "*";

/// Maps tracker display names or emails to canonical person names
pub trait UsernameDirectory: Send + Sync {
    /// The canonical name for `name`, if known
    fn resolve(&self, name: &str) -> Option<String>;
}

/// A case-insensitive alias dictionary
#[derive(Debug, Clone, Default)]
pub struct DictionaryUsernameDirectory {
    entries: HashMap<String, String>,
}

impl DictionaryUsernameDirectory {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias` as another name for `canonical`
    pub fn insert(&mut self, alias: &str, canonical: impl Into<String>) {
        self.entries.insert(normalize(alias), canonical.into());
    }

    /// Number of aliases
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary has no aliases
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&HashMap<String, String>> for DictionaryUsernameDirectory {
    fn from(table: &HashMap<String, String>) -> Self {
        let mut directory = Self::new();
        for (alias, canonical) in table {
            directory.insert(alias, canonical.clone());
        }
        directory
    }
}

impl UsernameDirectory for DictionaryUsernameDirectory {
    fn resolve(&self, name: &str) -> Option<String> {
        let key = normalize(name);
        if key.is_empty() {
            return None;
        }
        self.entries.get(&key).cloned()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Resolve a person by display name, then by email
///
/// When neither resolves, the display name (or the email, when there is no
/// display name) is returned with [`UNRESOLVED_MARKER`] appended.
pub fn resolve_person(
    directory: &dyn UsernameDirectory,
    display_name: Option<&str>,
    email: Option<&str>,
) -> Option<String> {
    if let Some(found) = display_name.and_then(|n| directory.resolve(n)) {
        return Some(found);
    }
    if let Some(found) = email.and_then(|e| directory.resolve(e)) {
        return Some(found);
    }
    display_name
        .or(email)
        .filter(|n| !n.trim().is_empty())
        .map(|n| format!("{}{}", n, UNRESOLVED_MARKER))
}
