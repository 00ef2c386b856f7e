// Ordered header storage with case-insensitive identity

use std::collections::HashMap;

const CRLF: &str = "\r\n";

/// Ordered name/value header pairs
///
/// Header identity is case-insensitive but the first literal casing used
/// for a name is preserved for all future writes under any casing of the
/// same name. Repeated writes to a name append as `", "`-joined values,
/// matching XHR's `setRequestHeader` semantics.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    /// Insertion-ordered (canonical name, value) pairs
    entries: Vec<(String, String)>,
    /// Lowercased name -> index into entries
    index: HashMap<String, usize>,
}

impl HeaderMap {
    /// Create an empty header map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from name/value pairs, appending in order
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            map.append(name.into(), value.into());
        }
        map
    }

    /// Append a value under a name
    ///
    /// The first write under a name fixes its displayed casing; later
    /// writes under any casing of the same name join with `", "`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let key = name.to_lowercase();
        match self.index.get(&key) {
            Some(&i) => {
                let joined = format!("{}, {}", self.entries[i].1, value);
                self.entries[i].1 = joined;
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    /// Set a value only if the name is not yet present
    ///
    /// Response headers are first-write-wins per name.
    pub fn set_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_lowercase();
        if !self.index.contains_key(&key) {
            self.index.insert(key, self.entries.len());
            self.entries.push((name, value.into()));
        }
    }

    /// Replace any existing value under a name
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_lowercase();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value.into(),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((name, value.into()));
            }
        }
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(&name.to_lowercase())
            .map(|&i| self.entries[i].1.as_str())
    }

    /// Whether a name is present (case-insensitive)
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_lowercase())
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate pairs in insertion order, with preserved casing
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Merge another map into this one; `other`'s values win per name
    pub fn merge_from(&mut self, other: &HeaderMap) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }

    /// Render as the CRLF-joined string `getAllResponseHeaders` returns
    ///
    /// Names are lowercased in this serialized form.
    pub fn to_raw_string(&self) -> String {
        self.entries
            .iter()
            .map(|(n, v)| format!("{}: {}", n.to_lowercase(), v))
            .collect::<Vec<_>>()
            .join(CRLF)
    }

    /// Parse a CRLF-joined header blob, first value per name winning
    pub fn from_raw_string(raw: &str) -> Self {
        let mut map = Self::new();
        for line in raw.split(CRLF) {
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() {
                    map.set_if_absent(name.to_lowercase(), value.trim());
                }
            }
        }
        map
    }
}
