//! Case-insensitive, insertion-ordered header map
//!
//! Keys are lower-cased on every insert and lookup so merging maps that spell
//! the same header differently never produces duplicate entries.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge layers in ascending precedence: later layers win conflicts
    pub fn merge<'a, I>(layers: I) -> Self
    where
        I: IntoIterator<Item = &'a HeaderMap>,
    {
        let mut merged = HeaderMap::new();
        for layer in layers {
            merged.extend(layer.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        }
        merged
    }

    /// Insert a header, returning the previous value
    ///
    /// An existing key keeps its position.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        let key = normalize(key.as_ref());
        let value = value.into();
        match self.position(&key) {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(&normalize(key))
            .map(|idx| self.entries[idx].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(&normalize(key)).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.position(&normalize(key))
            .map(|idx| self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, normalized: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == normalized)
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}

impl<K: AsRef<str>, V: Into<String>> Extend<(K, V)> for HeaderMap {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = HeaderMap::new();
        map.extend(iter);
        map
    }
}

impl From<BTreeMap<String, String>> for HeaderMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<HashMap<String, String>> for HeaderMap {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for HeaderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, String>::deserialize(deserializer)?;
        Ok(map.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_normalizes_keys() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", "text/plain");
        headers.insert("CONTENT-TYPE", "application/json");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("Content-type"), Some("application/json"));
    }

    #[test]
    fn test_insert_keeps_position() {
        let mut headers: HeaderMap = [("a", "1"), ("b", "2")].into_iter().collect();
        headers.insert("A", "3");

        let keys: Vec<_> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(headers.get("a"), Some("3"));
    }

    #[test]
    fn test_merge_later_layers_win() {
        let auth: HeaderMap = [("authorization", "Bearer t")].into_iter().collect();
        let config: HeaderMap = [("X-App-Id", "config"), ("Accept", "text/html")]
            .into_iter()
            .collect();
        let descriptor: HeaderMap = [("x-app-id", "fetch")].into_iter().collect();

        let merged = HeaderMap::merge([&auth, &config, &descriptor]);

        assert_eq!(merged.get("X-App-Id"), Some("fetch"));
        assert_eq!(merged.get("authorization"), Some("Bearer t"));
        assert_eq!(merged.get("accept"), Some("text/html"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_remove_is_case_insensitive() {
        let mut headers: HeaderMap = [("Content-Type", "x")].into_iter().collect();
        assert_eq!(headers.remove("content-TYPE"), Some("x".to_string()));
        assert!(headers.is_empty());
        assert!(!headers.contains_key("content-type"));
    }

    #[test]
    fn test_deserialize_lowercases() {
        let headers: HeaderMap = serde_json::from_str(r#"{"X-Trace": "on"}"#).unwrap();
        assert_eq!(headers.iter().next(), Some(("x-trace", "on")));
        assert_eq!(serde_json::to_string(&headers).unwrap(), r#"{"x-trace":"on"}"#);
    }
}
