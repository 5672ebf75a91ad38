//! Multi-valued header and query mappings.
//!
//! # Design Decisions
//! - Header keys are stored in canonical MIME form (`x-foo-bar` → `X-Foo-Bar`)
//! - Every insertion goes through the canonicalizing setter, so lookups by
//!   any casing resolve to the same entry
//! - Keys containing bytes outside the HTTP token set are kept verbatim

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Query parameters: name → values, in submission order.
pub type Values = BTreeMap<String, Vec<String>>;

/// Case-insensitive, multi-valued header mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    /// Create an empty header mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under the canonical form of `key`.
    pub fn add(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.0
            .entry(canonical_key(key.as_ref()))
            .or_default()
            .push(value.into());
    }

    /// Replace all values under the canonical form of `key`.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(canonical_key(key.as_ref()), vec![value.into()]);
    }

    /// First value stored under `key`, any casing.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(&canonical_key(key))
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values stored under `key`, any casing.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0
            .get(&canonical_key(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(&canonical_key(key))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Re-insert every value of a raw mapping through [`Headers::add`].
    pub fn canonicalize(raw: BTreeMap<String, Vec<String>>) -> Self {
        let mut headers = Self::new();
        for (key, values) in raw {
            for value in values {
                headers.add(&key, value);
            }
        }
        headers
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.add(k, v);
        }
        headers
    }
}

/// Canonical MIME header form: the first letter and any letter following a
/// hyphen are upper-cased, the rest lower-cased.
pub fn canonical_key(key: &str) -> String {
    if !key.bytes().all(is_token_byte) {
        return key.to_string();
    }

    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for c in key.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_forms() {
        assert_eq!(canonical_key("x-foo"), "X-Foo");
        assert_eq!(canonical_key("X-FOO-BAR"), "X-Foo-Bar");
        assert_eq!(canonical_key("content-type"), "Content-Type");
        assert_eq!(canonical_key("with space"), "with space");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.add("X-FOO", "bar");
        headers.add("x-foo", "baz");

        assert_eq!(headers.get("x-Foo"), Some("bar"));
        assert_eq!(headers.get_all("X-foo"), ["bar".to_string(), "baz".to_string()]);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn canonicalize_merges_casings() {
        let mut raw = BTreeMap::new();
        raw.insert("x-trace".to_string(), vec!["a".to_string()]);
        raw.insert("X-TRACE".to_string(), vec!["b".to_string()]);

        let headers = Headers::canonicalize(raw);
        assert_eq!(headers.get_all("x-trace").len(), 2);
    }

    #[test]
    fn set_replaces_values() {
        let mut headers: Headers = [("accept", "a"), ("Accept", "b")].into_iter().collect();
        headers.set("ACCEPT", "c");
        assert_eq!(headers.get_all("accept"), ["c".to_string()]);
    }
}
