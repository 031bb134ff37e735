//! Global Preprocessor Definitions
//!
//! [`ShaderDefines`] holds the `#define NAME VALUE` pairs injected in front of
//! every compiled source, right after the optional `#version` line.
//!
//! Entries stay sorted by name, so two sets with the same contents render the
//! same prelude no matter in which order they were filled.
//!
//! ```rust,ignore
//! let mut defines = ShaderDefines::new();
//! defines.set("MAX_LIGHTS", "8");
//! defines.set("USE_SHADOWS", "");
//!
//! assert_eq!(defines.to_source(), "#define MAX_LIGHTS 8\n#define USE_SHADOWS\n");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name-ordered set of global macro definitions.
///
/// Serialized as a JSON object (`{"NAME": "VALUE"}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ShaderDefines {
    entries: Vec<(String, String)>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines `name`, replacing any previous value. An empty `value` renders
    /// as a bare `#define NAME`.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.find(name) {
            Ok(i) => value.clone_into(&mut self.entries[i].1),
            Err(i) => self.entries.insert(i, (name.to_owned(), value.to_owned())),
        }
    }

    /// Undefines `name`. Returns whether it was defined.
    pub fn remove(&mut self, name: &str) -> bool {
        self.find(name).map(|i| self.entries.remove(i)).is_ok()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_ok()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let i = self.find(name).ok()?;
        Some(&self.entries[i].1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Copies every entry of `other` into `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: &ShaderDefines) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }

    /// The prelude text: one `#define` line per entry, in name order.
    #[must_use]
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.iter() {
            out.push_str("#define ");
            out.push_str(name);
            if !value.is_empty() {
                out.push(' ');
                out.push_str(value);
            }
            out.push('\n');
        }
        out
    }

    fn find(&self, name: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|(entry, _)| entry.as_str().cmp(name))
    }
}

impl<N: AsRef<str>, V: AsRef<str>> FromIterator<(N, V)> for ShaderDefines {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut defines = Self::new();
        for (name, value) in iter {
            defines.set(name.as_ref(), value.as_ref());
        }
        defines
    }
}

impl From<BTreeMap<String, String>> for ShaderDefines {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self {
            entries: map.into_iter().collect(),
        }
    }
}

impl From<ShaderDefines> for BTreeMap<String, String> {
    fn from(defines: ShaderDefines) -> Self {
        defines.entries.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redefine_and_undefine() {
        let mut defines = ShaderDefines::new();
        defines.set("MAX_LIGHTS", "4");
        defines.set("MAX_LIGHTS", "16");
        assert_eq!(defines.len(), 1);
        assert_eq!(defines.get("MAX_LIGHTS"), Some("16"));
        assert_eq!(defines.get("USE_FOG"), None);

        assert!(defines.remove("MAX_LIGHTS"));
        assert!(!defines.remove("MAX_LIGHTS"));
        assert!(defines.is_empty());
    }

    #[test]
    fn test_prelude_is_name_ordered() {
        let defines: ShaderDefines =
            [("USE_FOG", ""), ("GAMMA", "2.2"), ("BLEND(a, b)", "mix(a, b, 0.5)")]
                .into_iter()
                .collect();

        assert_eq!(
            defines.to_source(),
            "#define BLEND(a, b) mix(a, b, 0.5)\n#define GAMMA 2.2\n#define USE_FOG\n"
        );
        assert_eq!(ShaderDefines::new().to_source(), "");
    }

    #[test]
    fn test_merge_prefers_incoming() {
        let mut base: ShaderDefines = [("QUALITY", "1"), ("USE_FOG", "")].into_iter().collect();
        let overrides: ShaderDefines = [("QUALITY", "3"), ("MSAA", "4")].into_iter().collect();

        base.merge(&overrides);

        assert_eq!(
            base.iter().collect::<Vec<_>>(),
            vec![("MSAA", "4"), ("QUALITY", "3"), ("USE_FOG", "")]
        );
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a: ShaderDefines = [("A", "1"), ("B", "2")].into_iter().collect();
        let b: ShaderDefines = [("B", "2"), ("A", "1")].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.to_source(), b.to_source());
    }
}
