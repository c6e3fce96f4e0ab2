use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The durable copy of a user's choices.
///
/// `flags` holds bare internal names and `"name@i"` option names; the two maps
/// hold free-form values keyed by internal name. Empty values are never kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagSelection {
    pub flags: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub strings: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub origin_lists: BTreeMap<String, String>,
}

impl FlagSelection {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.strings.is_empty() && self.origin_lists.is_empty()
    }

    /// Replaces the stored set; returns whether anything changed.
    pub fn replace_flags(&mut self, flags: BTreeSet<String>) -> bool {
        if self.flags == flags {
            return false;
        }
        self.flags = flags;
        true
    }

    pub fn put_string(&mut self, name: &str, value: &str) -> bool {
        put(&mut self.strings, name, value)
    }

    pub fn put_origin_list(&mut self, name: &str, value: &str) -> bool {
        put(&mut self.origin_lists, name, value)
    }

    /// Names that carry a string or origin-list value.
    #[must_use]
    pub fn value_names(&self) -> BTreeSet<String> {
        self.strings.keys().chain(self.origin_lists.keys()).cloned().collect()
    }

    pub fn clear_value(&mut self, name: &str) -> bool {
        let strings = self.strings.remove(name).is_some();
        let origins = self.origin_lists.remove(name).is_some();
        strings || origins
    }
}

fn put(map: &mut BTreeMap<String, String>, name: &str, value: &str) -> bool {
    if value.is_empty() {
        return map.remove(name).is_some();
    }
    match map.get(name) {
        Some(current) if current == value => false,
        _ => {
            map.insert(name.to_owned(), value.to_owned());
            true
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_removes_entry() {
        let mut selection = FlagSelection::default();
        assert!(selection.put_string("s", "hello"));
        assert!(!selection.put_string("s", "hello"));
        assert!(selection.put_string("s", ""));
        assert!(selection.strings.is_empty());
        assert!(!selection.put_string("s", ""));
    }

    #[test]
    fn value_names_cover_both_maps() {
        let mut selection = FlagSelection::default();
        selection.put_string("a", "1");
        selection.put_origin_list("b", "https://a.test");
        assert_eq!(selection.value_names().into_iter().collect::<Vec<_>>(), ["a", "b"]);
        assert!(selection.clear_value("b"));
        assert!(!selection.clear_value("b"));
    }
}
