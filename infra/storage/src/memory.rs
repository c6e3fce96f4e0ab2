use crate::selection::FlagSelection;
use crate::traits::FlagsStorage;
use std::collections::BTreeSet;

/// In-process storage for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryFlagsStorage {
    selection: FlagSelection,
    dirty: bool,
    commits: usize,
}

impl MemoryFlagsStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_selection(selection: FlagSelection) -> Self {
        Self { selection, dirty: false, commits: 0 }
    }

    /// Seeds stored names directly, bypassing any engine bookkeeping.
    #[must_use]
    pub fn with_flags<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_selection(FlagSelection {
            flags: flags.into_iter().map(Into::into).collect(),
            ..FlagSelection::default()
        })
    }

    #[must_use]
    pub const fn selection(&self) -> &FlagSelection {
        &self.selection
    }

    /// Number of commits that actually flushed changes.
    #[must_use]
    pub const fn commits(&self) -> usize {
        self.commits
    }
}

impl FlagsStorage for MemoryFlagsStorage {
    fn flags(&self) -> BTreeSet<String> {
        self.selection.flags.clone()
    }

    fn set_flags(&mut self, flags: BTreeSet<String>) {
        self.dirty |= self.selection.replace_flags(flags);
    }

    fn string_flag(&self, internal_name: &str) -> String {
        self.selection.strings.get(internal_name).cloned().unwrap_or_default()
    }

    fn set_string_flag(&mut self, internal_name: &str, value: &str) {
        self.dirty |= self.selection.put_string(internal_name, value);
    }

    fn origin_list_flag(&self, internal_name: &str) -> String {
        self.selection.origin_lists.get(internal_name).cloned().unwrap_or_default()
    }

    fn set_origin_list_flag(&mut self, internal_name: &str, value: &str) {
        self.dirty |= self.selection.put_origin_list(internal_name, value);
    }

    fn value_names(&self) -> BTreeSet<String> {
        self.selection.value_names()
    }

    fn clear_value(&mut self, internal_name: &str) {
        self.dirty |= self.selection.clear_value(internal_name);
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn commit_pending_writes(&mut self) {
        if self.dirty {
            self.dirty = false;
            self.commits += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_changes_mark_dirty() {
        let mut storage = MemoryFlagsStorage::with_flags(["a"]);
        storage.set_flags(BTreeSet::from(["a".to_owned()]));
        assert!(!storage.is_dirty());

        storage.set_flags(BTreeSet::new());
        assert!(storage.is_dirty());

        storage.commit_pending_writes();
        storage.commit_pending_writes();
        assert!(!storage.is_dirty());
        assert_eq!(storage.commits(), 1);
    }
}
