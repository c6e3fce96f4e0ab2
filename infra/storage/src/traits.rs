use std::collections::BTreeSet;
use std::fmt::Debug;

/// Durable owner of a [`crate::FlagSelection`].
///
/// Reads are synchronous and cheap; they must work before anything else in the
/// process is up. Implementations never fail towards the caller: an
/// unreachable backend reads as empty and drops writes, logging the cause.
pub trait FlagsStorage: Debug {
    /// Stored bare names and `"name@i"` option names.
    fn flags(&self) -> BTreeSet<String>;

    fn set_flags(&mut self, flags: BTreeSet<String>);

    /// Stored string value, empty when unset.
    fn string_flag(&self, internal_name: &str) -> String;

    fn set_string_flag(&mut self, internal_name: &str, value: &str);

    /// Stored origin list, empty when unset.
    fn origin_list_flag(&self, internal_name: &str) -> String;

    fn set_origin_list_flag(&mut self, internal_name: &str, value: &str);

    /// Names carrying a string or origin-list value.
    fn value_names(&self) -> BTreeSet<String>;

    /// Drops both values stored under `internal_name`.
    fn clear_value(&mut self, internal_name: &str);

    /// Whether content changed since the last commit.
    fn is_dirty(&self) -> bool;

    /// Pushes pending changes to the durable copy. Fire-and-forget for queued
    /// backends.
    fn commit_pending_writes(&mut self);
}

impl<S: FlagsStorage + ?Sized> FlagsStorage for Box<S> {
    fn flags(&self) -> BTreeSet<String> {
        (**self).flags()
    }

    fn set_flags(&mut self, flags: BTreeSet<String>) {
        (**self).set_flags(flags);
    }

    fn string_flag(&self, internal_name: &str) -> String {
        (**self).string_flag(internal_name)
    }

    fn set_string_flag(&mut self, internal_name: &str, value: &str) {
        (**self).set_string_flag(internal_name, value);
    }

    fn origin_list_flag(&self, internal_name: &str) -> String {
        (**self).origin_list_flag(internal_name)
    }

    fn set_origin_list_flag(&mut self, internal_name: &str, value: &str) {
        (**self).set_origin_list_flag(internal_name, value);
    }

    fn value_names(&self) -> BTreeSet<String> {
        (**self).value_names()
    }

    fn clear_value(&mut self, internal_name: &str) {
        (**self).clear_value(internal_name);
    }

    fn is_dirty(&self) -> bool {
        (**self).is_dirty()
    }

    fn commit_pending_writes(&mut self) {
        (**self).commit_pending_writes();
    }
}
