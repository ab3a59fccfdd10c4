//! The set of participant names currently known to a connected client.

use std::collections::BTreeSet;

/// Live set of participant names.
///
/// Owned by the session. The presentation layer only ever sees
/// [`snapshot`](Self::snapshot) copies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    names: BTreeSet<String>,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    /// Replaces the whole roster with the server's snapshot.
    pub fn replace<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.names = names.into_iter().collect();
    }

    /// Adds a participant. Returns `false` if the name was already present.
    pub fn add(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    /// Removes a participant. Returns `false` if the name was not present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    /// Forgets every participant.
    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// Whether `name` is currently in the roster.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Sorted, read-only copy of the current names.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}
