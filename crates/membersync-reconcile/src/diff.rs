//! Set difference between observed and desired identifiers.

use std::collections::HashSet;

use serde::Serialize;

/// Identifiers to add and remove for one category.
///
/// Both lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

impl Diff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute `desired \ current` and `current \ desired`.
///
/// Linear in the total number of identifiers. Duplicates in either input are
/// collapsed.
pub fn diff<'a, C, D>(current: C, desired: D) -> Diff
where
    C: IntoIterator<Item = &'a String>,
    D: IntoIterator<Item = &'a String>,
{
    let current: HashSet<&str> = current.into_iter().map(String::as_str).collect();
    let desired: HashSet<&str> = desired.into_iter().map(String::as_str).collect();

    let mut to_add: Vec<String> = desired
        .iter()
        .filter(|id| !current.contains(*id))
        .map(|id| (*id).to_string())
        .collect();
    let mut to_remove: Vec<String> = current
        .iter()
        .filter(|id| !desired.contains(*id))
        .map(|id| (*id).to_string())
        .collect();

    to_add.sort_unstable();
    to_remove.sort_unstable();

    Diff { to_add, to_remove }
}
