//! Which image sets a batch should draw retrieval tags from.

use crate::pipeline::simplify::ImageSetSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A set of selected image-set names, plus the names known to exist.
///
/// Selection order is irrelevant to the backend, so a `BTreeSet` keeps
/// [`ImageSetSelection::ids`] deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSetSelection {
    available: BTreeSet<String>,
    selected: BTreeSet<String>,
}

impl ImageSetSelection {
    /// Everything available, everything selected.
    pub fn from_available<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let available: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        Self {
            selected: available.clone(),
            available,
        }
    }

    /// Build from a backend listing, all selected.
    pub fn from_summaries(sets: &[ImageSetSummary]) -> Self {
        Self::from_available(sets.iter().map(|s| s.name.clone()))
    }

    /// An explicit selection with no knowledge of what else exists.
    pub fn with_selected<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selected: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        Self {
            available: selected.clone(),
            selected,
        }
    }

    /// Returns `true` if the name was newly selected.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        self.available.insert(name.clone());
        self.selected.insert(name)
    }

    /// Returns `true` if the name was selected.
    pub fn remove(&mut self, name: &str) -> bool {
        self.selected.remove(name)
    }

    /// Flip membership; returns the new state.
    pub fn toggle(&mut self, name: &str) -> bool {
        if self.selected.remove(name) {
            false
        } else {
            self.insert(name)
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.available.clone();
    }

    pub fn select_none(&mut self) {
        self.selected.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.selected.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn all_selected(&self) -> bool {
        self.selected == self.available
    }

    /// Selected names in sorted order, as passed to the simplifier.
    pub fn ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn available(&self) -> impl Iterator<Item = &str> {
        self.available.iter().map(String::as_str)
    }

    /// Keep only selections that still exist in `names` (after the library
    /// changed), adding new names as selected.
    pub fn refresh<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fresh: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let added: Vec<String> = fresh.difference(&self.available).cloned().collect();
        self.selected.retain(|n| fresh.contains(n));
        self.selected.extend(added);
        self.available = fresh;
    }
}
