//! ---
//! autumn_section: "02-service-orchestration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Deduplicating accumulator for pre-start declarations."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::debug;

/// Anything that can be offered to a [`ResourceSet`]. `None` declarations are
/// dropped without error.
pub trait Declared<T> {
    fn into_declared(self) -> Option<T>;
}

impl<T> Declared<T> for T {
    fn into_declared(self) -> Option<T> {
        Some(self)
    }
}

impl<T> Declared<T> for Option<T> {
    fn into_declared(self) -> Option<T> {
        self
    }
}

impl Declared<String> for &str {
    fn into_declared(self) -> Option<String> {
        Some(self.to_owned())
    }
}

impl Declared<String> for Option<&str> {
    fn into_declared(self) -> Option<String> {
        self.map(str::to_owned)
    }
}

/// Set of declarations collected before the orchestrator starts.
///
/// Equal items collapse into one. Iteration follows first insertion so
/// start-up is reproducible, though callers must not rely on it for
/// correctness.
#[derive(Clone)]
pub struct ResourceSet<T> {
    kind: &'static str,
    items: IndexSet<T>,
}

impl<T> ResourceSet<T>
where
    T: Eq + Hash + Clone + fmt::Debug,
{
    /// Empty set; `kind` labels log lines (`configuration`, `module`, ...).
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            items: IndexSet::new(),
        }
    }

    /// Add one declaration. Returns `true` when it was not already present.
    pub fn add(&mut self, item: impl Declared<T>) -> bool {
        let Some(item) = item.into_declared() else {
            debug!(kind = self.kind, "ignoring empty declaration");
            return false;
        };
        let inserted = self.items.insert(item);
        if inserted {
            debug!(kind = self.kind, total = self.items.len(), "declaration added");
        }
        inserted
    }

    /// Add every declaration in `items`, returning how many were new.
    pub fn add_all<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator,
        I::Item: Declared<T>,
    {
        items
            .into_iter()
            .map(|item| self.add(item))
            .filter(|inserted| *inserted)
            .count()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Copy of the current contents. Later additions are not visible through it.
    pub fn snapshot(&self) -> Arc<[T]> {
        self.items.iter().cloned().collect()
    }
}

impl<T: fmt::Debug> fmt::Debug for ResourceSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSet")
            .field("kind", &self.kind)
            .field("items", &self.items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_and_empty_declarations_collapse() {
        let mut set = ResourceSet::<String>::new("configuration");
        assert_eq!(set.add_all(["a", "a", "b"]), 2);
        assert_eq!(set.add_all([None, Some("c")]), 1);

        let mut items: Vec<String> = set.snapshot().to_vec();
        items.sort();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[test]
    fn single_add_reports_novelty() {
        let mut set = ResourceSet::<String>::new("configuration");
        assert!(set.add("app.properties"));
        assert!(!set.add(String::from("app.properties")));
        assert!(!set.add(None::<String>));
        assert_eq!(set.len(), 1);
        assert!(set.contains(&"app.properties".to_owned()));
    }

    #[test]
    fn snapshot_is_detached_from_later_additions() {
        let mut set = ResourceSet::<u32>::new("numbers");
        set.add(1);
        let before = set.snapshot();
        set.add(2);
        assert_eq!(&*before, &[1]);
        assert_eq!(&*set.snapshot(), &[1, 2]);
    }
}
