//! Set-difference reconciliation of keyed collections
//!
//! Computes the minimal add/remove delta that turns an observed collection
//! into a desired one. Both sides are indexed by key in a hash map, so a
//! reconcile is O(n + m).

use crate::error::DuplicateKeyError;
use crate::item::Keyed;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// Unordered set of keyed items with unique keys
pub struct Collection<T: Keyed> {
    items: HashMap<T::Key, T>,
}

impl<T: Keyed> Collection<T> {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Build a collection, rejecting the first repeated key
    pub fn try_from_items<I>(items: I) -> Result<Self, DuplicateKeyError>
    where
        I: IntoIterator<Item = T>,
    {
        let mut collection = Self::new();
        for item in items {
            collection.insert(item)?;
        }
        Ok(collection)
    }

    /// Add an item; fails if its key is already present
    pub fn insert(&mut self, item: T) -> Result<(), DuplicateKeyError> {
        let key = item.key();
        if self.items.contains_key(&key) {
            return Err(DuplicateKeyError::new("collection", key));
        }
        self.items.insert(key, item);
        Ok(())
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.items.get(key)
    }

    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items.into_values().collect()
    }
}

impl<T: Keyed + PartialEq> Collection<T> {
    /// Apply a delta in place
    ///
    /// Removals only drop items that are structurally equal to the stored
    /// one, so the result does not depend on the order in which an adapter
    /// would issue the two halves of the delta.
    pub fn apply(&mut self, delta: &Delta<T>)
    where
        T: Clone,
    {
        for item in &delta.to_remove {
            let key = item.key();
            if self.items.get(&key) == Some(item) {
                self.items.remove(&key);
            }
        }
        for item in &delta.to_add {
            self.items.insert(item.key(), item.clone());
        }
    }
}

impl<T: Keyed> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed + Clone> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T: Keyed + PartialEq> PartialEq for Collection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Keyed + fmt::Debug> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.items.values()).finish()
    }
}

/// Minimal mutation set converting observed state into desired state
///
/// Both lists are unordered; callers must not depend on their order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta<T> {
    /// Items present in desired but not in observed
    pub to_add: Vec<T>,

    /// Items present in observed but not in desired
    pub to_remove: Vec<T>,
}

impl<T> Delta<T> {
    pub fn empty() -> Self {
        Self {
            to_add: Vec::new(),
            to_remove: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

impl<T> Delta<T> {
    /// Names that appear on both sides, i.e. a value change of one name
    ///
    /// `name` is whatever the remote API addresses an item by, which may be
    /// coarser than the item's identity (a label is addressed by its key).
    pub fn changed_by<N, F>(&self, name: F) -> HashSet<N>
    where
        N: Eq + Hash,
        F: Fn(&T) -> N,
    {
        let removed: HashSet<N> = self.to_remove.iter().map(&name).collect();
        self.to_add
            .iter()
            .map(&name)
            .filter(|n| removed.contains(n))
            .collect()
    }

    /// Counts with value changes of one name folded into a single bucket
    pub fn summary_by<N, F>(&self, name: F) -> DeltaSummary
    where
        N: Eq + Hash,
        F: Fn(&T) -> N,
    {
        let changed: HashSet<N> = self.changed_by(&name);
        let added_changes = self
            .to_add
            .iter()
            .filter(|i| changed.contains(&name(*i)))
            .count();
        let removed_changes = self
            .to_remove
            .iter()
            .filter(|i| changed.contains(&name(*i)))
            .count();
        DeltaSummary {
            add: self.to_add.len() - added_changes,
            remove: self.to_remove.len() - removed_changes,
            change: changed.len(),
        }
    }
}

impl<T: Keyed> Delta<T> {
    /// Keys that appear on both sides with a different value
    pub fn changed_keys(&self) -> HashSet<T::Key> {
        self.changed_by(T::key)
    }

    pub fn summary(&self) -> DeltaSummary {
        self.summary_by(T::key)
    }
}

impl<T> Default for Delta<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Counts of a delta, with value changes folded into one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaSummary {
    pub add: usize,
    pub remove: usize,
    pub change: usize,
}

impl fmt::Display for DeltaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to remove",
            self.add, self.change, self.remove
        )
    }
}

/// Reconcile two collections whose keys are already known to be unique
pub fn reconcile<T>(desired: &Collection<T>, observed: &Collection<T>) -> Delta<T>
where
    T: Keyed + Clone + PartialEq,
{
    let desired_index: HashMap<&T::Key, &T> = desired.items.iter().collect();
    let observed_index: HashMap<&T::Key, &T> = observed.items.iter().collect();
    diff_indexed(&desired_index, &observed_index)
}

/// Reconcile raw item sequences using a key-extraction function
///
/// Repeated keys on either side are rejected rather than deduplicated.
pub fn reconcile_by<T, K, F>(
    desired: &[T],
    observed: &[T],
    key: F,
) -> Result<Delta<T>, DuplicateKeyError>
where
    T: Clone + PartialEq,
    K: Eq + Hash + fmt::Debug,
    F: Fn(&T) -> K,
{
    let desired_index = index(desired, &key).map_err(|e| e.in_side("desired"))?;
    let observed_index = index(observed, &key).map_err(|e| e.in_side("observed"))?;
    Ok(diff_indexed(&desired_index, &observed_index))
}

fn index<'a, T, K, F>(items: &'a [T], key: &F) -> Result<HashMap<K, &'a T>, DuplicateKeyError>
where
    K: Eq + Hash + fmt::Debug,
    F: Fn(&T) -> K,
{
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        let k = key(item);
        if map.contains_key(&k) {
            return Err(DuplicateKeyError::new("collection", k));
        }
        map.insert(k, item);
    }
    Ok(map)
}

fn diff_indexed<K, T>(desired: &HashMap<K, &T>, observed: &HashMap<K, &T>) -> Delta<T>
where
    K: Eq + Hash,
    T: Clone + PartialEq,
{
    let to_add: Vec<T> = desired
        .iter()
        .filter(|(k, item)| observed.get(*k).copied() != Some(**item))
        .map(|(_, item)| (*item).clone())
        .collect();

    let to_remove: Vec<T> = observed
        .iter()
        .filter(|(k, item)| desired.get(*k).copied() != Some(**item))
        .map(|(_, item)| (*item).clone())
        .collect();

    tracing::debug!(
        desired = desired.len(),
        observed = observed.len(),
        to_add = to_add.len(),
        to_remove = to_remove.len(),
        "Computed delta"
    );

    Delta { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Label, SpaceRole};

    fn labels(pairs: &[(&str, &str)]) -> Collection<Label> {
        Collection::try_from_items(pairs.iter().map(|(k, v)| Label::new(*k, *v))).unwrap()
    }

    fn sorted(mut items: Vec<Label>) -> Vec<Label> {
        items.sort_by(|a, b| (&a.key, &a.value).cmp(&(&b.key, &b.value)));
        items
    }

    #[test]
    fn test_label_scenario() {
        let desired = labels(&[("env", "prod"), ("team", "x")]);
        let observed = labels(&[("team", "x"), ("team", "y")]);

        let delta = reconcile(&desired, &observed);
        assert_eq!(delta.to_add, vec![Label::new("env", "prod")]);
        assert_eq!(delta.to_remove, vec![Label::new("team", "y")]);
        // team=x is kept, so the key is not a value change
        assert!(delta.changed_by(|l| l.key.clone()).is_empty());
    }

    #[test]
    fn test_label_scenario_with_distinct_keys() {
        let desired = labels(&[("env", "prod"), ("team", "x")]);
        let observed = labels(&[("team", "x"), ("owner", "y")]);

        let delta = reconcile(&desired, &observed);
        assert_eq!(delta.to_add, vec![Label::new("env", "prod")]);
        assert_eq!(delta.to_remove, vec![Label::new("owner", "y")]);
    }

    #[test]
    fn test_changed_value_is_replace() {
        let desired = labels(&[("env", "prod")]);
        let observed = labels(&[("env", "dev")]);

        let delta = reconcile(&desired, &observed);
        assert_eq!(delta.to_add, vec![Label::new("env", "prod")]);
        assert_eq!(delta.to_remove, vec![Label::new("env", "dev")]);
        assert!(delta.changed_by(|l| l.key.clone()).contains("env"));
        // by identity these are two distinct labels
        assert!(delta.changed_keys().is_empty());
        assert_eq!(delta.summary(), DeltaSummary { add: 1, remove: 1, change: 0 });

        let summary = delta.summary_by(|l| l.key.clone());
        assert_eq!(summary, DeltaSummary { add: 0, remove: 0, change: 1 });
        assert_eq!(summary.to_string(), "0 to add, 1 to change, 0 to remove");
    }

    #[test]
    fn test_apply_yields_desired() {
        let desired = labels(&[("env", "prod"), ("team", "x"), ("tier", "web")]);
        let observed = labels(&[("env", "dev"), ("team", "x"), ("legacy", "true")]);

        let delta = reconcile(&desired, &observed);
        let mut converged = observed.clone();
        converged.apply(&delta);
        assert_eq!(converged, desired);
    }

    #[test]
    fn test_delta_is_minimal_and_disjoint() {
        let desired = labels(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let observed = labels(&[("b", "2"), ("c", "30"), ("d", "4")]);

        let delta = reconcile(&desired, &observed);
        for item in &delta.to_add {
            assert!(!delta.to_remove.contains(item));
        }
        // unchanged intersection stays out of both lists
        assert!(!delta.to_add.contains(&Label::new("b", "2")));
        assert!(!delta.to_remove.contains(&Label::new("b", "2")));

        assert_eq!(
            sorted(delta.to_add.clone()),
            vec![Label::new("a", "1"), Label::new("c", "3")]
        );
        assert_eq!(
            sorted(delta.to_remove.clone()),
            vec![Label::new("c", "30"), Label::new("d", "4")]
        );
    }

    #[test]
    fn test_reconcile_with_itself_is_empty() {
        let desired = labels(&[("env", "prod"), ("team", "x")]);
        let delta = reconcile(&desired, &desired);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_full_teardown_and_bootstrap() {
        let populated = labels(&[("env", "prod"), ("team", "x")]);
        let empty = Collection::<Label>::new();

        let teardown = reconcile(&empty, &populated);
        assert!(teardown.to_add.is_empty());
        assert_eq!(teardown.to_remove.len(), 2);

        let bootstrap = reconcile(&populated, &empty);
        assert!(bootstrap.to_remove.is_empty());
        assert_eq!(bootstrap.to_add.len(), 2);

        assert!(reconcile(&empty, &empty).is_empty());
    }

    #[test]
    fn test_duplicate_key_rejected_on_construction() {
        let duplicate = vec![Label::new("env", "prod"), Label::new("env", "prod")];
        let err = Collection::try_from_items(duplicate).unwrap_err();
        assert!(err.key.contains("env"));

        // same key with another value is a different label
        let both = labels(&[("team", "x"), ("team", "y")]);
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn test_reconcile_by_names_malformed_side() {
        let desired = vec![Label::new("env", "prod")];
        let observed = vec![Label::new("env", "prod"), Label::new("env", "dev")];

        let err = reconcile_by(&desired, &observed, |l: &Label| l.key.clone()).unwrap_err();
        assert_eq!(err.side, "observed");
    }

    #[test]
    fn test_space_roles_reconcile() {
        let desired = Collection::try_from_items(vec![
            SpaceRole::new("payments", "admin"),
            SpaceRole::new("payments", "viewer"),
        ])
        .unwrap();
        let observed = Collection::try_from_items(vec![
            SpaceRole::new("payments", "viewer"),
            SpaceRole::new("search", "viewer"),
        ])
        .unwrap();

        let delta = reconcile(&desired, &observed);
        assert_eq!(delta.to_add, vec![SpaceRole::new("payments", "admin")]);
        assert_eq!(delta.to_remove, vec![SpaceRole::new("search", "viewer")]);
        assert!(delta.changed_keys().is_empty());
    }
}
