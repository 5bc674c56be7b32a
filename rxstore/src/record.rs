use crate::State;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// A string-keyed, immutable state object.
///
/// Updates are copy-on-write and keep the same allocation when nothing changes, so
/// [`Record::ptr_eq`] tells whether any field was replaced. Equality short-circuits on identity.
pub struct Record<V> {
    fields: Arc<BTreeMap<String, V>>,
}

impl<V> Record<V> {
    pub fn new() -> Self {
        Record {
            fields: Arc::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, V> {
        self.fields.iter()
    }

    /// True if both records share the same allocation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.fields, &b.fields)
    }
}

impl<V: Clone + PartialEq> Record<V> {
    /// Returns a record with `key` set to `value`, or `self` again if the field already holds it.
    pub fn with(&self, key: impl Into<String>, value: V) -> Self {
        let key = key.into();
        if self.fields.get(&key) == Some(&value) {
            return self.clone();
        }
        let mut fields = BTreeMap::clone(&self.fields);
        fields.insert(key, value);
        Record {
            fields: Arc::new(fields),
        }
    }

    /// Shallow-merges every field of `partial` into `self`.
    pub fn merge(&self, partial: &Record<V>) -> Self {
        partial
            .iter()
            .fold(self.clone(), |merged, (key, value)| merged.with(key.as_str(), value.clone()))
    }
}

impl<V> Clone for Record<V> {
    fn clone(&self) -> Self {
        Record {
            fields: Arc::clone(&self.fields),
        }
    }
}

impl<V> Default for Record<V> {
    fn default() -> Self {
        Record::new()
    }
}

impl<V: PartialEq> PartialEq for Record<V> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields) || self.fields == other.fields
    }
}

impl<V: Eq> Eq for Record<V> {}

impl<V: fmt::Debug> fmt::Debug for Record<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Record<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            fields: Arc::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

impl<V> Index<&str> for Record<V> {
    type Output = V;

    fn index(&self, key: &str) -> &V {
        match self.fields.get(key) {
            Some(value) => value,
            None => panic!("no field `{key}` in record"),
        }
    }
}

impl<V: State> State for Record<V> {}
