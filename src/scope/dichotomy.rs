// src/scope/dichotomy.rs

//! Sorted key/value table answering "all values for this key" by binary search

/// A multimap stored as one sorted `Vec<(K, V)>`
///
/// Built once, then queried; equal keys keep their insertion order.
#[derive(Debug, Clone)]
pub struct Dichotomy<K, V> {
    entries: Vec<(K, V)>,
}

impl<K: Ord, V> Dichotomy<K, V> {
    pub fn from_entries(mut entries: Vec<(K, V)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self { entries }
    }

    /// The contiguous run of entries whose key equals `key`
    pub fn find(&self, key: &K) -> &[(K, V)] {
        let from = self.entries.partition_point(|(k, _)| k < key);
        let to = from + self.entries[from..].partition_point(|(k, _)| k <= key);
        &self.entries[from..to]
    }

    pub fn values<'a>(&'a self, key: &K) -> impl Iterator<Item = &'a V> + use<'a, K, V> {
        self.find(key).iter().map(|(_, v)| v)
    }

    pub fn contains(&self, key: &K) -> bool {
        !self.find(key).is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Ord, V> Default for Dichotomy<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_runs() {
        let d = Dichotomy::from_entries(vec![(3, 'c'), (1, 'a'), (3, 'd'), (2, 'b'), (3, 'e')]);
        assert_eq!(d.len(), 5);
        let threes: Vec<char> = d.values(&3).copied().collect();
        assert_eq!(threes, vec!['c', 'd', 'e']);
        assert_eq!(d.find(&1), &[(1, 'a')]);
        assert!(d.find(&0).is_empty());
        assert!(d.find(&4).is_empty());
        assert!(!d.contains(&7));
    }

    #[test]
    fn test_empty() {
        let d: Dichotomy<u32, u32> = Dichotomy::default();
        assert!(d.is_empty());
        assert!(d.find(&1).is_empty());
    }
}
