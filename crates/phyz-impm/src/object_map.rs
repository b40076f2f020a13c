//! Small sorted map keyed by object index.
//!
//! Grid nodes hold one value per object that touches them. Almost every node
//! is touched by one or two objects, so entries live inline in a `SmallVec`
//! kept sorted by object index.

use smallvec::SmallVec;

/// Sorted `(object, value)` pairs, stored inline for up to two objects.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMap<T> {
    entries: SmallVec<[(usize, T); 2]>,
}

impl<T> Default for ObjectMap<T> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }
}

impl<T> ObjectMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn search(&self, object: usize) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&object, |(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, object: usize) -> bool {
        self.search(object).is_ok()
    }

    pub fn get(&self, object: usize) -> Option<&T> {
        self.search(object).ok().map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, object: usize) -> Option<&mut T> {
        match self.search(object) {
            Ok(i) => Some(&mut self.entries[i].1),
            Err(_) => None,
        }
    }

    /// Insert or overwrite, returning the previous value.
    pub fn insert(&mut self, object: usize, value: T) -> Option<T> {
        match self.search(object) {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            Err(i) => {
                self.entries.insert(i, (object, value));
                None
            }
        }
    }

    pub fn remove(&mut self, object: usize) -> Option<T> {
        match self.search(object) {
            Ok(i) => Some(self.entries.remove(i).1),
            Err(_) => None,
        }
    }

    /// Mutable access to the entry of `object`, inserting `default()` first if absent.
    pub fn get_or_insert_with(&mut self, object: usize, default: impl FnOnce() -> T) -> &mut T {
        let i = match self.search(object) {
            Ok(i) => i,
            Err(i) => {
                self.entries.insert(i, (object, default()));
                i
            }
        };
        &mut self.entries[i].1
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop entries for `object` and shift higher object indices down by one.
    pub fn remove_object(&mut self, object: usize) {
        self.entries.retain(|(k, _)| *k != object);
        for (k, _) in self.entries.iter_mut() {
            if *k > object {
                *k -= 1;
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.entries.iter_mut().map(|(k, v)| (*k, v))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, v)| v)
    }
}
