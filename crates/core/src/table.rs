//! Open-addressed hash table with tombstones.
//!
//! Used for globals, instance fields, class method tables, and (with a
//! dummy value) the string intern set. Keys are always interned
//! strings, so key comparison is pointer equality.

use crate::object::ObjRef;
use crate::value::Value;

const MAX_LOAD_FACTOR: f64 = 0.75;

#[derive(Clone)]
struct Entry {
    key: Option<ObjRef>,
    value: Value,
}

pub struct Table {
    entries: Vec<Entry>,
    count: usize,
}

impl Table {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Find the slot a key would occupy: the first empty slot or an
    /// exact key match encountered while probing from `key`'s hash.
    /// Tombstones are treated as occupied (probing continues past
    /// them) but are remembered so a fresh insert can reuse the slot.
    fn find_entry(entries: &[Entry], capacity: usize, key: ObjRef) -> usize {
        let mut index = (key.as_ref_hash() as usize) % capacity;
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &entries[index];
            match entry.key {
                None => {
                    if matches!(entry.value, Value::Nil) {
                        // Truly empty.
                        return tombstone.unwrap_or(index);
                    } else if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Some(k) if k == key => return index,
                Some(_) => {}
            }
            index = (index + 1) % capacity;
        }
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        let mut new_entries = vec![
            Entry {
                key: None,
                value: Value::Nil,
            };
            capacity
        ];
        let mut new_count = 0;
        for entry in self.entries.iter() {
            if let Some(key) = entry.key {
                let index = Self::find_entry(&new_entries, capacity, key);
                new_entries[index] = Entry {
                    key: Some(key),
                    value: entry.value,
                };
                new_count += 1;
            }
        }
        self.entries = new_entries;
        self.count = new_count;
    }

    /// Returns `true` if this created a new entry (as opposed to
    /// overwriting an existing key's value).
    pub fn set(&mut self, key: ObjRef, value: Value) -> bool {
        if self.entries.is_empty() || (self.count + 1) as f64 > self.entries.len() as f64 * MAX_LOAD_FACTOR
        {
            let capacity = grow_capacity(self.entries.len());
            self.adjust_capacity(capacity);
        }
        let index = Self::find_entry(&self.entries, self.entries.len(), key);
        let entry = &mut self.entries[index];
        let is_new_key = entry.key.is_none();
        if is_new_key && matches!(entry.value, Value::Nil) {
            self.count += 1;
        }
        entry.key = Some(key);
        entry.value = value;
        is_new_key
    }

    pub fn get(&self, key: ObjRef) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let index = Self::find_entry(&self.entries, self.entries.len(), key);
        self.entries[index].key.map(|_| self.entries[index].value)
    }

    /// Deletes a key, leaving a tombstone (`key: None, value: true`)
    /// so later probes for other keys still skip over this slot.
    pub fn delete(&mut self, key: ObjRef) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let index = Self::find_entry(&self.entries, self.entries.len(), key);
        if self.entries[index].key.is_none() {
            return false;
        }
        self.entries[index] = Entry {
            key: None,
            value: Value::Bool(true),
        };
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjRef, Value)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.key.map(|k| (k, e.value)))
    }

    /// Find an interned string by content instead of by an `ObjRef`
    /// key (used before the `ObjString` for `chars` has been
    /// allocated, to check whether one already exists).
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<ObjRef> {
        if self.entries.is_empty() {
            return None;
        }
        let capacity = self.entries.len();
        let mut index = (hash as usize) % capacity;
        loop {
            let entry = &self.entries[index];
            match entry.key {
                None if matches!(entry.value, Value::Nil) => return None,
                Some(key) => {
                    let s = key.as_ref();
                    if let crate::object::ObjData::String(s) = &s.data {
                        if s.hash == hash && s.chars.as_ref() == chars {
                            return Some(key);
                        }
                    }
                }
                _ => {}
            }
            index = (index + 1) % capacity;
        }
    }

    /// Remove every entry whose key is unmarked (a weak reference,
    /// used to sweep the string intern table after the mark phase).
    pub fn remove_unmarked_keys(&mut self) {
        for entry in self.entries.iter_mut() {
            if let Some(key) = entry.key {
                if !key.as_ref().marked {
                    *entry = Entry {
                        key: None,
                        value: Value::Bool(true),
                    };
                    self.count -= 1;
                }
            }
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

fn grow_capacity(capacity: usize) -> usize {
    if capacity < 8 {
        8
    } else {
        capacity * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    fn as_number(value: Option<Value>) -> Option<f64> {
        value.and_then(|v| v.as_number())
    }

    #[test]
    fn set_reports_new_vs_overwrite() {
        let mut heap = Heap::new();
        let mut table = Table::new();
        let key = heap.intern_str("a");
        assert!(table.set(key, Value::Number(1.0)));
        assert!(!table.set(key, Value::Number(2.0)));
        assert_eq!(as_number(table.get(key)), Some(2.0));
    }

    #[test]
    fn delete_leaves_tombstone_that_probing_skips() {
        let mut heap = Heap::new();
        let mut table = Table::new();
        let a = heap.intern_str("a");
        let b = heap.intern_str("b");
        table.set(a, Value::Number(1.0));
        table.set(b, Value::Number(2.0));
        assert!(table.delete(a));
        assert!(table.get(a).is_none());
        assert_eq!(as_number(table.get(b)), Some(2.0));
    }

    #[test]
    fn grows_past_load_factor_without_losing_entries() {
        let mut heap = Heap::new();
        let mut table = Table::new();
        let mut keys = Vec::new();
        for i in 0..64 {
            let key = heap.intern_str(&format!("key{i}"));
            table.set(key, Value::Number(i as f64));
            keys.push(key);
        }
        assert_eq!(table.len(), 64);
        for (i, key) in keys.into_iter().enumerate() {
            assert_eq!(as_number(table.get(key)), Some(i as f64));
        }
    }

    #[test]
    fn find_string_locates_by_content_and_hash() {
        let mut heap = Heap::new();
        let mut table = Table::new();
        let key = heap.intern_str("needle");
        table.set(key, Value::Nil);
        let hash = crate::object::fnv1a("needle".as_bytes());
        assert_eq!(table.find_string("needle", hash), Some(key));
        assert_eq!(table.find_string("haystack", hash), None);
    }
}

/// Small helper so `Table::find_entry` can hash a key without the
/// caller needing to know the object model's hash field lives on the
/// `ObjString` payload.
trait KeyHash {
    fn as_ref_hash(&self) -> u32;
}

impl KeyHash for ObjRef {
    fn as_ref_hash(&self) -> u32 {
        match &self.as_ref().data {
            crate::object::ObjData::String(s) => s.hash,
            _ => panic!("table keys must be interned strings"),
        }
    }
}
