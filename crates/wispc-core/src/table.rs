//! Open-addressing hash tables (spec.md §4.1): the generic string-keyed
//! `Table` used for globals/methods/fields, and the lower-level `Interner`
//! used only by [`crate::Heap`] to canonicalize strings.

use crate::object::Handle;
use crate::Value;

const MAX_LOAD: f64 = 0.75;

#[derive(Clone, Copy)]
struct Entry {
    key: Option<Handle>,
    hash: u32,
    value: Value,
}

/// Map from interned string `Handle` to `Value`.
///
/// Keys are compared by handle identity, not content: every key this table
/// ever sees has already passed through [`crate::Heap::intern_copy`] or
/// [`crate::Heap::intern_take`], so two equal names are always the same
/// handle (§4.1's "lookup is a pointer comparison after hashing"). Deletions
/// tombstone the slot (`key = None`, `value = Bool(true)`) rather than
/// compacting, so later probes don't stop short of a live key they've
/// stepped over.
#[derive(Default)]
pub struct Table {
    entries: Vec<Entry>,
    count: usize,
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.key.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn get(&self, key: Handle, hash: u32) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = Self::probe(&self.entries, key, hash);
        let entry = &self.entries[idx];
        (entry.key == Some(key)).then_some(entry.value)
    }

    /// Inserts or overwrites `key`. Returns `true` if this created a brand
    /// new entry (as opposed to overwriting an existing one).
    pub fn set(&mut self, key: Handle, hash: u32, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD {
            self.grow();
        }
        let idx = Self::probe(&self.entries, key, hash);
        let is_new_key = self.entries[idx].key.is_none();
        if is_new_key && !self.entries[idx].is_tombstone() {
            self.count += 1;
        }
        self.entries[idx] = Entry {
            key: Some(key),
            hash,
            value,
        };
        is_new_key
    }

    /// Tombstones `key`'s slot. Returns `true` if the key was present.
    pub fn delete(&mut self, key: Handle, hash: u32) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let idx = Self::probe(&self.entries, key, hash);
        if self.entries[idx].key != Some(key) {
            return false;
        }
        self.entries[idx] = Entry::tombstone();
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, Value)> + '_ {
        self.entries.iter().filter_map(|e| e.key.map(|k| (k, e.value)))
    }

    fn probe(entries: &[Entry], key: Handle, hash: u32) -> usize {
        let capacity = entries.len();
        let mut index = hash as usize % capacity;
        let mut first_tombstone = None;
        loop {
            let entry = &entries[index];
            match entry.key {
                Some(k) if k == key => return index,
                Some(_) => {}
                None if entry.is_tombstone() => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
                None => return first_tombstone.unwrap_or(index),
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self) {
        let new_capacity = if self.capacity() < 8 { 8 } else { self.capacity() * 2 };
        let mut new_entries = vec![Entry::empty(); new_capacity];
        let mut live = 0;
        for entry in &self.entries {
            if let Some(key) = entry.key {
                let idx = Self::probe(&new_entries, key, entry.hash);
                new_entries[idx] = *entry;
                live += 1;
            }
        }
        self.entries = new_entries;
        self.count = live;
    }
}

impl Entry {
    fn empty() -> Self {
        Entry {
            key: None,
            hash: 0,
            value: Value::Nil,
        }
    }

    fn tombstone() -> Self {
        Entry {
            key: None,
            hash: 0,
            value: Value::Bool(true),
        }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Bool(true))
    }
}

/// One slot in the string interner: either empty, a tombstone (a string was
/// interned here and has since been collected), or a live canonical handle.
#[derive(Clone, Copy)]
enum InternSlot {
    Empty,
    Tombstone,
    Occupied { hash: u32, handle: Handle },
}

/// Canonicalizes byte strings to a single heap `Handle` per distinct content.
///
/// Unlike [`Table`], this compares by *content*: at intern time there is no
/// existing handle to compare identity against, since the whole point is
/// deciding whether one already exists. `get_bytes` lets the interner defer
/// to the heap for the actual byte comparison without owning the heap
/// itself.
#[derive(Default)]
pub(crate) struct Interner {
    slots: Vec<InternSlot>,
    count: usize,
}

impl Interner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the canonical handle for `bytes` if one is already interned.
    pub(crate) fn find<'a>(
        &self,
        hash: u32,
        bytes: &[u8],
        get_bytes: impl Fn(Handle) -> &'a [u8],
    ) -> Option<Handle> {
        if self.slots.is_empty() {
            return None;
        }
        let capacity = self.capacity();
        let mut index = hash as usize % capacity;
        loop {
            match self.slots[index] {
                InternSlot::Occupied { hash: h, handle } if h == hash => {
                    if get_bytes(handle) == bytes {
                        return Some(handle);
                    }
                }
                InternSlot::Empty => return None,
                _ => {}
            }
            index = (index + 1) % capacity;
        }
    }

    /// Inserts `handle` (already allocated, with content hashing to `hash`)
    /// as the canonical handle for its bytes.
    pub(crate) fn insert(&mut self, hash: u32, handle: Handle) {
        if (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD {
            self.grow();
        }
        let capacity = self.capacity();
        let mut index = hash as usize % capacity;
        let mut target = None;
        loop {
            match self.slots[index] {
                InternSlot::Empty => {
                    target = target.or(Some(index));
                    break;
                }
                InternSlot::Tombstone => target = target.or(Some(index)),
                InternSlot::Occupied { .. } => {}
            }
            index = (index + 1) % capacity;
        }
        let idx = target.expect("probe always terminates within capacity");
        if matches!(self.slots[idx], InternSlot::Empty) {
            self.count += 1;
        }
        self.slots[idx] = InternSlot::Occupied { hash, handle };
    }

    /// Weak sweep (§4.3): drop any entry whose handle `is_marked` returns
    /// false, called before the arena sweep so the pool never outlives the
    /// string it names.
    pub(crate) fn retain_marked(&mut self, is_marked: impl Fn(Handle) -> bool) {
        for slot in &mut self.slots {
            if let InternSlot::Occupied { handle, .. } = *slot {
                if !is_marked(handle) {
                    *slot = InternSlot::Tombstone;
                }
            }
        }
    }

    fn grow(&mut self) {
        let new_capacity = if self.capacity() < 8 { 8 } else { self.capacity() * 2 };
        let old = std::mem::replace(&mut self.slots, vec![InternSlot::Empty; new_capacity]);
        self.count = 0;
        for slot in old {
            if let InternSlot::Occupied { hash, handle } = slot {
                self.reinsert(hash, handle);
            }
        }
    }

    /// Like `insert`, but used only while rehashing into fresh, already
    /// correctly-sized storage, so it never recurses into `grow`.
    fn reinsert(&mut self, hash: u32, handle: Handle) {
        let capacity = self.capacity();
        let mut index = hash as usize % capacity;
        loop {
            if matches!(self.slots[index], InternSlot::Empty) {
                self.slots[index] = InternSlot::Occupied { hash, handle };
                self.count += 1;
                return;
            }
            index = (index + 1) % capacity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(i: u32) -> Handle {
        Handle::from_index(i)
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut table = Table::new();
        assert!(table.set(h(1), 10, Value::Number(42.0)));
        assert_eq!(table.get(h(1), 10), Some(Value::Number(42.0)));
    }

    #[test]
    fn set_twice_overwrites_without_growing_count() {
        let mut table = Table::new();
        assert!(table.set(h(1), 10, Value::Number(1.0)));
        assert!(!table.set(h(1), 10, Value::Number(2.0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn delete_then_get_returns_none_but_probe_chain_survives() {
        let mut table = Table::new();
        table.set(h(1), 0, Value::Number(1.0));
        table.set(h(2), 0, Value::Number(2.0)); // collides with h(1) at capacity 8
        assert!(table.delete(h(1), 0));
        assert_eq!(table.get(h(1), 0), None);
        assert_eq!(table.get(h(2), 0), Some(Value::Number(2.0)));
    }

    #[test]
    fn grows_past_load_factor() {
        let mut table = Table::new();
        for i in 0..32 {
            table.set(h(i), i, Value::Number(f64::from(i)));
        }
        for i in 0..32 {
            assert_eq!(table.get(h(i), i), Some(Value::Number(f64::from(i))));
        }
    }

    #[test]
    fn interner_finds_by_content_not_by_handle() {
        let bytes: [&[u8]; 2] = [b"hello", b"world"];
        let mut interner = Interner::new();
        interner.insert(1, h(0));
        interner.insert(2, h(1));
        let lookup = |handle: Handle| -> &'static [u8] { bytes[handle.index() as usize] };
        assert_eq!(interner.find(1, b"hello", lookup), Some(h(0)));
        assert_eq!(interner.find(2, b"world", lookup), Some(h(1)));
        assert_eq!(interner.find(3, b"nope", lookup), None);
    }
}
