//! LRU List Module
//!
//! Hash map plus an arena-backed doubly-linked recency list. The map stores
//! the arena index of each key's node, and the node owns the item, so lookup
//! and ordering share a single copy of every entry.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Null link.
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<K, T> {
    /// `None` while the slot sits on the free list.
    entry: Option<(K, T)>,
    prev: usize,
    next: usize,
}

// == LRU List ==
/// Recency-ordered map with O(1) insert, lookup, promotion and eviction.
///
/// - Head = most recently used
/// - Tail = least recently used
#[derive(Debug)]
pub struct LruList<K, T> {
    /// Key to arena index
    map: HashMap<K, usize>,
    /// Node arena; freed slots are recycled through `free`
    nodes: Vec<Node<K, T>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl<K, T> Default for LruList<K, T> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }
}

impl<K: Hash + Eq + Clone, T> LruList<K, T> {
    // == Constructor ==
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Inserts or replaces the item for `key` and marks it most recently used.
    ///
    /// Returns the previous item when the key was already present.
    pub fn insert(&mut self, key: K, item: T) -> Option<T> {
        if let Some(&idx) = self.map.get(&key) {
            self.move_to_front(idx);
            return self.nodes[idx]
                .entry
                .as_mut()
                .map(|(_, current)| std::mem::replace(current, item));
        }

        let idx = self.alloc(key.clone(), item);
        self.push_front(idx);
        self.map.insert(key, idx);
        None
    }

    // == Get ==
    /// Looks up an item without changing its recency.
    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.nodes[idx].entry.as_ref().map(|(_, item)| item)
    }

    // == Touch ==
    /// Marks a key as most recently used and returns its item.
    pub fn touch<Q>(&mut self, key: &Q) -> Option<&mut T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].entry.as_mut().map(|(_, item)| item)
    }

    // == Remove ==
    /// Removes a key, returning its item.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        self.release(idx).map(|(_, item)| item)
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used entry.
    pub fn evict_oldest(&mut self) -> Option<(K, T)> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        self.unlink(idx);
        let (key, item) = self.release(idx)?;
        self.map.remove(&key);
        Some((key, item))
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        if self.tail == NIL {
            return None;
        }
        self.nodes[self.tail].entry.as_ref().map(|(key, _)| key)
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Keys<'_, K, T> {
        Keys {
            list: self,
            cursor: self.head,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    fn alloc(&mut self, key: K, item: T) -> usize {
        let node = Node {
            entry: Some((key, item)),
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Moves a node to the free list, handing back its key and item.
    fn release(&mut self, idx: usize) -> Option<(K, T)> {
        self.free.push(idx);
        self.nodes[idx].entry.take()
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }
}

// == Keys Iterator ==
/// Iterator over keys in recency order, most recent first.
pub struct Keys<'a, K, T> {
    list: &'a LruList<K, T>,
    cursor: usize,
}

impl<'a, K, T> Iterator for Keys<'a, K, T> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.list.nodes[self.cursor];
        self.cursor = node.next;
        node.entry.as_ref().map(|(key, _)| key)
    }
}
