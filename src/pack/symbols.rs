//! Freelist-backed symbol interning
//!
//! ID 0 is reserved for the void sentinel at construction and is never
//! released. Released IDs are handed out again smallest-first before the
//! counter grows.

use std::borrow::Borrow;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

use crate::core::error::Error;
use crate::core::types::Result;

/// The reserved void ID
pub const VOID_ID: u32 = 0;

/// Bidirectional map between symbols and small integer IDs
#[derive(Clone, Debug)]
pub struct SymbolTable<K> {
    /// Symbol per ID (None for released slots)
    symbols: Vec<Option<K>>,
    /// ID per live symbol
    ids: HashMap<K, u32>,
    /// Released IDs, smallest on top
    free: BinaryHeap<Reverse<u32>>,
    /// Exclusive upper bound on IDs
    limit: u32,
}

impl<K: Clone + Eq + Hash> SymbolTable<K> {
    /// Create a table with `void` pre-allocated as ID 0
    pub fn new(void: K) -> Self {
        Self::with_limit(void, u32::MAX)
    }

    /// Create a table that refuses to allocate IDs at or beyond `limit`
    pub fn with_limit(void: K, limit: u32) -> Self {
        let mut ids = HashMap::new();
        ids.insert(void.clone(), VOID_ID);
        Self {
            symbols: vec![Some(void)],
            ids,
            free: BinaryHeap::new(),
            limit,
        }
    }

    /// Return the ID of `symbol`, allocating one if it is new
    pub fn intern<Q>(&mut self, symbol: &Q) -> Result<u32>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(&id) = self.ids.get(symbol) {
            return Ok(id);
        }
        let id = match self.free.pop() {
            Some(Reverse(id)) => id,
            None => {
                let next = self.symbols.len() as u32;
                if next >= self.limit {
                    return Err(Error::SymbolsExhausted { limit: self.limit });
                }
                self.symbols.push(None);
                next
            }
        };
        let owned = symbol.to_owned();
        self.ids.insert(owned.clone(), id);
        self.symbols[id as usize] = Some(owned);
        Ok(id)
    }

    /// Return `id` to the free list. The caller guarantees nothing references it.
    pub fn release(&mut self, id: u32) -> Result<K> {
        if id == VOID_ID {
            return Err(Error::InvalidRelease(id));
        }
        let symbol = self
            .symbols
            .get_mut(id as usize)
            .and_then(Option::take)
            .ok_or(Error::InvalidRelease(id))?;
        self.ids.remove(&symbol);
        self.free.push(Reverse(id));
        Ok(symbol)
    }

    /// ID of a live symbol
    pub fn id<Q>(&self, symbol: &Q) -> Option<u32>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ids.get(symbol).copied()
    }

    /// Symbol of a live ID
    pub fn get(&self, id: u32) -> Option<&K> {
        self.symbols.get(id as usize).and_then(Option::as_ref)
    }

    /// Number of live symbols, void included
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// One past the highest ID ever allocated
    pub fn id_bound(&self) -> u32 {
        self.symbols.len() as u32
    }

    /// Symbols indexed by ID, released slots as None
    pub fn slots(&self) -> &[Option<K>] {
        &self.symbols
    }
}
