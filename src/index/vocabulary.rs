//! Term vocabulary with capped, first-seen id assignment

use std::collections::HashMap;

/// Default vocabulary capacity
pub const DEFAULT_MAX_VOCAB: usize = 32_768;

/// Maps term strings to stable u32 ids.
///
/// Ids are assigned sequentially in first-seen order and are never reused;
/// there is no removal. Once the capacity is reached, unseen terms get no id
/// and stay unscored.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    terms: HashMap<String, u32>,
    capacity: usize,
}

impl Vocabulary {
    pub fn new(capacity: usize) -> Self {
        Self {
            terms: HashMap::new(),
            capacity,
        }
    }

    /// Look up a term's id, assigning the next sequential id if the term is
    /// new and capacity allows. Returns None for an unseen term at capacity.
    pub fn ensure(&mut self, term: &str) -> Option<u32> {
        if let Some(&id) = self.terms.get(term) {
            return Some(id);
        }
        if self.terms.len() >= self.capacity {
            return None;
        }
        let id = self.terms.len() as u32;
        self.terms.insert(term.to_string(), id);
        Some(id)
    }

    /// Read-only lookup, never assigns
    pub fn get(&self, term: &str) -> Option<u32> {
        self.terms.get(term).copied()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VOCAB)
    }
}
